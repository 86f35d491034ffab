// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Flash partitions handled by the bootloader.

use consts::{APP_LEN, APP_START, FLASH_BASE, FLASH_PAGE_SIZE, SIG_LEN, SIG_START};
use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};

/// A fixed address range in internal flash.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Region {
    start: u32,
    len: u32,
}

/// Application partition holding the firmware image.
pub const APP_REGION: Region = Region::new(APP_START, APP_LEN);

/// Signature partition holding the firmware signature and the lock byte.
pub const SIG_REGION: Region = Region::new(SIG_START, SIG_LEN);

impl Region {
    pub const fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    /// Flash driver offset of the byte at `pos` inside the region.
    pub const fn offset(&self, pos: u32) -> u32 {
        self.start - FLASH_BASE + pos
    }

    /// Flash driver offsets `(from, to)` covering the whole region.
    pub const fn flash_range(&self) -> (u32, u32) {
        (self.offset(0), self.offset(self.len))
    }
}

/// Flash controllers with write protected regions.
///
/// `from` and `to` are flash driver offsets. Controllers without region locking keep the
/// default no-op.
pub trait FlashUnlock: NorFlash {
    fn unlock(&mut self, _from: u32, _to: u32) {}
}

/// Compare flash content at `offset` with `data`, one page at a time.
pub(crate) fn flash_matches<F: ReadNorFlash>(flash: &mut F, offset: u32, data: &[u8]) -> Result<bool, F::Error> {
    let mut page = [0u8; FLASH_PAGE_SIZE as usize];
    for (i, expected) in data.chunks(page.len()).enumerate() {
        let read_back = &mut page[..expected.len()];
        flash.read(offset + (i * FLASH_PAGE_SIZE as usize) as u32, read_back)?;
        if *read_back != *expected {
            return Ok(false);
        }
    }
    Ok(true)
}
