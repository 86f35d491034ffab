// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::region::{flash_matches, FlashUnlock, APP_REGION};
use crate::{Bootloader, Secp256k1Verify};
use consts::{CHUNK_LEN, CHUNK_NUM, FLASH_PAGE_SIZE};
use host_protocol::Status;

impl<F: FlashUnlock, V: Secp256k1Verify> Bootloader<F, V> {
    /// Write one chunk of the staged image at chunk index `chunk_idx`.
    ///
    /// The ready flag is cleared first and only set again once every page of the chunk
    /// has been written and read back. A chunk already present in flash is not written
    /// again.
    pub fn write_chunk(&mut self, chunk: &[u8], chunk_idx: u8) {
        self.ready = false;

        match self.program_chunk(chunk, chunk_idx) {
            Ok(()) => {
                self.report.set_status(Status::Ok);
                self.ready = true;
            }
            Err(status) => self.report.set_status(status),
        }
    }

    fn program_chunk(&mut self, chunk: &[u8], chunk_idx: u8) -> Result<(), Status> {
        if chunk.len() != CHUNK_LEN as usize {
            error!("Chunk payload is {} bytes, build expects {}", chunk.len(), CHUNK_LEN);
            return Err(Status::ErrMacro);
        }

        if u32::from(chunk_idx) >= CHUNK_NUM {
            warn!("Chunk index {} out of range", chunk_idx);
            return Err(Status::ErrLen);
        }

        let base = APP_REGION.offset(u32::from(chunk_idx) * CHUNK_LEN);

        // Retransmission of a committed chunk, nothing to wear out.
        if flash_matches(&mut self.flash, base, chunk).map_err(|_| Status::ErrCheck)? {
            debug!("Chunk {} already in flash", chunk_idx);
            return Ok(());
        }

        for (i, page) in chunk.chunks_exact(FLASH_PAGE_SIZE as usize).enumerate() {
            let offset = base + i as u32 * FLASH_PAGE_SIZE;

            if self.flash.write(offset, page).is_err() {
                error!("Flash write failed at offset {:#x}", offset);
                return Err(Status::ErrWrite);
            }

            if !flash_matches(&mut self.flash, offset, page).map_err(|_| Status::ErrCheck)? {
                error!("Flash check failed at offset {:#x}", offset);
                return Err(Status::ErrCheck);
            }
        }

        Ok(())
    }
}
