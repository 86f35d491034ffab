// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::region::{FlashUnlock, APP_REGION};
use crate::{Bootloader, Secp256k1Verify};
use consts::{APP_PAGE_NUM, FLASH_ERASE_BURST_PAGES, FLASH_ERASE_BURST_SIZE, FLASH_PAGE_SIZE};
use host_protocol::Status;

impl<F: FlashUnlock, V: Secp256k1Verify> Bootloader<F, V> {
    /// Erase the whole application partition and arm the writer.
    ///
    /// A failed burst leaves the partition partially erased and the writer disarmed,
    /// the host has to restart the erase.
    pub fn erase(&mut self) {
        self.ready = false;

        match self.erase_app() {
            Ok(()) => {
                info!("Application erased");
                self.ready = true;
                self.report.set_status(Status::Ok);
            }
            Err(status) => self.report.set_status(status),
        }
    }

    fn erase_app(&mut self) -> Result<(), Status> {
        let (from, to) = APP_REGION.flash_range();
        self.flash.unlock(from, to);

        for page in (0..APP_PAGE_NUM).step_by(FLASH_ERASE_BURST_PAGES as usize) {
            let start = APP_REGION.offset(page * FLASH_PAGE_SIZE);
            if self.flash.erase(start, start + FLASH_ERASE_BURST_SIZE).is_err() {
                error!("Flash erase failed at offset {:#x}", start);
                return Err(Status::ErrErase);
            }
        }

        Ok(())
    }
}
