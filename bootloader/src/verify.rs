// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::region::{FlashUnlock, APP_REGION, SIG_REGION};
use crate::Bootloader;
use consts::{APP_LEN, ERASED_BYTE, FLASH_PAGE_SIZE, LOCK_BYTE_OFFSET, SIGNATURE_LEN, SIG_LEN};
use host_protocol::Status;
use sha2::{Digest, Sha256};

/// ECDSA secp256k1 verification.
pub trait Secp256k1Verify {
    /// Verify an ECDSA signature of the 32 byte message `msg` against the given public key.
    fn verify_ecdsa(&self, msg: [u8; 32], signature: [u8; 64], pubkey: [u8; 33]) -> VerificationResult;
}

/// Verification result.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u32)]
pub enum VerificationResult {
    // The values are arbitrary, but chosen to be different by more than one bit to make glitching
    // attacks more difficult.
    Valid = 0xcafebabe,
    Invalid = 0xdeadbeef,
}

impl<F: FlashUnlock, V: Secp256k1Verify> Bootloader<F, V> {
    /// Replace the signature partition with `signature_hex` and verify the application.
    ///
    /// The whole partition is rewritten: the signature lands in the first 64 bytes and
    /// everything else, lock byte included, is left erased.
    pub fn stage_and_verify(&mut self, signature_hex: &[u8]) -> bool {
        match self.stage_signature(signature_hex) {
            Ok(()) => self.verify(),
            Err(status) => {
                self.report.set_status(status);
                false
            }
        }
    }

    fn stage_signature(&mut self, signature_hex: &[u8]) -> Result<(), Status> {
        let mut region = [ERASED_BYTE; SIG_LEN as usize];
        if hex::decode_to_slice(signature_hex, &mut region[..SIGNATURE_LEN]).is_err() {
            warn!("Signature is not valid hex");
            self.ready = false;
            return Err(Status::ErrInvalidCmd);
        }

        let (from, to) = SIG_REGION.flash_range();
        self.flash.unlock(from, to);

        if self.flash.erase(from, to).is_err() {
            error!("Signature erase failed");
            return Err(Status::ErrErase);
        }

        if self.flash.write(from, &region).is_err() {
            error!("Signature write failed");
            return Err(Status::ErrWrite);
        }

        Ok(())
    }

    /// Check the stored signature against the application partition.
    ///
    /// The report payload always receives the hex encoded double hash of the
    /// application, whatever the outcome.
    pub fn verify(&mut self) -> bool {
        let mut signature = [0u8; SIGNATURE_LEN];
        if self.flash.read(SIG_REGION.offset(0), &mut signature).is_err() {
            error!("Signature read failed");
            self.report.set_status(Status::Err);
            return false;
        }

        let Some(digest) = self.app_digest() else {
            error!("Application read failed");
            self.report.set_status(Status::Err);
            return false;
        };

        // The signed message is the double hash, it doubles as the fingerprint sent to the
        // host so the first pass digest never leaves the device.
        let fingerprint: [u8; 32] = Sha256::digest(digest).into();

        let result = self.ecc.verify_ecdsa(fingerprint, signature, self.pubkey);
        let verified = result == VerificationResult::Valid
            && core::hint::black_box(result as u32) == VerificationResult::Valid as u32;

        if verified {
            info!("Firmware signature valid");
            self.report.set_status(Status::Ok);
        } else {
            warn!("Firmware signature invalid");
            self.report.set_status(Status::Err);
        }
        self.report.set_fingerprint(&fingerprint);

        verified
    }

    /// Value of the lock byte in the signature partition.
    pub fn lock_state(&mut self) -> Result<u8, F::Error> {
        let mut lock = [0u8; 1];
        self.flash.read(SIG_REGION.offset(LOCK_BYTE_OFFSET), &mut lock)?;
        Ok(lock[0])
    }

    /// SHA-256 over the whole application partition, erased tail included.
    fn app_digest(&mut self) -> Option<[u8; 32]> {
        let mut sha = Sha256::new();
        let mut page = [0u8; FLASH_PAGE_SIZE as usize];
        for pos in (0..APP_LEN).step_by(page.len()) {
            self.flash.read(APP_REGION.offset(pos), &mut page).ok()?;
            sha.update(page);
        }
        Some(sha.finalize().into())
    }
}
