// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host side stand-ins for the device flash and signature verifier.

use crate::region::FlashUnlock;
use crate::verify::{Secp256k1Verify, VerificationResult};
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};

/// NOR flash simulated over a byte slice covering the whole internal flash.
///
/// Programming can only clear bits, like the real array, so writing over data that was
/// not erased first shows up in the read back. Faults can be injected at a flash offset.
#[derive(Debug)]
pub struct RamFlash<'a> {
    mem: &'a mut [u8],
    write_failure: Option<u32>,
    erase_failure: Option<u32>,
    stuck_byte: Option<u32>,
    writes: usize,
    erases: usize,
}

impl<'a> RamFlash<'a> {
    pub fn new(mem: &'a mut [u8]) -> Self {
        Self {
            mem,
            write_failure: None,
            erase_failure: None,
            stuck_byte: None,
            writes: 0,
            erases: 0,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &*self.mem
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut *self.mem
    }

    /// Fail any write covering `offset`.
    pub fn set_write_failure(&mut self, offset: Option<u32>) {
        self.write_failure = offset;
    }

    /// Fail any erase covering `offset`.
    pub fn set_erase_failure(&mut self, offset: Option<u32>) {
        self.erase_failure = offset;
    }

    /// Keep the byte at `offset` unchanged on writes while reporting success.
    pub fn set_stuck_byte(&mut self, offset: Option<u32>) {
        self.stuck_byte = offset;
    }

    /// Number of successful write operations.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Number of successful erase operations.
    pub fn erases(&self) -> usize {
        self.erases
    }
}

fn covers(fault: Option<u32>, from: u32, to: u32) -> bool {
    fault.is_some_and(|offset| (from..to).contains(&offset))
}

impl ErrorType for RamFlash<'_> {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for RamFlash<'_> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;
        let start = offset as usize;
        bytes.copy_from_slice(&self.mem[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.mem.len()
    }
}

impl NorFlash for RamFlash<'_> {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = consts::FLASH_ERASE_BURST_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        if covers(self.erase_failure, from, to) {
            return Err(NorFlashErrorKind::Other);
        }
        self.mem[from as usize..to as usize].fill(consts::ERASED_BYTE);
        self.erases += 1;
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        let end = offset + bytes.len() as u32;
        if covers(self.write_failure, offset, end) {
            return Err(NorFlashErrorKind::Other);
        }
        for (addr, &value) in (offset..end).zip(bytes) {
            if self.stuck_byte == Some(addr) {
                continue;
            }
            self.mem[addr as usize] &= value;
        }
        self.writes += 1;
        Ok(())
    }
}

impl FlashUnlock for RamFlash<'_> {}

/// Signature verifier backed by libsecp256k1.
#[derive(Debug, Default)]
pub struct Secp256k1Verifier(secp256k1::Secp256k1<secp256k1::All>);

impl Secp256k1Verify for Secp256k1Verifier {
    fn verify_ecdsa(&self, msg: [u8; 32], signature: [u8; 64], pubkey: [u8; 33]) -> VerificationResult {
        let Ok(pubkey) = secp256k1::PublicKey::from_slice(&pubkey) else {
            return VerificationResult::Invalid;
        };
        let Ok(mut signature) = secp256k1::ecdsa::Signature::from_compact(&signature) else {
            return VerificationResult::Invalid;
        };
        // Signers are not required to produce low-S signatures.
        signature.normalize_s();

        if self
            .0
            .verify_ecdsa(&secp256k1::Message::from_digest(msg), &signature, &pubkey)
            .is_ok()
        {
            VerificationResult::Valid
        } else {
            VerificationResult::Invalid
        }
    }
}
