// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Secure firmware update bootloader.
//!
//! A [`Bootloader`] session receives fixed size commands from the host, erases and
//! writes the application partition chunk by chunk, and only reports a firmware image
//! as valid when the signature stored in the signature partition verifies against the
//! compiled-in public key.
//!
//! Flash access goes through the `embedded-storage` [`NorFlash`] traits, hashing uses
//! `sha2`, and signature checks go through [`Secp256k1Verify`] so the same logic runs on
//! the device and against an in-memory flash on the host.
//!
//! [`NorFlash`]: embedded_storage::nor_flash::NorFlash

#![no_std]

mod fmt;

mod eraser;
pub mod region;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
mod verify;
mod writer;

#[cfg(test)]
extern crate std;


use consts::PUBKEY;
use host_protocol::{Command, Report, Status, COMMAND_SIZE};

pub use region::{FlashUnlock, Region, APP_REGION, SIG_REGION};
pub use verify::{Secp256k1Verify, VerificationResult};

/// Version string returned by the version command.
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Bootloader session state.
///
/// Owns the flash driver, the signature verifier, the report buffer reused for every
/// command, and the ready flag gating chunk writes. Commands are processed one at a
/// time through `&mut self`.
pub struct Bootloader<F, V> {
    flash: F,
    ecc: V,
    pubkey: [u8; 33],
    ready: bool,
    report: Report,
}

impl<F: FlashUnlock, V: Secp256k1Verify> Bootloader<F, V> {
    pub fn new(flash: F, ecc: V) -> Self {
        Self::with_key(flash, ecc, PUBKEY)
    }

    /// Session verifying against `pubkey` instead of the device key.
    /// Only available for host side simulation.
    #[cfg(any(test, feature = "sim"))]
    pub fn with_pubkey(flash: F, ecc: V, pubkey: [u8; 33]) -> Self {
        Self::with_key(flash, ecc, pubkey)
    }

    fn with_key(flash: F, ecc: V, pubkey: [u8; 33]) -> Self {
        Self {
            flash,
            ecc,
            pubkey,
            ready: false,
            report: Report::new(),
        }
    }

    /// Process one command and return the report for it.
    pub fn dispatch(&mut self, command: &[u8; COMMAND_SIZE]) -> &Report {
        self.report.reset(command[0]);

        match Command::parse(command) {
            Ok(Command::Version) => {
                info!("Version request");
                // No status byte on purpose, the host tooling only looks at the payload.
                self.report.set_version(VERSION);
            }
            Ok(Command::Erase) => {
                info!("Erase firmware");
                self.erase();
            }
            Ok(Command::Write { chunk_idx, chunk }) => {
                if self.ready {
                    debug!("Write chunk {}", chunk_idx);
                    self.write_chunk(chunk, chunk_idx);
                } else {
                    warn!("Write chunk {} refused, loader not ready", chunk_idx);
                    self.report.set_status(Status::ErrLoadFlag);
                }
            }
            Ok(Command::Verify { signature_hex }) => {
                info!("Verify firmware");
                self.stage_and_verify(signature_hex);
            }
            Err(opcode) => {
                warn!("Invalid opcode {:#x}", opcode);
                self.report.set_status(Status::ErrInvalidCmd);
                self.ready = false;
            }
        }

        &self.report
    }

    /// Whether chunk writes are currently accepted.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Report of the last processed command.
    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }
}
