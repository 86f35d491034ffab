// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host to bootloader communication protocol.
//! The host tool sends fixed size commands and the bootloader answers every command
//! with a report of the same size. Both ends share the layouts defined here:
//!
//! - command: byte 0 opcode, byte 1 parameter, bytes `2..` payload
//! - report: byte 0 echoed opcode, byte 1 status, bytes `2..` payload

#![no_std]

use consts::{FINGERPRINT_HEX_LEN, OP_LEN, REPORT_SIZE, SIGNATURE_HEX_LEN, SIGNATURE_LEN};

/// Size of a command buffer. Commands and reports share the transport report size.
pub const COMMAND_SIZE: usize = REPORT_SIZE;

/// Size of the payload following the opcode bytes.
pub const PAYLOAD_LEN: usize = REPORT_SIZE - OP_LEN;

/// Command opcodes understood by the bootloader.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    /// Request the bootloader version string
    Version = b'v',
    /// Erase the whole application partition
    Erase = b'e',
    /// Write one firmware chunk
    Write = b'w',
    /// Store a new signature and verify the application against it
    Verify = b's',
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'v' => Ok(Opcode::Version),
            b'e' => Ok(Opcode::Erase),
            b'w' => Ok(Opcode::Write),
            b's' => Ok(Opcode::Verify),
            other => Err(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> Self {
        op as u8
    }
}

/// Status codes reported in byte 1 of every report.
/// The byte values are fixed by the existing host tooling.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Status {
    /// Operation completed
    Ok = b'0',
    /// Generic error, firmware signature did not verify
    Err = b'Z',
    /// Chunk geometry of the build does not match the transfer size
    ErrMacro = b'M',
    /// Chunk index out of range
    ErrLen = b'N',
    /// Flash write failed
    ErrWrite = b'W',
    /// Flash content differs from the data just written
    ErrCheck = b'C',
    /// Flash erase failed
    ErrErase = b'E',
    /// Write attempted while the bootloader is not ready to accept chunks
    ErrLoadFlag = b'L',
    /// Unknown opcode or malformed command payload
    ErrInvalidCmd = b'I',
}

impl Status {
    /// Short name used by the host tooling.
    pub fn name(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Err => "ERR",
            Status::ErrMacro => "ERR_MACRO",
            Status::ErrLen => "ERR_LEN",
            Status::ErrWrite => "ERR_WRITE",
            Status::ErrCheck => "ERR_CHECK",
            Status::ErrErase => "ERR_ERASE",
            Status::ErrLoadFlag => "ERR_LOAD_FLAG",
            Status::ErrInvalidCmd => "ERR_INVALID_CMD",
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'0' => Ok(Status::Ok),
            b'Z' => Ok(Status::Err),
            b'M' => Ok(Status::ErrMacro),
            b'N' => Ok(Status::ErrLen),
            b'W' => Ok(Status::ErrWrite),
            b'C' => Ok(Status::ErrCheck),
            b'E' => Ok(Status::ErrErase),
            b'L' => Ok(Status::ErrLoadFlag),
            b'I' => Ok(Status::ErrInvalidCmd),
            other => Err(other),
        }
    }
}

impl core::fmt::Display for Status {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors while building a command buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Payload does not fit after the opcode bytes
    PayloadTooLong { len: usize, max: usize },
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Error::PayloadTooLong { len, max } => {
                write!(f, "command payload of {len} bytes exceeds {max} bytes")
            }
        }
    }
}

/// A command decoded from, or encoded into, a raw command buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command<'a> {
    /// Request the bootloader version
    Version,
    /// Erase the application partition
    Erase,
    /// Write `chunk` at chunk index `chunk_idx`
    Write { chunk_idx: u8, chunk: &'a [u8] },
    /// Store the hex encoded signature and verify the application
    Verify { signature_hex: &'a [u8] },
}

impl<'a> Command<'a> {
    /// Decode a command buffer.
    ///
    /// An unrecognized opcode is returned as the error value so it can be echoed back.
    pub fn parse(buf: &'a [u8; COMMAND_SIZE]) -> Result<Self, u8> {
        let command = match Opcode::try_from(buf[0])? {
            Opcode::Version => Command::Version,
            Opcode::Erase => Command::Erase,
            Opcode::Write => Command::Write {
                chunk_idx: buf[1],
                chunk: &buf[OP_LEN..],
            },
            Opcode::Verify => Command::Verify {
                signature_hex: &buf[OP_LEN..OP_LEN + SIGNATURE_HEX_LEN],
            },
        };
        Ok(command)
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Version => Opcode::Version,
            Command::Erase => Opcode::Erase,
            Command::Write { .. } => Opcode::Write,
            Command::Verify { .. } => Opcode::Verify,
        }
    }

    /// Encode the command into `buf`. Unused bytes are zeroed.
    pub fn encode(&self, buf: &mut [u8; COMMAND_SIZE]) -> Result<(), Error> {
        let (param, payload): (u8, &[u8]) = match self {
            Command::Version | Command::Erase => (0, &[]),
            Command::Write { chunk_idx, chunk } => (*chunk_idx, chunk),
            Command::Verify { signature_hex } => (0, signature_hex),
        };
        if payload.len() > PAYLOAD_LEN {
            return Err(Error::PayloadTooLong {
                len: payload.len(),
                max: PAYLOAD_LEN,
            });
        }
        buf.fill(0);
        buf[0] = self.opcode().into();
        buf[1] = param;
        buf[OP_LEN..OP_LEN + payload.len()].copy_from_slice(payload);
        Ok(())
    }
}

/// Hex encode a raw signature the way a verify command carries it.
pub fn signature_to_hex(signature: &[u8; SIGNATURE_LEN]) -> [u8; SIGNATURE_HEX_LEN] {
    let mut out = [0; SIGNATURE_HEX_LEN];
    hex::encode_to_slice(signature, &mut out).expect("output is twice the input length");
    out
}

/// Report returned for every command. Reused between commands by the bootloader.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Report {
    buf: [u8; REPORT_SIZE],
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    pub const fn new() -> Self {
        Self { buf: [0; REPORT_SIZE] }
    }

    /// Clear the whole report and echo `opcode` into byte 0.
    pub fn reset(&mut self, opcode: u8) {
        self.buf.fill(0);
        self.buf[0] = opcode;
    }

    pub fn opcode(&self) -> u8 {
        self.buf[0]
    }

    pub fn set_status(&mut self, status: Status) {
        self.buf[1] = status as u8;
    }

    /// Status of the command. A version report carries no status and yields `Err(0)`.
    pub fn status(&self) -> Result<Status, u8> {
        Status::try_from(self.buf[1])
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[OP_LEN..]
    }

    /// Copy a version string into the payload, keeping at least one terminating NUL.
    pub fn set_version(&mut self, version: &str) {
        let len = version.len().min(PAYLOAD_LEN - 1);
        self.buf[OP_LEN..OP_LEN + len].copy_from_slice(&version.as_bytes()[..len]);
    }

    /// Version string up to the first NUL byte.
    pub fn version(&self) -> Option<&str> {
        let payload = self.payload();
        let end = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
        match core::str::from_utf8(&payload[..end]) {
            Ok(version) if !version.is_empty() => Some(version),
            _ => None,
        }
    }

    /// Write the hex encoded firmware fingerprint into the payload.
    pub fn set_fingerprint(&mut self, fingerprint: &[u8; 32]) {
        hex::encode_to_slice(fingerprint, &mut self.buf[OP_LEN..OP_LEN + FINGERPRINT_HEX_LEN])
            .expect("output is twice the input length");
    }

    /// Decode the firmware fingerprint, if the payload carries one.
    pub fn fingerprint(&self) -> Option<[u8; 32]> {
        let mut fingerprint = [0; 32];
        hex::decode_to_slice(&self.buf[OP_LEN..OP_LEN + FINGERPRINT_HEX_LEN], &mut fingerprint).ok()?;
        Some(fingerprint)
    }
}
