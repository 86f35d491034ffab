// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    bootloader::{
        sim::{RamFlash, Secp256k1Verifier},
        Bootloader, Secp256k1Verify, VerificationResult,
    },
    colored::Colorize,
    consts::{APP_LEN, CHUNK_LEN, ERASED_BYTE, FLASH_SIZE, PUBKEY, SIGNATURE_LEN},
    host_protocol::{signature_to_hex, Command, Opcode, Status, COMMAND_SIZE},
    sha2::Digest,
    std::{
        ffi::OsString,
        io::{Read, Write},
        path::Path,
    },
    tracing_subscriber::{fmt, prelude::*, EnvFilter},
};

mod args;

#[cfg(test)]
mod tests;

fn main() -> std::process::ExitCode {
    main_args(std::env::args_os(), &mut std::io::stdout(), &mut std::io::stderr()).into()
}

fn main_args<I, T>(args: I, stdout: impl Write, mut stderr: impl Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match run(args, stdout) {
        Ok(()) => ExitCode(0),
        Err(Error::Args(e @ args::Error::Cli(_))) => {
            // Clap already does the "error: {}" formatting.
            writeln!(stderr, "{e}").expect("write error to stderr");
            ExitCode(1)
        }
        Err(e) => {
            writeln!(stderr, "{} {e}", "error:".bold().red()).expect("write error to stderr");
            ExitCode(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Tests run the tool many times in one process, only the first call installs the
    // subscriber. Core crate `log` records are bridged by the subscriber.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn run<I, T>(args: I, mut stdout: impl Write) -> Result<(), Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = args::args(args)?;
    init_tracing(args.verbose);

    match args.command {
        args::Command::Fingerprint { input } => {
            let image = read_image(&input)?;
            writeln!(
                &mut stdout,
                "{:12} {}",
                "fingerprint".bold(),
                hex::encode(fingerprint(&image))
            )
            .map_err(Error::Stdout)?;
            let human_size = humansize::format_size(image.len(), humansize::BINARY);
            writeln!(&mut stdout, "{:12} {human_size} ({})", "size".bold(), image.len())
                .map_err(Error::Stdout)?;
        }
        args::Command::Sign {
            pubkey: expected_pubkey,
            secret,
            input,
            output,
        } => {
            // Check that user is not accidentally signing with the wrong key.
            let secp = secp256k1::Secp256k1::new();
            let pubkey = secret.public_key(&secp);
            if let Some(expected_pubkey) = expected_pubkey {
                if pubkey != expected_pubkey {
                    return Err(Error::KeyMismatch);
                }
            }

            let image = read_image(&input)?;
            let fingerprint = fingerprint(&image);
            let signature = secp
                .sign_ecdsa(&secp256k1::Message::from_digest(fingerprint), &secret)
                .serialize_compact();
            tracing::debug!("signed fingerprint {}", hex::encode(fingerprint));

            // Sanity check with the verifier the simulated device uses.
            if Secp256k1Verifier::default().verify_ecdsa(fingerprint, signature, pubkey.serialize())
                != VerificationResult::Valid
            {
                return Err(Error::SelfCheck);
            }

            std::fs::write(&output, hex::encode(signature)).map_err(Error::WriteOutputFile)?;
        }
        args::Command::Pack {
            input,
            signature,
            output,
        } => {
            let image = read_image(&input)?;
            let signature = read_signature(&signature)?;
            let frames = pack(&image, &signature)?;
            std::fs::write(&output, &frames).map_err(Error::WriteOutputFile)?;
            writeln!(&mut stdout, "{:12} {}", "frames".bold(), frames.len() / COMMAND_SIZE)
                .map_err(Error::Stdout)?;
        }
        args::Command::Simulate { frames, pubkey } => {
            let mut frames_buf = Vec::new();
            std::fs::File::open(frames)
                .map_err(Error::OpenInputFile)?
                .read_to_end(&mut frames_buf)
                .map_err(Error::ReadInputFile)?;
            let pubkey = pubkey.map_or(PUBKEY, |p| p.serialize());
            simulate(&frames_buf, pubkey, &mut stdout)?;
        }
    }
    Ok(())
}

/// Read a raw firmware image, rejecting images that do not fit the application partition.
fn read_image(path: &Path) -> Result<Vec<u8>, Error> {
    let mut image = Vec::new();
    std::fs::File::open(path)
        .map_err(Error::OpenInputFile)?
        .read_to_end(&mut image)
        .map_err(Error::ReadInputFile)?;
    if image.len() > APP_LEN as usize {
        return Err(Error::ImageTooLarge { size: image.len() });
    }
    Ok(image)
}

fn read_signature(path: &Path) -> Result<[u8; SIGNATURE_LEN], Error> {
    let signature = std::fs::read_to_string(path).map_err(Error::ReadSignatureFile)?;
    let mut out = [0u8; SIGNATURE_LEN];
    hex::decode_to_slice(signature.trim(), &mut out).map_err(|_| Error::InvalidSignature)?;
    Ok(out)
}

/// Double SHA-256 of the application partition once `image` is written to it.
fn fingerprint(image: &[u8]) -> [u8; 32] {
    let mut padded = image.to_vec();
    padded.resize(APP_LEN as usize, ERASED_BYTE);
    sha2::Sha256::digest(sha2::Sha256::digest(&padded)).into()
}

/// Erase, one write per chunk of the image with the last chunk padded, then verify.
fn pack(image: &[u8], signature: &[u8; SIGNATURE_LEN]) -> Result<Vec<u8>, Error> {
    let mut frames = Vec::new();
    let mut frame = [0u8; COMMAND_SIZE];

    Command::Erase.encode(&mut frame)?;
    frames.extend_from_slice(&frame);

    for (idx, data) in image.chunks(CHUNK_LEN as usize).enumerate() {
        let mut chunk = [ERASED_BYTE; CHUNK_LEN as usize];
        chunk[..data.len()].copy_from_slice(data);
        Command::Write {
            chunk_idx: u8::try_from(idx).map_err(|_| Error::ImageTooLarge { size: image.len() })?,
            chunk: &chunk,
        }
        .encode(&mut frame)?;
        frames.extend_from_slice(&frame);
    }

    let signature_hex = signature_to_hex(signature);
    Command::Verify {
        signature_hex: &signature_hex,
    }
    .encode(&mut frame)?;
    frames.extend_from_slice(&frame);

    Ok(frames)
}

/// Run every frame through a bootloader session over a blank in-memory flash.
fn simulate(frames: &[u8], pubkey: [u8; 33], mut stdout: impl Write) -> Result<(), Error> {
    if frames.len() % COMMAND_SIZE != 0 {
        return Err(Error::FramesLength(frames.len()));
    }

    let mut mem = vec![ERASED_BYTE; FLASH_SIZE as usize];
    let mut bl = Bootloader::with_pubkey(RamFlash::new(&mut mem), Secp256k1Verifier::default(), pubkey);
    let mut last_verify = None;

    for (idx, frame) in frames.chunks_exact(COMMAND_SIZE).enumerate() {
        let frame: &[u8; COMMAND_SIZE] = frame.try_into().expect("exact chunk");
        let report = bl.dispatch(frame);

        let opcode = char::from(report.opcode());
        let status = match report.status() {
            Ok(Status::Ok) => Status::Ok.name().green(),
            Ok(status) => status.name().red(),
            Err(_) => report.version().unwrap_or_default().normal(),
        };
        writeln!(&mut stdout, "{idx:4} {opcode} {status}").map_err(Error::Stdout)?;

        if report.opcode() == u8::from(Opcode::Verify) {
            last_verify = Some((report.status(), report.fingerprint()));
        }
    }

    let lock = bl.lock_state().map_err(|_| Error::LockRead)?;
    tracing::debug!("{} flash writes, {} erases", bl.flash().writes(), bl.flash().erases());

    let Some((status, fingerprint)) = last_verify else {
        return Err(Error::NoVerify);
    };
    if let Some(fingerprint) = fingerprint {
        writeln!(&mut stdout, "{:12} {}", "fingerprint".bold(), hex::encode(fingerprint))
            .map_err(Error::Stdout)?;
    }
    writeln!(&mut stdout, "{:12} {lock:#04x}", "lock".bold()).map_err(Error::Stdout)?;

    match status {
        Ok(Status::Ok) => Ok(()),
        Ok(status) => Err(Error::VerifyFailed(status)),
        Err(byte) => Err(Error::InvalidStatus(byte)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExitCode(u8);

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        code.0.into()
    }
}

#[derive(Debug)]
enum Error {
    Args(args::Error),
    Encode(host_protocol::Error),
    FramesLength(usize),
    ImageTooLarge { size: usize },
    InvalidSignature,
    InvalidStatus(u8),
    KeyMismatch,
    LockRead,
    NoVerify,
    OpenInputFile(std::io::Error),
    ReadInputFile(std::io::Error),
    ReadSignatureFile(std::io::Error),
    SelfCheck,
    Stdout(std::io::Error),
    VerifyFailed(Status),
    WriteOutputFile(std::io::Error),
}

impl From<args::Error> for Error {
    fn from(e: args::Error) -> Self {
        Error::Args(e)
    }
}

impl From<host_protocol::Error> for Error {
    fn from(e: host_protocol::Error) -> Self {
        Error::Encode(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Args(e) => write!(f, "{e}"),
            Error::Encode(e) => write!(f, "failed to encode command: {e}"),
            Error::FramesLength(len) => write!(
                f,
                "frames file is {len} bytes, not a multiple of the {COMMAND_SIZE} byte command size"
            ),
            Error::ImageTooLarge { size } => write!(
                f,
                "image of {size} bytes exceeds the {APP_LEN} byte application partition"
            ),
            Error::InvalidSignature => {
                write!(f, "signature file must hold {} hex characters", SIGNATURE_LEN * 2)
            }
            Error::InvalidStatus(byte) => write!(f, "device returned unknown status {byte:#04x}"),
            Error::KeyMismatch => write!(f, "public key does not match secret key"),
            Error::LockRead => write!(f, "failed to read the lock byte"),
            Error::NoVerify => write!(f, "frames contain no verify command"),
            Error::OpenInputFile(e) => write!(f, "failed to open input file: {e}"),
            Error::ReadInputFile(e) => write!(f, "failed to read input file: {e}"),
            Error::ReadSignatureFile(e) => write!(f, "failed to read signature file: {e}"),
            Error::SelfCheck => write!(f, "signature does not verify after signing"),
            Error::Stdout(e) => write!(f, "failed to write to stdout: {e}"),
            Error::VerifyFailed(status) => write!(f, "firmware signature verification failed: {status}"),
            Error::WriteOutputFile(e) => write!(f, "failed to write to output file: {e}"),
        }
    }
}

impl std::error::Error for Error {}
