//! Command line arguments.

use std::path::PathBuf;

#[derive(clap::Parser)]
#[command(version, about)]
pub struct Args {
    /// Log debug output from the tool and the simulated bootloader.
    #[clap(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Print the fingerprint the bootloader reports for a firmware image.
    Fingerprint {
        /// The raw firmware image.
        #[clap(short, long)]
        input: PathBuf,
    },
    /// Sign a firmware image.
    Sign {
        /// The public key in hex, verified against the secret key to avoid
        /// accidental signing.
        #[clap(long)]
        pubkey: Option<String>,
        /// Path to PEM-encoded secret key.
        #[clap(long)]
        secret: Option<PathBuf>,
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
        /// The raw firmware image.
        #[clap(short, long)]
        input: PathBuf,
        /// Path to write the hex encoded signature.
        #[clap(short, long)]
        output: PathBuf,
    },
    /// Pack a firmware image and its signature into bootloader commands.
    Pack {
        /// The raw firmware image.
        #[clap(short, long)]
        input: PathBuf,
        /// Hex encoded signature written by the sign command.
        #[clap(short, long)]
        signature: PathBuf,
        /// Path to write the command frames.
        #[clap(short, long)]
        output: PathBuf,
    },
    /// Replay command frames against a simulated device.
    Simulate {
        /// Command frames written by the pack command.
        #[clap(short, long)]
        frames: PathBuf,
        /// Public key in hex the simulated device verifies against, instead of
        /// the device key.
        #[clap(long)]
        pubkey: Option<String>,
        /// Path to config file.
        #[clap(long, short)]
        config: Option<PathBuf>,
    },
}
