use {
    clap::Parser,
    sec1::der::Decode,
    std::path::{Path, PathBuf},
};

mod cli;
mod config;

pub use config::Error as ConfigError;

/// Program arguments loaded from the CLI and config file.
#[derive(Debug, Clone)]
pub struct Args {
    pub verbose: bool,
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum Command {
    /// Print the fingerprint of a firmware image.
    Fingerprint { input: PathBuf },
    /// Sign a firmware image.
    Sign {
        pubkey: Option<secp256k1::PublicKey>,
        secret: secp256k1::SecretKey,
        input: PathBuf,
        output: PathBuf,
    },
    /// Pack an image and its signature into command frames.
    Pack {
        input: PathBuf,
        signature: PathBuf,
        output: PathBuf,
    },
    /// Replay command frames against a simulated device.
    Simulate {
        frames: PathBuf,
        pubkey: Option<secp256k1::PublicKey>,
    },
}

pub fn args<I, T>(args: I) -> Result<Args, Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Args::try_parse_from(args).map_err(Error::Cli)?;
    let command = match cli.command {
        cli::Command::Fingerprint { input } => Command::Fingerprint { input },
        cli::Command::Sign {
            pubkey,
            secret,
            config,
            input,
            output,
        } => {
            let config = config.map(|c| config::Config::load(&c)).transpose()?;
            let pubkey = reconcile_pubkey(pubkey, config.as_ref())?;
            let config_secret_path = config
                .as_ref()
                .and_then(|config| {
                    config.secret.as_ref().map(|secret| {
                        if !secret.is_absolute() {
                            return Err(Error::SecretPathNotAbsoluteInConfig(secret.clone()));
                        }
                        Ok(secret.clone())
                    })
                })
                .transpose()?;

            // Error if the secret is specified both on the CLI and in the config file.
            let secret = match (secret, config_secret_path) {
                (None, None) => return Err(Error::SecretMissing),
                (None, Some(secret_path)) => secret_path,
                (Some(secret), None) => secret,
                (Some(_), Some(_)) => return Err(Error::SecretInConfigAndCli),
            };

            Command::Sign {
                pubkey: pubkey.map(|p| parse_pubkey(&p)).transpose()?,
                secret: load_secret(&secret)?,
                input,
                output,
            }
        }
        cli::Command::Pack {
            input,
            signature,
            output,
        } => Command::Pack {
            input,
            signature,
            output,
        },
        cli::Command::Simulate {
            frames,
            pubkey,
            config,
        } => {
            let config = config.map(|c| config::Config::load(&c)).transpose()?;
            let pubkey = reconcile_pubkey(pubkey, config.as_ref())?;
            Command::Simulate {
                frames,
                pubkey: pubkey.map(|p| parse_pubkey(&p)).transpose()?,
            }
        }
    };
    Ok(Args {
        verbose: cli.verbose,
        command,
    })
}

fn reconcile_pubkey(cli: Option<String>, config: Option<&config::Config>) -> Result<Option<String>, Error> {
    match (cli, config.and_then(|config| config.pubkey.clone())) {
        (None, None) => Ok(None),
        (None, Some(pubkey)) | (Some(pubkey), None) => Ok(Some(pubkey)),
        (Some(_), Some(_)) => Err(Error::PubkeyInConfigAndCli),
    }
}

fn parse_pubkey(pubkey: &str) -> Result<secp256k1::PublicKey, Error> {
    secp256k1::PublicKey::from_slice(&hex::decode(pubkey).map_err(|_| Error::InvalidPubkeyHex)?)
        .map_err(Error::InvalidPubkey)
}

fn load_secret(path: &Path) -> Result<secp256k1::SecretKey, Error> {
    let pem = std::fs::read(path).map_err(Error::ReadPemFile)?;
    let key = pem::parse(pem)?;
    if key.tag() != "EC PRIVATE KEY" {
        return Err(Error::InvalidPemTag(key.tag().to_string()));
    }
    let secret = sec1::EcPrivateKey::from_der(key.contents())
        .map_err(Error::ParseDerContent)?
        .private_key;
    secp256k1::SecretKey::from_slice(secret).map_err(Error::InvalidSecretKey)
}

#[derive(Debug)]
pub enum Error {
    Cli(clap::Error),
    Config(ConfigError),
    InvalidPemTag(String),
    InvalidPubkey(secp256k1::Error),
    InvalidPubkeyHex,
    InvalidSecretKey(secp256k1::Error),
    ParseDerContent(sec1::der::Error),
    ParsePemFile(pem::PemError),
    PubkeyInConfigAndCli,
    ReadPemFile(std::io::Error),
    SecretInConfigAndCli,
    SecretMissing,
    SecretPathNotAbsoluteInConfig(PathBuf),
}

impl From<pem::PemError> for Error {
    fn from(e: pem::PemError) -> Self {
        Error::ParsePemFile(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Cli(e) => write!(f, "{}", e.render().ansi()),
            Error::Config(e) => write!(f, "config error: {e}"),
            Error::InvalidPemTag(tag) => {
                write!(f, r#"invalid PEM tag: "{tag}", expected "EC PRIVATE KEY""#)
            }
            Error::InvalidPubkey(e) => write!(f, "user specified invalid public key: {e}"),
            Error::InvalidPubkeyHex => write!(f, "user specified invalid public key hex"),
            Error::InvalidSecretKey(e) => write!(f, "user specified invalid secret key: {e}"),
            Error::ParseDerContent(e) => {
                write!(f, "failed to parse DER content inside PEM file: {e}")
            }
            Error::ParsePemFile(e) => write!(f, "invalid PEM file: {e}"),
            Error::PubkeyInConfigAndCli => write!(f, "pubkey specified in both config and cli"),
            Error::ReadPemFile(e) => write!(f, "failed to read PEM file: {e}"),
            Error::SecretInConfigAndCli => write!(f, "secret specified in both config and cli"),
            Error::SecretMissing => write!(f, "user did not specify a secret key"),
            Error::SecretPathNotAbsoluteInConfig(path) => {
                write!(
                    f,
                    r#"config error: secret key path is not absolute: "{}""#,
                    path.to_str().unwrap_or("<invalid path>")
                )
            }
        }
    }
}

impl std::error::Error for Error {}
