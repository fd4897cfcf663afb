//! Command-line definitions and command execution.
//!
//! Every command returns its output as lines of text so that `main` only
//! prints and the commands can be tested without capturing stdout.
//!
//! # Configuration Sources
//!
//! - CLI arguments
//! - `SMBSEAL_OUTPUT` for the output encoding (`hex` or `upper`)

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use smbseal_crypto::{CryptoProvider, Dialect, SessionKeys, legacy, ntlm, signing};

/// Command-line interface for the smbseal engine
#[derive(Debug, Parser)]
#[command(
    name = "smbseal",
    about = "Hashes, key derivation and message signing for SMB1/SMB2/SMB3",
    version
)]
pub struct Cli {
    /// Output encoding for binary results
    #[arg(
        long,
        global = true,
        env = "SMBSEAL_OUTPUT",
        value_enum,
        default_value_t = OutputFormat::Hex
    )]
    pub output: OutputFormat,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Encoding of binary output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Lowercase hex
    Hex,
    /// Uppercase hex
    Upper,
}

/// Supported operations
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Digest of the input
    Hash {
        /// Digest algorithm
        #[arg(long, short, value_enum, default_value_t = HashAlgorithm::Sha256)]
        algorithm: HashAlgorithm,

        #[command(flatten)]
        input: Input,
    },

    /// NT one-way hash (MD4 of the UTF-16LE password)
    NtHash {
        /// Password
        password: String,
    },

    /// LAN Manager hash
    LmHash {
        /// Password
        password: String,
    },

    /// Derive SMB2/SMB3 session keys
    Kdf {
        /// Negotiated dialect
        #[arg(long, short, value_enum)]
        dialect: DialectArg,

        /// Session key from authentication (hex)
        #[arg(long)]
        session_key: String,

        /// Preauth-integrity hash (hex, 64 bytes), required for 3.1.1
        #[arg(long)]
        preauth_hash: Option<String>,
    },

    /// Sign an SMB2/SMB3 message and print the signature
    Sign {
        /// Negotiated dialect
        #[arg(long, short, value_enum)]
        dialect: DialectArg,

        /// Signing key (hex, 16 bytes)
        #[arg(long)]
        key: String,

        /// Complete message starting with the 64-byte header (hex)
        message: String,
    },

    /// AES-128-CMAC of the input
    Cmac {
        /// Key (hex, 16 bytes)
        #[arg(long)]
        key: String,

        #[command(flatten)]
        input: Input,
    },
}

/// Message data given on the command line
#[derive(Debug, Args)]
pub struct Input {
    /// Data to process
    pub data: String,

    /// Treat `data` as hex instead of UTF-8 text
    #[arg(long = "hex", short = 'x')]
    pub is_hex: bool,
}

impl Input {
    fn bytes(&self) -> Result<Vec<u8>> {
        if self.is_hex {
            hex::decode(&self.data).context("input is not valid hex")
        } else {
            Ok(self.data.as_bytes().to_vec())
        }
    }
}

/// Digest algorithms exposed on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HashAlgorithm {
    /// MD4
    Md4,
    /// MD5
    Md5,
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
}

/// SMB2 dialects exposed on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    /// SMB 2.0.2
    #[value(name = "2.0.2")]
    Smb202,
    /// SMB 2.1
    #[value(name = "2.1")]
    Smb210,
    /// SMB 3.0
    #[value(name = "3.0")]
    Smb300,
    /// SMB 3.0.2
    #[value(name = "3.0.2")]
    Smb302,
    /// SMB 3.1.1
    #[value(name = "3.1.1")]
    Smb311,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Smb202 => Self::Smb202,
            DialectArg::Smb210 => Self::Smb210,
            DialectArg::Smb300 => Self::Smb300,
            DialectArg::Smb302 => Self::Smb302,
            DialectArg::Smb311 => Self::Smb311,
        }
    }
}

fn decode_fixed<const N: usize>(what: &str, value: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(value).with_context(|| format!("{what} is not valid hex"))?;
    let Ok(array) = <[u8; N]>::try_from(bytes.as_slice()) else {
        bail!("{what} must be {N} bytes, got {}", bytes.len());
    };
    Ok(array)
}

impl Cli {
    fn encode(&self, bytes: &[u8]) -> String {
        match self.output {
            OutputFormat::Hex => hex::encode(bytes),
            OutputFormat::Upper => hex::encode_upper(bytes),
        }
    }

    /// Execute the selected command and return its output lines
    pub fn run(&self) -> Result<Vec<String>> {
        let provider = CryptoProvider::new();

        let lines = match &self.command {
            Command::Hash { algorithm, input } => {
                let data = input.bytes()?;
                let fragments: &[&[u8]] = &[&data];
                let digest = match algorithm {
                    HashAlgorithm::Md4 => provider.md4(fragments).to_vec(),
                    HashAlgorithm::Md5 => provider.md5(fragments).to_vec(),
                    HashAlgorithm::Sha256 => provider.sha256(fragments).to_vec(),
                    HashAlgorithm::Sha512 => provider.sha512(fragments).to_vec(),
                };
                vec![self.encode(&digest)]
            }
            Command::NtHash { password } => vec![self.encode(&ntlm::nt_hash(&provider, password))],
            Command::LmHash { password } => vec![self.encode(&legacy::lm_hash(password))],
            Command::Kdf {
                dialect,
                session_key,
                preauth_hash,
            } => {
                let session_key =
                    hex::decode(session_key).context("session key is not valid hex")?;
                let preauth = preauth_hash
                    .as_deref()
                    .map(|value| decode_fixed::<64>("preauth hash", value))
                    .transpose()?;
                let keys = SessionKeys::derive(
                    &provider,
                    (*dialect).into(),
                    &session_key,
                    preauth.as_ref(),
                )?;

                let mut lines = vec![
                    format!("signing: {}", self.encode(&keys.signing)),
                    format!("application: {}", self.encode(&keys.application)),
                ];
                if let (Some(c2s), Some(s2c)) = (keys.client_to_server, keys.server_to_client) {
                    lines.push(format!("client-to-server: {}", self.encode(&c2s)));
                    lines.push(format!("server-to-client: {}", self.encode(&s2c)));
                }
                lines
            }
            Command::Sign {
                dialect,
                key,
                message,
            } => {
                let key = decode_fixed::<16>("key", key)?;
                let mut message = hex::decode(message).context("message is not valid hex")?;
                signing::sign(&provider, (*dialect).into(), &key, &mut message, &[])?;
                vec![self.encode(&message[48..64])]
            }
            Command::Cmac { key, input } => {
                let key = decode_fixed::<16>("key", key)?;
                vec![self.encode(&provider.aes_cmac(&key, &[&input.bytes()?]))]
            }
        };
        Ok(lines)
    }
}
