//! SMB2/SMB3 session key derivation
//!
//! SP800-108 counter mode with HMAC-SHA-256 and a single iteration: the
//! derived key is the first 16 bytes of
//! `HMAC(key, 00000001 || label || 00 || context || 00000080)`.
//!
//! SMB 2.x signs with the session key directly. SMB 3.0 and 3.0.2 derive
//! each purpose key from a fixed label and context; SMB 3.1.1 replaces the
//! context with the preauth-integrity hash of the negotiation.

use std::fmt;

use crate::error::CryptoError;
use crate::provider::CryptoProvider;

/// Derived key length
pub const KEY_LEN: usize = 16;

/// Derived key bits, the trailing `L` field of the KDF input
const OUTPUT_BITS: u32 = 128;

/// Label and context pairs for SMB 3.0 / 3.0.2. Labels and contexts carry
/// their terminating NUL.
mod smb30 {
    pub const SIGNING: (&[u8], &[u8]) = (b"SMB2AESCMAC\0", b"SmbSign\0");
    pub const APPLICATION: (&[u8], &[u8]) = (b"SMB2APP\0", b"SmbRpc\0");
    pub const CLIENT_TO_SERVER: (&[u8], &[u8]) = (b"SMB2AESCCM\0", b"ServerIn \0");
    pub const SERVER_TO_CLIENT: (&[u8], &[u8]) = (b"SMB2AESCCM\0", b"ServerOut\0");
}

/// Labels for SMB 3.1.1, whose context is the preauth-integrity hash
mod smb311 {
    pub const SIGNING: &[u8] = b"SMBSigningKey\0";
    pub const APPLICATION: &[u8] = b"SMBAppKey\0";
    pub const CLIENT_TO_SERVER: &[u8] = b"SMBC2SCipherKey\0";
    pub const SERVER_TO_CLIENT: &[u8] = b"SMBS2CCipherKey\0";
}

/// Negotiated SMB2 dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dialect {
    /// SMB 2.0.2
    Smb202,
    /// SMB 2.1
    Smb210,
    /// SMB 3.0
    Smb300,
    /// SMB 3.0.2
    Smb302,
    /// SMB 3.1.1
    Smb311,
}

impl Dialect {
    /// Map a dialect revision from a NEGOTIATE response
    pub const fn from_wire(revision: u16) -> Option<Self> {
        match revision {
            0x0202 => Some(Self::Smb202),
            0x0210 => Some(Self::Smb210),
            0x0300 => Some(Self::Smb300),
            0x0302 => Some(Self::Smb302),
            0x0311 => Some(Self::Smb311),
            _ => None,
        }
    }

    /// Dialect revision as carried on the wire
    pub const fn to_wire(self) -> u16 {
        match self {
            Self::Smb202 => 0x0202,
            Self::Smb210 => 0x0210,
            Self::Smb300 => 0x0300,
            Self::Smb302 => 0x0302,
            Self::Smb311 => 0x0311,
        }
    }

    /// Whether this dialect signs with AES-CMAC and derives purpose keys
    pub const fn is_smb3(self) -> bool {
        matches!(self, Self::Smb300 | Self::Smb302 | Self::Smb311)
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Smb202 => "2.0.2",
            Self::Smb210 => "2.1",
            Self::Smb300 => "3.0",
            Self::Smb302 => "3.0.2",
            Self::Smb311 => "3.1.1",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which end of a connection is deriving or using keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The side that sent NEGOTIATE / NEGOTIATE_MESSAGE
    Client,
    /// The side that answered it
    Server,
}

/// SP800-108 counter mode KDF, one HMAC-SHA-256 iteration truncated to 16
/// bytes. `label` should include its terminating NUL; the separator byte is
/// added here.
pub fn derive_key(
    provider: &CryptoProvider,
    key: &[u8],
    label: &[u8],
    context: &[u8],
) -> [u8; KEY_LEN] {
    let mac = provider.hmac_sha256(
        key,
        &[
            &1u32.to_be_bytes(),
            label,
            &[0],
            context,
            &OUTPUT_BITS.to_be_bytes(),
        ],
    );
    let mut derived = [0u8; KEY_LEN];
    derived.copy_from_slice(&mac[..KEY_LEN]);
    derived
}

/// Keys used by one SMB2/SMB3 session
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKeys {
    /// Dialect the keys were derived for
    pub dialect: Dialect,
    /// Message signing key
    pub signing: [u8; KEY_LEN],
    /// Key exported to the application layer (e.g. DCE/RPC over named pipes)
    pub application: [u8; KEY_LEN],
    /// Cipher key for client to server traffic (SMB3 only)
    pub client_to_server: Option<[u8; KEY_LEN]>,
    /// Cipher key for server to client traffic (SMB3 only)
    pub server_to_client: Option<[u8; KEY_LEN]>,
}

impl SessionKeys {
    /// Derive every purpose key from the authenticated session key.
    ///
    /// Only the first 16 bytes of `session_key` are used (shorter keys are
    /// zero padded). `preauth_hash` is required for SMB 3.1.1 and ignored
    /// otherwise.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MissingPreauthHash` for SMB 3.1.1 without a
    /// preauth hash.
    pub fn derive(
        provider: &CryptoProvider,
        dialect: Dialect,
        session_key: &[u8],
        preauth_hash: Option<&[u8; 64]>,
    ) -> Result<Self, CryptoError> {
        let mut base = [0u8; KEY_LEN];
        let used = session_key.len().min(KEY_LEN);
        base[..used].copy_from_slice(&session_key[..used]);

        let keys = match dialect {
            Dialect::Smb202 | Dialect::Smb210 => Self {
                dialect,
                signing: base,
                application: base,
                client_to_server: None,
                server_to_client: None,
            },
            Dialect::Smb300 | Dialect::Smb302 => {
                let derive = |(label, context): (&[u8], &[u8])| {
                    derive_key(provider, &base, label, context)
                };
                Self {
                    dialect,
                    signing: derive(smb30::SIGNING),
                    application: derive(smb30::APPLICATION),
                    client_to_server: Some(derive(smb30::CLIENT_TO_SERVER)),
                    server_to_client: Some(derive(smb30::SERVER_TO_CLIENT)),
                }
            }
            Dialect::Smb311 => {
                let context = preauth_hash.ok_or(CryptoError::MissingPreauthHash(dialect.name()))?;
                let derive = |label: &[u8]| derive_key(provider, &base, label, context);
                Self {
                    dialect,
                    signing: derive(smb311::SIGNING),
                    application: derive(smb311::APPLICATION),
                    client_to_server: Some(derive(smb311::CLIENT_TO_SERVER)),
                    server_to_client: Some(derive(smb311::SERVER_TO_CLIENT)),
                }
            }
        };
        Ok(keys)
    }

    /// `(encrypt, decrypt)` cipher keys as seen from `role`
    pub fn cipher_keys(&self, role: Role) -> Option<([u8; KEY_LEN], [u8; KEY_LEN])> {
        let c2s = self.client_to_server?;
        let s2c = self.server_to_client?;
        Some(match role {
            Role::Client => (c2s, s2c),
            Role::Server => (s2c, c2s),
        })
    }
}

impl fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeys")
            .field("dialect", &self.dialect)
            .field("encryption", &self.client_to_server.is_some())
            .finish_non_exhaustive()
    }
}
