//! Signing, encryption and key derivation for SMB1, SMB2 and SMB3
//!
//! This crate implements from first principles every primitive the SMB
//! protocol family and its authentication companions (NTLM, Netlogon) need,
//! and the protocol compositions built on top of them.
//!
//! # Components
//!
//! - **Digests**: MD4, MD5, SHA-256, SHA-512 (including the running form
//!   used for the preauth-integrity hash)
//! - **MACs**: HMAC-MD5, HMAC-SHA-256, AES-128-CMAC
//! - **Ciphers**: AES-128 (forward direction), AES-128-CCM, AES-128-GCM,
//!   DES, ARC4
//! - **Protocol**: per-dialect message signing, the SP800-108 key derivation,
//!   SMB3 transform encryption, NTLM responses and session security,
//!   Netlogon session keys and credential chain
//!
//! # Pluggable primitives
//!
//! Protocol code never calls a primitive directly. It goes through a
//! [`CryptoProvider`], whose slots default to the software implementations
//! in this crate and can be overridden one family at a time with a
//! [`ProviderTable`]. Overriding only MD5, for instance, leaves the
//! MD4-based NT hash untouched.
//!
//! # Examples
//!
//! ## SMB 3.0 session keys and signing
//!
//! ```
//! use smbseal_crypto::{CryptoProvider, Dialect, SessionKeys, signing};
//!
//! let provider = CryptoProvider::new();
//! let keys = SessionKeys::derive(&provider, Dialect::Smb300, &[0x11; 16], None)
//!     .expect("SMB 3.0 needs no preauth hash");
//!
//! let mut header = [0u8; 64];
//! header[..4].copy_from_slice(b"\xfeSMB");
//! signing::sign(&provider, Dialect::Smb300, &keys.signing, &mut header, &[b"payload"])
//!     .expect("header is complete");
//! assert!(signing::verify(&provider, Dialect::Smb300, &keys.signing, &header, &[b"payload"])
//!     .expect("header is complete"));
//! ```
//!
//! ## Password hashes
//!
//! ```
//! use smbseal_crypto::{CryptoProvider, legacy, ntlm};
//!
//! let provider = CryptoProvider::new();
//! let nt = ntlm::nt_hash(&provider, "password");
//! assert_eq!(nt[..4], [0x88, 0x46, 0xf7, 0xea]);
//! assert_eq!(legacy::lm_hash("")[..2], [0xaa, 0xd3]);
//! ```

#![warn(missing_docs)]

pub mod aes;
pub mod arc4;
pub mod ccm;
pub mod cmac;
pub mod des;
pub mod error;
pub mod gcm;
pub mod hmac;
pub mod kdf;
pub mod legacy;
pub mod md4;
pub mod md5;
pub mod netlogon;
pub mod ntlm;
pub mod preauth;
pub mod provider;
pub mod scratch;
pub mod sha256;
pub mod sha512;
pub mod signing;
pub mod transform;
mod util;

pub use error::CryptoError;

// Re-export commonly used types
pub use aes::Aes128;
pub use arc4::Arc4Cipher;
pub use cmac::Cmac;
pub use kdf::{Dialect, Role, SessionKeys, derive_key};
pub use netlogon::CredentialChain;
pub use ntlm::NtlmSession;
pub use preauth::PreauthHash;
pub use provider::{AeadKey, CryptoProvider, ExpandedKey, ProviderTable, Slot};
pub use scratch::Scratch;
pub use transform::{CipherId, TransformHeader};
