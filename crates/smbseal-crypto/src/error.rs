//! Error types for cryptographic operations

use thiserror::Error;

/// Errors that can occur during cryptographic operations
///
/// Authentication failures are not errors: AEAD and signature verification
/// report them as `Ok(false)` (or `Ok(None)` for transform decryption).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid key size
    #[error("Invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize {
        /// Expected key size in bytes
        expected: usize,
        /// Actual key size in bytes
        actual: usize,
    },

    /// Invalid nonce or IV size
    #[error("Invalid nonce size for {mode}: got {actual}")]
    InvalidNonceSize {
        /// AEAD mode the nonce was supplied to
        mode: &'static str,
        /// Actual nonce size in bytes
        actual: usize,
    },

    /// Message does not fit in the length field of the selected mode
    #[error("Message of {len} bytes exceeds {mode} limit of {max} bytes")]
    MessageTooLong {
        /// AEAD mode
        mode: &'static str,
        /// Message length in bytes
        len: usize,
        /// Largest encodable length
        max: u64,
    },

    /// Message is shorter than the header it must carry
    #[error("Message too short: need at least {needed} bytes, got {actual}")]
    MessageTooShort {
        /// Minimum length in bytes
        needed: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Transform header carries an unexpected protocol identifier
    #[error("Invalid transform header protocol id: {0:02x?}")]
    InvalidProtocolId([u8; 4]),

    /// Working buffer could not be allocated
    #[error("Failed to allocate {needed} byte working buffer for {operation}")]
    Allocation {
        /// Operation that requested the buffer
        operation: &'static str,
        /// Requested size in bytes
        needed: usize,
    },

    /// Dialect derives keys from the preauth-integrity hash but none was given
    #[error("Dialect {0} requires a preauth integrity hash for key derivation")]
    MissingPreauthHash(&'static str),

    /// ARC4 key outside the 1..=256 byte range
    #[error("Invalid ARC4 key length: {0} (must be 1-256 bytes)")]
    InvalidArc4KeyLength(usize),
}
