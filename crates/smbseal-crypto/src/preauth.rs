//! SMB 3.1.1 preauth-integrity hash
//!
//! Starts as 64 zero bytes and absorbs every NEGOTIATE and SESSION_SETUP
//! message in wire order: `H = SHA-512(H || message)`. The final value is the
//! key derivation context for the session.

use crate::provider::CryptoProvider;
use crate::sha512::DIGEST_LEN;

/// Running preauth-integrity hash value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreauthHash {
    value: [u8; DIGEST_LEN],
}

impl PreauthHash {
    /// The initial all-zero value
    pub const fn new() -> Self {
        Self {
            value: [0u8; DIGEST_LEN],
        }
    }

    /// Continue from a saved value, e.g. a connection's hash when a
    /// session setup branches off it
    pub const fn from_value(value: [u8; DIGEST_LEN]) -> Self {
        Self { value }
    }

    /// Absorb one message, given as fragments in wire order
    pub fn update(&mut self, provider: &CryptoProvider, message: &[&[u8]]) {
        provider.sha512_running(&mut self.value, message);
    }

    /// Current hash value
    pub const fn value(&self) -> &[u8; DIGEST_LEN] {
        &self.value
    }
}

impl Default for PreauthHash {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha512};

    #[test]
    fn test_chain_matches_reference_sha512() {
        let provider = CryptoProvider::new();
        let mut hash = PreauthHash::new();
        hash.update(&provider, &[b"negotiate ", b"request"]);
        hash.update(&provider, &[b"negotiate response"]);

        let mut expected = [0u8; 64];
        for message in [&b"negotiate request"[..], b"negotiate response"] {
            let mut sha = Sha512::new();
            sha.update(expected);
            sha.update(message);
            expected.copy_from_slice(&sha.finalize());
        }
        assert_eq!(hash.value(), &expected);
    }

    #[test]
    fn test_branching_from_saved_value() {
        let provider = CryptoProvider::new();
        let mut connection = PreauthHash::new();
        connection.update(&provider, &[b"negotiate"]);

        let mut session = PreauthHash::from_value(*connection.value());
        session.update(&provider, &[b"session setup"]);
        assert_ne!(session, connection);
        assert_eq!(PreauthHash::default().value(), &[0u8; 64]);
    }
}
