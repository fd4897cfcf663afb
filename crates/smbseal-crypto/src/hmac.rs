//! HMAC (RFC 2104) over MD5 and SHA-256
//!
//! Both hashes use a 64-byte block, so the key block and pad handling are
//! shared. Keys longer than a block are hashed first.

use crate::md5::{self, Md5};
use crate::sha256::{self, Sha256};

const BLOCK_LEN: usize = 64;
const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// Build the inner and outer pad blocks for an already block-sized key.
pub(crate) fn pad_blocks(key_block: &[u8; BLOCK_LEN]) -> ([u8; BLOCK_LEN], [u8; BLOCK_LEN]) {
    let mut inner = [0u8; BLOCK_LEN];
    let mut outer = [0u8; BLOCK_LEN];
    for ((i, o), k) in inner.iter_mut().zip(outer.iter_mut()).zip(key_block) {
        *i = k ^ IPAD;
        *o = k ^ OPAD;
    }
    (inner, outer)
}

/// Zero-pad `key` into a block, hashing it first with `long_key` when it
/// exceeds the block size.
pub(crate) fn key_block(key: &[u8], long_key: impl FnOnce(&[u8]) -> Vec<u8>) -> [u8; BLOCK_LEN] {
    let mut block = [0u8; BLOCK_LEN];
    if key.len() > BLOCK_LEN {
        let hashed = long_key(key);
        block[..hashed.len()].copy_from_slice(&hashed);
    } else {
        block[..key.len()].copy_from_slice(key);
    }
    block
}

/// Incremental HMAC-MD5 state
#[derive(Clone)]
pub struct HmacMd5 {
    inner: Md5,
    outer_pad: [u8; BLOCK_LEN],
}

impl HmacMd5 {
    /// Start an HMAC-MD5 computation with `key`
    pub fn new(key: &[u8]) -> Self {
        let block = key_block(key, |k| md5::digest(&[k]).to_vec());
        let (inner_pad, outer_pad) = pad_blocks(&block);

        let mut inner = Md5::new();
        inner.update(&inner_pad);
        Self { inner, outer_pad }
    }

    /// Absorb more message bytes
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Return the 16-byte tag
    pub fn finalize(self) -> [u8; md5::DIGEST_LEN] {
        let inner = self.inner.finalize();
        md5::digest(&[&self.outer_pad, &inner])
    }
}

/// HMAC-MD5 of the concatenation of `fragments`
pub fn hmac_md5(key: &[u8], fragments: &[&[u8]]) -> [u8; md5::DIGEST_LEN] {
    let mut mac = HmacMd5::new(key);
    for fragment in fragments {
        mac.update(fragment);
    }
    mac.finalize()
}

/// HMAC-SHA-256 of the concatenation of `fragments`
///
/// Protocol code goes through [`crate::CryptoProvider::hmac_sha256`] so that
/// an overridden SHA-256 slot is honoured; this direct form exists for tests
/// and embedders that want the software path explicitly.
pub fn hmac_sha256(key: &[u8], fragments: &[&[u8]]) -> [u8; sha256::DIGEST_LEN] {
    let block = key_block(key, |k| sha256::digest(&[k]).to_vec());
    let (inner_pad, outer_pad) = pad_blocks(&block);

    let mut inner = Sha256::new();
    inner.update(&inner_pad);
    for fragment in fragments {
        inner.update(fragment);
    }
    let inner = inner.finalize();

    sha256::digest(&[&outer_pad, &inner])
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_md5_rfc2202() {
        assert_eq!(
            hex::encode(hmac_md5(&[0x0b; 16], &[b"Hi There"])),
            "9294727a3638bb1c13f48ef8158bfc9d"
        );
        assert_eq!(
            hex::encode(hmac_md5(b"Jefe", &[b"what do ya want ", b"for nothing?"])),
            "750c783e6ab0b503eaa86e310a5db738"
        );
        assert_eq!(
            hex::encode(hmac_md5(&[0xaa; 16], &[&[0xddu8; 50]])),
            "56be34521d144c88dbb8c733f0e8b3f6"
        );
    }

    #[test]
    fn test_hmac_md5_long_key() {
        // RFC 2202 test case 6: 80-byte key is hashed first
        assert_eq!(
            hex::encode(hmac_md5(
                &[0xaa; 80],
                &[b"Test Using Larger Than Block-Size Key - Hash Key First"]
            )),
            "6b1ab7fe4bd7bf8f0b62e6ce61b9d0cd"
        );
    }

    #[test]
    fn test_hmac_sha256_rfc4231() {
        assert_eq!(
            hex::encode(hmac_sha256(&[0x0b; 20], &[b"Hi There"])),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
        assert_eq!(
            hex::encode(hmac_sha256(b"Jefe", &[b"what do ya want for nothing?"])),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_md5_incremental_matches_one_shot() {
        let mut mac = HmacMd5::new(b"key");
        mac.update(b"The quick brown fox ");
        mac.update(b"jumps over the lazy dog");
        assert_eq!(
            hex::encode(mac.finalize()),
            "80070713463e7749b90c2dc24911e275"
        );
    }
}
