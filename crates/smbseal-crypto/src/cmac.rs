//! AES-128-CMAC (NIST SP 800-38B, RFC 4493)
//!
//! The last block is treated differently from every other block (XOR with
//! K1 when complete, padded and XORed with K2 otherwise), and an update call
//! cannot know whether more data will follow. So up to one full block is
//! held back and only chained once further input proves it was not final.

use crate::aes::{Aes128, BLOCK_LEN, Block, KEY_LEN};

/// CMAC tag length in bytes
pub const TAG_LEN: usize = BLOCK_LEN;

const RB: u128 = 0x87;

/// Doubling in GF(2^128) with the CMAC reduction constant
fn dbl(block: &Block) -> Block {
    let value = u128::from_be_bytes(*block);
    let shifted = value << 1;
    let reduced = if value >> 127 == 1 { shifted ^ RB } else { shifted };
    reduced.to_be_bytes()
}

/// Derive the two CMAC subkeys `(K1, K2)`
pub fn subkeys(cipher: &Aes128) -> (Block, Block) {
    let l = cipher.encrypt(&[0u8; BLOCK_LEN]);
    let k1 = dbl(&l);
    let k2 = dbl(&k1);
    (k1, k2)
}

/// Incremental AES-CMAC state
#[derive(Clone)]
pub struct Cmac {
    cipher: Aes128,
    k1: Block,
    k2: Block,
    chain: Block,
    pending: Block,
    pending_len: usize,
}

impl Cmac {
    /// Start a CMAC computation with a 16-byte key
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self::with_cipher(Aes128::new(key))
    }

    /// Start a CMAC computation with an already expanded key
    pub fn with_cipher(cipher: Aes128) -> Self {
        let (k1, k2) = subkeys(&cipher);
        Self {
            cipher,
            k1,
            k2,
            chain: [0u8; BLOCK_LEN],
            pending: [0u8; BLOCK_LEN],
            pending_len: 0,
        }
    }

    fn chain_block(&mut self, block: &Block) {
        for (c, b) in self.chain.iter_mut().zip(block) {
            *c ^= b;
        }
        self.cipher.encrypt_block(&mut self.chain);
    }

    /// Absorb more message bytes
    pub fn update(&mut self, mut data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let take = (BLOCK_LEN - self.pending_len).min(data.len());
        self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
        self.pending_len += take;
        data = &data[take..];
        if data.is_empty() {
            return;
        }

        // More input follows, so the held block was not the last one.
        let pending = self.pending;
        self.chain_block(&pending);

        while let Some((block, rest)) = data.split_first_chunk::<BLOCK_LEN>() {
            if rest.is_empty() {
                break;
            }
            self.chain_block(block);
            data = rest;
        }

        self.pending[..data.len()].copy_from_slice(data);
        self.pending_len = data.len();
    }

    /// Process the final block and return the 16-byte tag
    pub fn finalize(mut self) -> [u8; TAG_LEN] {
        let mut last = [0u8; BLOCK_LEN];
        if self.pending_len == BLOCK_LEN {
            for ((l, p), k) in last.iter_mut().zip(self.pending).zip(self.k1) {
                *l = p ^ k;
            }
        } else {
            last[..self.pending_len].copy_from_slice(&self.pending[..self.pending_len]);
            last[self.pending_len] = 0x80;
            for (l, k) in last.iter_mut().zip(self.k2) {
                *l ^= k;
            }
        }
        self.chain_block(&last);
        self.chain
    }
}

impl std::fmt::Debug for Cmac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cmac")
            .field("pending_len", &self.pending_len)
            .finish_non_exhaustive()
    }
}

/// AES-128-CMAC of the concatenation of `fragments`
pub fn aes_cmac(key: &[u8; KEY_LEN], fragments: &[&[u8]]) -> [u8; TAG_LEN] {
    let mut cmac = Cmac::new(key);
    for fragment in fragments {
        cmac.update(fragment);
    }
    cmac.finalize()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];

    fn message() -> Vec<u8> {
        hex::decode(
            "6bc1bee22e409f96e93d7e117393172a\
             ae2d8a571e03ac9c9eb76fac45af8e51\
             30c81c46a35ce411e5fbc1191a0a52ef\
             f69f2445df4f9b17ad2b417be66c3710",
        )
        .expect("valid test hex")
    }

    #[test]
    fn test_rfc4493_subkeys() {
        let (k1, k2) = subkeys(&Aes128::new(&KEY));
        assert_eq!(hex::encode(k1), "fbeed618357133667c85e08f7236a8de");
        assert_eq!(hex::encode(k2), "f7ddac306ae266ccf90bc11ee46d513b");
    }

    #[test]
    fn test_rfc4493_examples() {
        let msg = message();
        assert_eq!(
            hex::encode(aes_cmac(&KEY, &[])),
            "bb1d6929e95937287fa37d129b756746"
        );
        assert_eq!(
            hex::encode(aes_cmac(&KEY, &[&msg[..16]])),
            "070a16b46b4d4144f79bdd9dd04a287c"
        );
        assert_eq!(
            hex::encode(aes_cmac(&KEY, &[&msg[..40]])),
            "dfa66747de9ae63030ca32611497c827"
        );
        assert_eq!(
            hex::encode(aes_cmac(&KEY, &[&msg[..64]])),
            "51f0bebf7e3b9d92fc49741779363cfe"
        );
    }

    #[test]
    fn test_full_block_uses_k1_and_partial_uses_k2() {
        let cipher = Aes128::new(&KEY);
        let (k1, k2) = subkeys(&cipher);

        let full = [0x11u8; BLOCK_LEN];
        let mut expected_full = full;
        for (b, k) in expected_full.iter_mut().zip(k1) {
            *b ^= k;
        }
        assert_eq!(aes_cmac(&KEY, &[&full]), cipher.encrypt(&expected_full));

        let partial = [0x11u8; BLOCK_LEN - 1];
        let mut expected_partial = [0u8; BLOCK_LEN];
        expected_partial[..BLOCK_LEN - 1].copy_from_slice(&partial);
        expected_partial[BLOCK_LEN - 1] = 0x80;
        for (b, k) in expected_partial.iter_mut().zip(k2) {
            *b ^= k;
        }
        assert_eq!(aes_cmac(&KEY, &[&partial]), cipher.encrypt(&expected_partial));
    }

    #[test]
    fn test_debug_hides_key_material() {
        let mut cmac = Cmac::new(&KEY);
        cmac.update(b"secret");
        let (k1, k2) = subkeys(&Aes128::new(&KEY));

        let rendered = format!("{cmac:?}");
        assert_eq!(rendered, "Cmac { pending_len: 6, .. }");
        assert!(!rendered.contains(&format!("{:?}", &k1[..4])));
        assert!(!rendered.contains(&format!("{:?}", &k2[..4])));
    }

    #[test]
    fn test_boundary_split_across_updates() {
        let msg = message();
        let mut cmac = Cmac::new(&KEY);
        cmac.update(&msg[..16]);
        cmac.update(&msg[16..32]);
        cmac.update(&msg[32..40]);
        assert_eq!(
            hex::encode(cmac.finalize()),
            "dfa66747de9ae63030ca32611497c827"
        );
    }

    proptest! {
        #[test]
        fn incremental_matches_one_shot(
            data in prop::collection::vec(any::<u8>(), 0..200),
            cuts in prop::collection::vec(0usize..200, 0..6),
        ) {
            let one_shot = aes_cmac(&KEY, &[&data]);

            let mut points: Vec<usize> = cuts.into_iter().map(|c| c.min(data.len())).collect();
            points.push(0);
            points.push(data.len());
            points.sort_unstable();

            let mut cmac = Cmac::new(&KEY);
            for pair in points.windows(2) {
                cmac.update(&data[pair[0]..pair[1]]);
            }
            prop_assert_eq!(cmac.finalize(), one_shot);
        }
    }
}
