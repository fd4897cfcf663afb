//! MD4 message digest (RFC 1320)
//!
//! MD4 survives in this protocol family only as the NT password hash and the
//! NTLMv1 session base key. Words are packed little-endian regardless of the
//! host byte order.

use crate::util::BlockBuffer;

/// MD4 digest length in bytes
pub const DIGEST_LEN: usize = 16;

const BLOCK_LEN: usize = 64;

/// Incremental MD4 state
#[derive(Clone)]
pub struct Md4 {
    state: [u32; 4],
    buffer: BlockBuffer<BLOCK_LEN>,
    length: u64,
}

impl Md4 {
    /// Create an empty MD4 state
    pub const fn new() -> Self {
        Self {
            state: [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476],
            buffer: BlockBuffer::new(),
            length: 0,
        }
    }

    /// Absorb more message bytes
    pub fn update(&mut self, data: &[u8]) {
        self.length = self.length.wrapping_add(data.len() as u64);
        self.buffer.feed(data, |block| compress(&mut self.state, block));
    }

    /// Apply padding and return the digest
    pub fn finalize(mut self) -> [u8; DIGEST_LEN] {
        let bit_len = self.length.wrapping_mul(8).to_le_bytes();
        self.buffer
            .finish(&bit_len, |block| compress(&mut self.state, block));

        let mut out = [0u8; DIGEST_LEN];
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.state) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }
}

impl Default for Md4 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the MD4 digest of the concatenation of `fragments`
pub fn digest(fragments: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut md4 = Md4::new();
    for fragment in fragments {
        md4.update(fragment);
    }
    md4.finalize()
}

#[inline]
fn round1(a: u32, b: u32, c: u32, d: u32, x: u32, s: u32) -> u32 {
    a.wrapping_add((b & c) | (!b & d))
        .wrapping_add(x)
        .rotate_left(s)
}

#[inline]
fn round2(a: u32, b: u32, c: u32, d: u32, x: u32, s: u32) -> u32 {
    a.wrapping_add((b & c) | (b & d) | (c & d))
        .wrapping_add(x)
        .wrapping_add(0x5a82_7999)
        .rotate_left(s)
}

#[inline]
fn round3(a: u32, b: u32, c: u32, d: u32, x: u32, s: u32) -> u32 {
    a.wrapping_add(b ^ c ^ d)
        .wrapping_add(x)
        .wrapping_add(0x6ed9_eba1)
        .rotate_left(s)
}

fn compress(state: &mut [u32; 4], block: &[u8; BLOCK_LEN]) {
    let mut x = [0u32; 16];
    for (word, chunk) in x.iter_mut().zip(block.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    let [mut a, mut b, mut c, mut d] = *state;

    for i in [0, 4, 8, 12] {
        a = round1(a, b, c, d, x[i], 3);
        d = round1(d, a, b, c, x[i + 1], 7);
        c = round1(c, d, a, b, x[i + 2], 11);
        b = round1(b, c, d, a, x[i + 3], 19);
    }

    for i in 0..4 {
        a = round2(a, b, c, d, x[i], 3);
        d = round2(d, a, b, c, x[i + 4], 5);
        c = round2(c, d, a, b, x[i + 8], 9);
        b = round2(b, c, d, a, x[i + 12], 13);
    }

    for i in [0, 2, 1, 3] {
        a = round3(a, b, c, d, x[i], 3);
        d = round3(d, a, b, c, x[i + 8], 9);
        c = round3(c, d, a, b, x[i + 4], 11);
        b = round3(b, c, d, a, x[i + 12], 15);
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
}
