//! AES-128 block cipher, forward direction only (FIPS 197)
//!
//! CMAC, CCM and GCM only ever run the cipher forwards, including when they
//! decrypt a message, so no inverse key schedule or inverse rounds exist.
//!
//! The expanded schedule is a plain value of [`SCHEDULE_LEN`] bytes. Build it
//! once per key and borrow it on hot paths instead of re-expanding per packet.

/// AES block length in bytes
pub const BLOCK_LEN: usize = 16;

/// AES-128 key length in bytes
pub const KEY_LEN: usize = 16;

/// Size of an expanded AES-128 key schedule in bytes
pub const SCHEDULE_LEN: usize = ROUNDS_PLUS_ONE * BLOCK_LEN;

const ROUNDS_PLUS_ONE: usize = 11;

const RCON: [u8; 10] = [0x01, 0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x1b, 0x36];

/// One AES block
pub type Block = [u8; BLOCK_LEN];

const fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse in GF(2^8) as `x^254`; maps 0 to 0.
const fn gf_inverse(x: u8) -> u8 {
    let mut result = 1u8;
    let mut base = x;
    let mut exp = 254u32;
    while exp != 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

const fn build_sbox() -> [u8; 256] {
    let mut sbox = [0u8; 256];
    let mut i = 0usize;
    while i < 256 {
        let b = gf_inverse(i as u8);
        sbox[i] = b
            ^ b.rotate_left(1)
            ^ b.rotate_left(2)
            ^ b.rotate_left(3)
            ^ b.rotate_left(4)
            ^ 0x63;
        i += 1;
    }
    sbox
}

static SBOX: [u8; 256] = build_sbox();

#[inline]
const fn xtime(x: u8) -> u8 {
    (x << 1) ^ (((x >> 7) & 1) * 0x1b)
}

/// Expanded AES-128 encryption key schedule
#[derive(Clone)]
pub struct Aes128 {
    round_keys: [Block; ROUNDS_PLUS_ONE],
}

impl Aes128 {
    /// Expand a 16-byte key
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        let mut words = [[0u8; 4]; 4 * ROUNDS_PLUS_ONE];
        for (word, chunk) in words.iter_mut().zip(key.chunks_exact(4)) {
            word.copy_from_slice(chunk);
        }

        for i in 4..words.len() {
            let mut temp = words[i - 1];
            if i % 4 == 0 {
                temp.rotate_left(1);
                for byte in &mut temp {
                    *byte = SBOX[usize::from(*byte)];
                }
                temp[0] ^= RCON[i / 4 - 1];
            }
            for (j, byte) in temp.iter().enumerate() {
                words[i][j] = words[i - 4][j] ^ byte;
            }
        }

        let mut round_keys = [[0u8; BLOCK_LEN]; ROUNDS_PLUS_ONE];
        for (round_key, group) in round_keys.iter_mut().zip(words.chunks_exact(4)) {
            for (dst, word) in round_key.chunks_exact_mut(4).zip(group) {
                dst.copy_from_slice(word);
            }
        }

        Self { round_keys }
    }

    /// Encrypt one block in place
    pub fn encrypt_block(&self, block: &mut Block) {
        add_round_key(block, &self.round_keys[0]);
        for round_key in &self.round_keys[1..ROUNDS_PLUS_ONE - 1] {
            sub_bytes(block);
            shift_rows(block);
            mix_columns(block);
            add_round_key(block, round_key);
        }
        sub_bytes(block);
        shift_rows(block);
        add_round_key(block, &self.round_keys[ROUNDS_PLUS_ONE - 1]);
    }

    /// Encrypt a copy of `block`
    pub fn encrypt(&self, block: &Block) -> Block {
        let mut out = *block;
        self.encrypt_block(&mut out);
        out
    }

    /// XOR `data` with the keystream of counter blocks starting at `counter`,
    /// incrementing the low 32 bits of the counter (big-endian, wrapping)
    /// after each block. A trailing partial block uses only as many keystream
    /// bytes as it needs.
    pub(crate) fn apply_ctr32(&self, counter: &mut Block, data: &mut [u8]) {
        for chunk in data.chunks_mut(BLOCK_LEN) {
            let keystream = self.encrypt(counter);
            for (byte, k) in chunk.iter_mut().zip(keystream) {
                *byte ^= k;
            }
            inc32(counter);
        }
    }
}

impl std::fmt::Debug for Aes128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes128").finish_non_exhaustive()
    }
}

/// Increment the rightmost 32 bits of a counter block, leaving the rest
/// untouched.
pub(crate) fn inc32(counter: &mut Block) {
    let low = u32::from_be_bytes([counter[12], counter[13], counter[14], counter[15]]);
    counter[12..].copy_from_slice(&low.wrapping_add(1).to_be_bytes());
}

fn add_round_key(block: &mut Block, round_key: &Block) {
    for (b, k) in block.iter_mut().zip(round_key) {
        *b ^= k;
    }
}

fn sub_bytes(block: &mut Block) {
    for b in block.iter_mut() {
        *b = SBOX[usize::from(*b)];
    }
}

// State is column-major: byte (row r, column c) lives at index r + 4c.
fn shift_rows(block: &mut Block) {
    let old = *block;
    for r in 1..4 {
        for c in 0..4 {
            block[r + 4 * c] = old[r + 4 * ((c + r) % 4)];
        }
    }
}

fn mix_columns(block: &mut Block) {
    for column in block.chunks_exact_mut(4) {
        let [a0, a1, a2, a3] = [column[0], column[1], column[2], column[3]];
        let all = a0 ^ a1 ^ a2 ^ a3;
        column[0] = a0 ^ all ^ xtime(a0 ^ a1);
        column[1] = a1 ^ all ^ xtime(a1 ^ a2);
        column[2] = a2 ^ all ^ xtime(a2 ^ a3);
        column[3] = a3 ^ all ^ xtime(a3 ^ a0);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn block(hex_str: &str) -> Block {
        let mut out = [0u8; BLOCK_LEN];
        hex::decode_to_slice(hex_str, &mut out).expect("valid test hex");
        out
    }

    #[test]
    fn test_sbox_spot_values() {
        assert_eq!(SBOX[0x00], 0x63);
        assert_eq!(SBOX[0x01], 0x7c);
        assert_eq!(SBOX[0x53], 0xed);
        assert_eq!(SBOX[0xff], 0x16);
    }

    #[test]
    fn test_fips197_appendix_c1() {
        let aes = Aes128::new(&block("000102030405060708090a0b0c0d0e0f"));
        let out = aes.encrypt(&block("00112233445566778899aabbccddeeff"));
        assert_eq!(hex::encode(out), "69c4e0d86a7b0430d8cdb78070b4c55a");
    }

    #[test]
    fn test_fips197_appendix_b() {
        let aes = Aes128::new(&block("2b7e151628aed2a6abf7158809cf4f3c"));
        let out = aes.encrypt(&block("3243f6a8885a308d313198a2e0370734"));
        assert_eq!(hex::encode(out), "3925841d02dc09fbdc118597196a0b32");
    }

    #[test]
    fn test_key_schedule_last_round_key() {
        let aes = Aes128::new(&block("2b7e151628aed2a6abf7158809cf4f3c"));
        assert_eq!(
            hex::encode(aes.round_keys[10]),
            "d014f9a8c9ee2589e13f0cc8b6630ca6"
        );
    }

    #[test]
    fn test_inc32_wraps_low_word_only() {
        let mut counter = block("000102030405060708090a0bffffffff");
        inc32(&mut counter);
        assert_eq!(hex::encode(counter), "000102030405060708090a0b00000000");
    }

    #[test]
    fn test_ctr_partial_block_is_byte_masked() {
        let aes = Aes128::new(&[7u8; KEY_LEN]);
        let mut counter = [0u8; BLOCK_LEN];
        let mut data = [0u8; 5];
        aes.apply_ctr32(&mut counter, &mut data);

        let keystream = aes.encrypt(&[0u8; BLOCK_LEN]);
        assert_eq!(data, keystream[..5]);
        assert_eq!(counter[15], 1);
    }
}
