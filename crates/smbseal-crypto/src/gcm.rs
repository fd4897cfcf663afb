//! AES-128-GCM with a 96-bit IV (NIST SP 800-38D)
//!
//! Only 12-byte IVs are supported, so `J0 = IV || 0^31 || 1` directly. The
//! message keystream starts at `inc32(J0)`; `J0` itself is reserved for
//! masking the GHASH output into the tag.
//!
//! GHASH is computed bit-serially without multiplication tables.

use crate::aes::{Aes128, BLOCK_LEN, Block, KEY_LEN, inc32};
use crate::error::CryptoError;
use crate::scratch::Scratch;
use crate::util::constant_time_eq;

/// GCM tag length in bytes
pub const TAG_LEN: usize = 16;

/// The only supported IV length
pub const IV_LEN: usize = 12;

const MODE: &str = "AES-GCM";

/// Largest plaintext for one IV: `(2^32 - 2)` blocks
const MAX_MESSAGE_LEN: u64 = ((1u64 << 32) - 2) * BLOCK_LEN as u64;

const R: u128 = 0xE1 << 120;

/// Multiply two elements of GF(2^128) in GCM bit order.
fn gf_mul(x: u128, y: u128) -> u128 {
    let mut z = 0u128;
    let mut v = y;
    for i in (0..128).rev() {
        if (x >> i) & 1 == 1 {
            z ^= v;
        }
        v = if v & 1 == 1 { (v >> 1) ^ R } else { v >> 1 };
    }
    z
}

fn ghash(h: u128, input: &[u8]) -> u128 {
    let mut y = 0u128;
    for chunk in input.chunks_exact(BLOCK_LEN) {
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(chunk);
        y = gf_mul(y ^ u128::from_be_bytes(block), h);
    }
    y
}

fn validate(iv: &[u8], len: usize) -> Result<(), CryptoError> {
    if iv.len() != IV_LEN {
        return Err(CryptoError::InvalidNonceSize {
            mode: MODE,
            actual: iv.len(),
        });
    }
    if len as u64 > MAX_MESSAGE_LEN {
        return Err(CryptoError::MessageTooLong {
            mode: MODE,
            len,
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(())
}

/// `pad16(aad) + pad16(ciphertext) + 16` for the two length words.
fn ghash_input_capacity(aad_len: usize, msg_len: usize) -> Result<usize, CryptoError> {
    aad_len
        .div_ceil(BLOCK_LEN)
        .checked_add(msg_len.div_ceil(BLOCK_LEN))
        .and_then(|blocks| blocks.checked_add(1))
        .and_then(|blocks| blocks.checked_mul(BLOCK_LEN))
        .ok_or(CryptoError::Allocation {
            operation: MODE,
            needed: usize::MAX,
        })
}

fn encode_ghash_input(buffer: &mut Vec<u8>, aad: &[u8], ciphertext: &[u8]) {
    buffer.extend_from_slice(aad);
    buffer.resize(aad.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, 0);
    let start = buffer.len();
    buffer.extend_from_slice(ciphertext);
    buffer.resize(start + ciphertext.len().div_ceil(BLOCK_LEN) * BLOCK_LEN, 0);
    buffer.extend_from_slice(&((aad.len() as u64) * 8).to_be_bytes());
    buffer.extend_from_slice(&((ciphertext.len() as u64) * 8).to_be_bytes());
}

fn pre_counter(iv: &[u8]) -> Block {
    let mut j0 = [0u8; BLOCK_LEN];
    j0[..IV_LEN].copy_from_slice(iv);
    j0[BLOCK_LEN - 1] = 1;
    j0
}

fn compute_tag(cipher: &Aes128, j0: &Block, buffer: &[u8]) -> [u8; TAG_LEN] {
    let h = u128::from_be_bytes(cipher.encrypt(&[0u8; BLOCK_LEN]));
    let s = ghash(h, buffer);
    let mask = u128::from_be_bytes(cipher.encrypt(j0));
    (s ^ mask).to_be_bytes()
}

/// Encrypt `data` in place and return the tag, using an expanded key and a
/// working buffer supplied by the caller.
pub fn encrypt_with(
    cipher: &Aes128,
    scratch: &mut Scratch<'_>,
    iv: &[u8],
    aad: &[u8],
    data: &mut [u8],
) -> Result<[u8; TAG_LEN], CryptoError> {
    validate(iv, data.len())?;
    let buffer = scratch.prepare(MODE, ghash_input_capacity(aad.len(), data.len())?)?;

    let j0 = pre_counter(iv);
    let mut counter = j0;
    inc32(&mut counter);
    cipher.apply_ctr32(&mut counter, data);

    encode_ghash_input(buffer, aad, data);
    Ok(compute_tag(cipher, &j0, buffer))
}

/// Verify `tag` and decrypt `data` in place, using an expanded key and a
/// working buffer supplied by the caller.
///
/// Returns `Ok(false)` on authentication failure; `data` then still holds
/// the untouched ciphertext.
pub fn decrypt_with(
    cipher: &Aes128,
    scratch: &mut Scratch<'_>,
    iv: &[u8],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8; TAG_LEN],
) -> Result<bool, CryptoError> {
    validate(iv, data.len())?;
    let buffer = scratch.prepare(MODE, ghash_input_capacity(aad.len(), data.len())?)?;

    let j0 = pre_counter(iv);
    encode_ghash_input(buffer, aad, data);
    let expected = compute_tag(cipher, &j0, buffer);
    if !constant_time_eq(&expected, tag) {
        return Ok(false);
    }

    let mut counter = j0;
    inc32(&mut counter);
    cipher.apply_ctr32(&mut counter, data);
    Ok(true)
}

/// Encrypt `data` in place with AES-128-GCM and return the 16-byte tag
pub fn encrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8],
    aad: &[u8],
    data: &mut [u8],
) -> Result<[u8; TAG_LEN], CryptoError> {
    encrypt_with(&Aes128::new(key), &mut Scratch::owned(), iv, aad, data)
}

/// Decrypt `data` in place with AES-128-GCM, returning whether `tag` verified
pub fn decrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8; TAG_LEN],
) -> Result<bool, CryptoError> {
    decrypt_with(&Aes128::new(key), &mut Scratch::owned(), iv, aad, data, tag)
}
