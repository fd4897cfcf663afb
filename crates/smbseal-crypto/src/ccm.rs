//! AES-128-CCM with a 16-byte tag (NIST SP 800-38C)
//!
//! SMB 3.0 and later use an 11-byte nonce, which leaves a 4-byte big-endian
//! message length in `B0` and a 4-byte block counter in each `A_i`. Counter
//! block `A_0` is reserved: its keystream `S_0` masks the CBC-MAC result and
//! never touches the message. The message keystream starts at `A_1`.

use crate::aes::{Aes128, BLOCK_LEN, Block, KEY_LEN, inc32};
use crate::error::CryptoError;
use crate::scratch::Scratch;
use crate::util::constant_time_eq;

/// CCM tag length in bytes
pub const TAG_LEN: usize = 16;

/// Nonce length used by SMB3 transform headers
pub const SMB3_NONCE_LEN: usize = 11;

const MIN_NONCE_LEN: usize = 7;
const MAX_NONCE_LEN: usize = 13;
const MODE: &str = "AES-CCM";

/// Size of the length field `q` implied by a nonce, after validating it.
fn length_field_size(nonce: &[u8]) -> Result<usize, CryptoError> {
    if !(MIN_NONCE_LEN..=MAX_NONCE_LEN).contains(&nonce.len()) {
        return Err(CryptoError::InvalidNonceSize {
            mode: MODE,
            actual: nonce.len(),
        });
    }
    Ok(BLOCK_LEN - 1 - nonce.len())
}

fn check_message_len(q: usize, len: usize) -> Result<(), CryptoError> {
    let max = if q >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * q)) - 1
    };
    if len as u64 > max {
        return Err(CryptoError::MessageTooLong {
            mode: MODE,
            len,
            max,
        });
    }
    Ok(())
}

/// `(message_blocks + aad_blocks + 3) * 16`: B0, the AAD length prefix
/// spilling into one extra block, and the padding of both sections.
fn mac_input_capacity(aad_len: usize, msg_len: usize) -> Result<usize, CryptoError> {
    aad_len
        .div_ceil(BLOCK_LEN)
        .checked_add(msg_len.div_ceil(BLOCK_LEN))
        .and_then(|blocks| blocks.checked_add(3))
        .and_then(|blocks| blocks.checked_mul(BLOCK_LEN))
        .ok_or(CryptoError::Allocation {
            operation: MODE,
            needed: usize::MAX,
        })
}

fn pad_to_block(buffer: &mut Vec<u8>) {
    let rem = buffer.len() % BLOCK_LEN;
    if rem != 0 {
        buffer.resize(buffer.len() + BLOCK_LEN - rem, 0);
    }
}

/// Lay out `B0 || encoded AAD || padding || message || padding`.
fn encode_mac_input(buffer: &mut Vec<u8>, nonce: &[u8], q: usize, aad: &[u8], msg: &[u8]) {
    let adata = if aad.is_empty() { 0 } else { 0x40 };
    let tag_bits = (((TAG_LEN - 2) / 2) as u8) << 3;
    buffer.push(adata | tag_bits | (q as u8 - 1));
    buffer.extend_from_slice(nonce);
    buffer.extend_from_slice(&(msg.len() as u64).to_be_bytes()[8 - q..]);

    if !aad.is_empty() {
        if aad.len() < 0xFF00 {
            buffer.extend_from_slice(&(aad.len() as u16).to_be_bytes());
        } else if let Ok(len) = u32::try_from(aad.len()) {
            buffer.extend_from_slice(&[0xFF, 0xFE]);
            buffer.extend_from_slice(&len.to_be_bytes());
        } else {
            buffer.extend_from_slice(&[0xFF, 0xFF]);
            buffer.extend_from_slice(&(aad.len() as u64).to_be_bytes());
        }
        buffer.extend_from_slice(aad);
        pad_to_block(buffer);
    }

    buffer.extend_from_slice(msg);
    pad_to_block(buffer);
}

fn cbc_mac(cipher: &Aes128, input: &[u8]) -> Block {
    let mut x = [0u8; BLOCK_LEN];
    for block in input.chunks_exact(BLOCK_LEN) {
        for (a, b) in x.iter_mut().zip(block) {
            *a ^= b;
        }
        cipher.encrypt_block(&mut x);
    }
    x
}

/// Counter block `A_0`: flags `q - 1`, the nonce, and a zero counter.
fn counter_zero(nonce: &[u8], q: usize) -> Block {
    let mut a0 = [0u8; BLOCK_LEN];
    a0[0] = q as u8 - 1;
    a0[1..=nonce.len()].copy_from_slice(nonce);
    a0
}

fn masked_tag(cipher: &Aes128, a0: &Block, mac: &Block) -> [u8; TAG_LEN] {
    let s0 = cipher.encrypt(a0);
    let mut tag = [0u8; TAG_LEN];
    for ((t, m), s) in tag.iter_mut().zip(mac).zip(s0) {
        *t = m ^ s;
    }
    tag
}

/// Encrypt `data` in place and return the tag, using an expanded key and a
/// working buffer supplied by the caller.
pub fn encrypt_with(
    cipher: &Aes128,
    scratch: &mut Scratch<'_>,
    nonce: &[u8],
    aad: &[u8],
    data: &mut [u8],
) -> Result<[u8; TAG_LEN], CryptoError> {
    let q = length_field_size(nonce)?;
    check_message_len(q, data.len())?;

    let buffer = scratch.prepare(MODE, mac_input_capacity(aad.len(), data.len())?)?;
    encode_mac_input(buffer, nonce, q, aad, data);
    let mac = cbc_mac(cipher, buffer);

    let a0 = counter_zero(nonce, q);
    let mut counter = a0;
    inc32(&mut counter);
    cipher.apply_ctr32(&mut counter, data);

    Ok(masked_tag(cipher, &a0, &mac))
}

/// Decrypt `data` in place and check `tag`, using an expanded key and a
/// working buffer supplied by the caller.
///
/// Returns `Ok(false)` on authentication failure, in which case `data` is
/// zeroed so no unauthenticated plaintext leaks to the caller.
pub fn decrypt_with(
    cipher: &Aes128,
    scratch: &mut Scratch<'_>,
    nonce: &[u8],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8; TAG_LEN],
) -> Result<bool, CryptoError> {
    let q = length_field_size(nonce)?;
    check_message_len(q, data.len())?;

    // Reserve before touching `data` so an allocation failure leaves it intact.
    let buffer = scratch.prepare(MODE, mac_input_capacity(aad.len(), data.len())?)?;

    let a0 = counter_zero(nonce, q);
    let mut counter = a0;
    inc32(&mut counter);
    cipher.apply_ctr32(&mut counter, data);

    encode_mac_input(buffer, nonce, q, aad, data);
    let mac = cbc_mac(cipher, buffer);
    let expected = masked_tag(cipher, &a0, &mac);

    if constant_time_eq(&expected, tag) {
        Ok(true)
    } else {
        data.fill(0);
        Ok(false)
    }
}

/// Encrypt `data` in place with AES-128-CCM and return the 16-byte tag
pub fn encrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8],
    aad: &[u8],
    data: &mut [u8],
) -> Result<[u8; TAG_LEN], CryptoError> {
    encrypt_with(&Aes128::new(key), &mut Scratch::owned(), nonce, aad, data)
}

/// Decrypt `data` in place with AES-128-CCM, returning whether `tag` verified
pub fn decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8; TAG_LEN],
) -> Result<bool, CryptoError> {
    decrypt_with(&Aes128::new(key), &mut Scratch::owned(), nonce, aad, data, tag)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY: [u8; 16] = [0x42; 16];
    const NONCE: [u8; 11] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

    fn xor(a: &Block, b: &Block) -> Block {
        let mut out = *a;
        for (o, x) in out.iter_mut().zip(b) {
            *o ^= x;
        }
        out
    }

    #[test]
    fn test_b0_layout_for_smb3_nonce() {
        let mut buffer = Vec::new();
        encode_mac_input(&mut buffer, &NONCE, 4, b"", &[0u8; 0x0102]);
        assert_eq!(buffer[0], 0x3b);
        assert_eq!(&buffer[1..12], &NONCE);
        assert_eq!(&buffer[12..16], &[0, 0, 1, 2]);

        let mut buffer = Vec::new();
        encode_mac_input(&mut buffer, &NONCE, 4, b"aad", b"");
        assert_eq!(buffer[0], 0x7b);
        assert_eq!(&buffer[16..21], &[0, 3, b'a', b'a', b'd']);
        assert_eq!(buffer.len(), 32);
    }

    #[test]
    fn test_large_aad_uses_fffe_prefix() {
        let aad = vec![0u8; 0xFF00];
        let mut buffer = Vec::new();
        encode_mac_input(&mut buffer, &NONCE, 4, &aad, b"");
        assert_eq!(&buffer[16..22], &[0xFF, 0xFE, 0x00, 0x00, 0xFF, 0x00]);
    }

    #[test]
    fn test_empty_message_tag_matches_manual_construction() {
        let cipher = Aes128::new(&KEY);
        let tag = encrypt(&KEY, &NONCE, b"", &mut []).expect("valid inputs");

        let mut b0 = [0u8; BLOCK_LEN];
        b0[0] = 0x3b;
        b0[1..12].copy_from_slice(&NONCE);
        let mac = cipher.encrypt(&b0);
        let s0 = cipher.encrypt(&counter_zero(&NONCE, 4));
        assert_eq!(tag, xor(&mac, &s0));
    }

    #[test]
    fn test_single_block_matches_manual_construction() {
        let cipher = Aes128::new(&KEY);
        let plaintext = *b"sixteen byte msg";
        let mut data = plaintext;
        let tag = encrypt(&KEY, &NONCE, b"", &mut data).expect("valid inputs");

        let mut b0 = [0u8; BLOCK_LEN];
        b0[0] = 0x3b;
        b0[1..12].copy_from_slice(&NONCE);
        b0[15] = 16;
        let x1 = cipher.encrypt(&b0);
        let x2 = cipher.encrypt(&xor(&x1, &plaintext));

        let a0 = counter_zero(&NONCE, 4);
        let mut a1 = a0;
        a1[15] = 1;
        assert_eq!(data, xor(&plaintext, &cipher.encrypt(&a1)));
        assert_eq!(tag, xor(&x2, &cipher.encrypt(&a0)));
    }

    #[test]
    fn test_rejects_bad_nonce_sizes() {
        let mut data = [0u8; 4];
        for len in [0usize, 6, 14, 16] {
            let nonce = vec![0u8; len];
            assert!(matches!(
                encrypt(&KEY, &nonce, b"", &mut data),
                Err(CryptoError::InvalidNonceSize { actual, .. }) if actual == len
            ));
        }
    }

    #[test]
    fn test_message_too_long_for_two_byte_length_field() {
        let nonce = [0u8; 13];
        let mut data = vec![0u8; 0x1_0000];
        assert!(matches!(
            encrypt(&KEY, &nonce, b"", &mut data),
            Err(CryptoError::MessageTooLong { max: 0xFFFF, .. })
        ));
    }

    #[test]
    fn test_failed_decrypt_zeroes_buffer() {
        let mut data = *b"attack at dawn";
        let mut tag = encrypt(&KEY, &NONCE, b"hdr", &mut data).expect("valid inputs");
        tag[0] ^= 1;
        let ok = decrypt(&KEY, &NONCE, b"hdr", &mut data, &tag).expect("valid inputs");
        assert!(!ok);
        assert_eq!(data, [0u8; 14]);
    }

    #[test]
    fn test_borrowed_scratch_across_messages() {
        let cipher = Aes128::new(&KEY);
        let mut backing = Vec::new();

        for len in [0usize, 5, 16, 33, 100] {
            let original: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let mut data = original.clone();
            let tag = encrypt_with(&cipher, &mut Scratch::from(&mut backing), &NONCE, b"a", &mut data)
                .expect("valid inputs");
            let ok = decrypt_with(&cipher, &mut Scratch::from(&mut backing), &NONCE, b"a", &mut data, &tag)
                .expect("valid inputs");
            assert!(ok);
            assert_eq!(data, original);
        }
    }

    proptest! {
        #[test]
        fn round_trip_and_tamper(
            key in prop::array::uniform16(any::<u8>()),
            nonce_len in 11usize..=12,
            nonce_seed in any::<u8>(),
            aad in prop::collection::vec(any::<u8>(), 0..48),
            msg in prop::collection::vec(any::<u8>(), 0..80),
            flip in any::<prop::sample::Index>(),
        ) {
            let nonce = vec![nonce_seed; nonce_len];
            let mut data = msg.clone();
            let tag = encrypt(&key, &nonce, &aad, &mut data).expect("valid inputs");

            let mut opened = data.clone();
            prop_assert!(decrypt(&key, &nonce, &aad, &mut opened, &tag).expect("valid inputs"));
            prop_assert_eq!(&opened, &msg);

            // Flip one bit somewhere in ciphertext || tag.
            let mut sealed = data.clone();
            let mut bad_tag = tag;
            let position = flip.index(sealed.len() + TAG_LEN);
            if position < sealed.len() {
                sealed[position] ^= 0x01;
            } else {
                bad_tag[position - sealed.len()] ^= 0x01;
            }
            prop_assert!(!decrypt(&key, &nonce, &aad, &mut sealed, &bad_tag).expect("valid inputs"));
        }
    }
}
