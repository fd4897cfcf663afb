//! DES-based password cryptography
//!
//! The LAN Manager one-way hash, the 24-byte challenge response shared by
//! LM and NTLMv1, and the two-key DES step that Netlogon uses to advance
//! its credentials.

use crate::des::{self, Des};

/// Constant encrypted by both halves of the LM hash
const LM_MAGIC: &[u8; 8] = b"KGS!@#$%";

/// Length of a challenge response
pub const RESPONSE_LEN: usize = 24;

fn window(bytes: &[u8], start: usize) -> [u8; 7] {
    let mut key = [0u8; 7];
    key.copy_from_slice(&bytes[start..start + 7]);
    key
}

/// LAN Manager hash of `password`.
///
/// ASCII letters are uppercased, the result is truncated or zero padded to
/// 14 bytes, and each 7-byte half keys one DES encryption of `KGS!@#$%`.
pub fn lm_hash(password: &str) -> [u8; 16] {
    let mut padded = [0u8; 14];
    for (dst, src) in padded.iter_mut().zip(password.bytes()) {
        *dst = src.to_ascii_uppercase();
    }

    let mut hash = [0u8; 16];
    hash[..8].copy_from_slice(&des::encrypt_7(&window(&padded, 0), LM_MAGIC));
    hash[8..].copy_from_slice(&des::encrypt_7(&window(&padded, 7), LM_MAGIC));
    hash
}

/// Encrypt an 8-byte challenge under a 16-byte password hash.
///
/// The hash is zero padded to 21 bytes and split into three 7-byte DES keys;
/// the three ciphertexts are concatenated.
pub fn challenge_response(hash: &[u8; 16], challenge: &[u8; 8]) -> [u8; RESPONSE_LEN] {
    let mut padded = [0u8; 21];
    padded[..16].copy_from_slice(hash);

    let mut response = [0u8; RESPONSE_LEN];
    for (chunk, start) in response.chunks_exact_mut(8).zip([0, 7, 14]) {
        chunk.copy_from_slice(&des::encrypt_7(&window(&padded, start), challenge));
    }
    response
}

/// One credential step: `DES(DES(input, key[0..7]), key[7..14])`
pub fn credential_step(input: &[u8; 8], key: &[u8; 16]) -> [u8; 8] {
    let first = Des::from_7byte_key(&window(key, 0)).encrypt(input);
    Des::from_7byte_key(&window(key, 7)).encrypt(&first)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    const CHALLENGE: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];

    #[test]
    fn test_lm_hash_known_values() {
        assert_eq!(hex::encode(lm_hash("Password")), "e52cac67419a9a224a3b108f3fa6cb6d");
        assert_eq!(hex::encode(lm_hash("")), "aad3b435b51404eeaad3b435b51404ee");
    }

    #[test]
    fn test_lm_hash_is_case_insensitive_and_truncates() {
        assert_eq!(lm_hash("password"), lm_hash("PASSWORD"));
        assert_eq!(lm_hash("ABCDEFGHIJKLMN"), lm_hash("abcdefghijklmnopqrs"));
    }

    #[test]
    fn test_lm_response_matches_published_example() {
        let response = challenge_response(&lm_hash("Password"), &CHALLENGE);
        assert_eq!(
            hex::encode(response),
            "98def7b87f88aa5dafe2df779688a172def11c7d5ccdef13"
        );
    }

    #[test]
    fn test_response_uses_three_overlapping_windows() {
        let hash: [u8; 16] = core::array::from_fn(|i| i as u8 * 17);
        let response = challenge_response(&hash, &CHALLENGE);

        let mut last_key = [0u8; 7];
        last_key[..2].copy_from_slice(&hash[14..]);
        assert_eq!(&response[16..], des::encrypt_7(&last_key, &CHALLENGE));
        assert_eq!(
            &response[..8],
            des::encrypt_7(&window(&hash, 0), &CHALLENGE)
        );
    }

    #[test]
    fn test_credential_step_is_two_des_passes() {
        let key: [u8; 16] = core::array::from_fn(|i| 0xF0 ^ i as u8);
        let input = *b"clientch";

        let manual = des::encrypt_7(
            &window(&key, 7),
            &des::encrypt_7(&window(&key, 0), &input),
        );
        assert_eq!(credential_step(&input, &key), manual);
        assert_ne!(credential_step(&input, &key), input);
    }
}
