//! ARC4 (RC4-compatible) stream cipher
//!
//! Two uses in this protocol family: a one-shot keystream over a Netlogon
//! interactive-logon password blob, and the long-lived sealing state of an
//! NTLMSSP session. For the latter the cipher object *is* the state: each
//! direction of a connection owns one [`Arc4Cipher`] and keeps calling
//! [`Arc4Cipher::apply_keystream`] on successive messages, so the table and
//! indices carry over from one message to the next.
//!
//! ## Usage
//!
//! ```rust
//! use smbseal_crypto::arc4::Arc4Cipher;
//!
//! let mut sender = Arc4Cipher::new(b"session key").expect("key length is valid");
//! let mut receiver = Arc4Cipher::new(b"session key").expect("key length is valid");
//!
//! let mut first = b"first message".to_vec();
//! let mut second = b"second message".to_vec();
//! sender.apply_keystream(&mut first);
//! sender.apply_keystream(&mut second);
//!
//! receiver.apply_keystream(&mut first);
//! receiver.apply_keystream(&mut second);
//! assert_eq!(second, b"second message");
//! ```

use crate::error::CryptoError;

/// ARC4 keystream state: the 256-byte permutation and the two indices
#[derive(Clone)]
pub struct Arc4Cipher {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Arc4Cipher {
    /// Run the key schedule for `key`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidArc4KeyLength` if the key is empty or
    /// longer than 256 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.is_empty() || key.len() > 256 {
            return Err(CryptoError::InvalidArc4KeyLength(key.len()));
        }

        let mut s = [0u8; 256];
        #[allow(clippy::cast_possible_truncation)] // index is 0..256
        for (i, slot) in s.iter_mut().enumerate() {
            *slot = i as u8;
        }

        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }

        Ok(Self { s, i: 0, j: 0 })
    }

    fn next_keystream_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.s[self.i as usize]);
        self.s.swap(self.i as usize, self.j as usize);

        let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
        self.s[k as usize]
    }

    /// XOR the next `data.len()` keystream bytes into `data`.
    ///
    /// Encryption and decryption are the same operation. The state advances,
    /// so the next call continues the keystream where this one stopped.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte ^= self.next_keystream_byte();
        }
    }

    /// Encrypt a copy of `data`
    pub fn encrypt(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.apply_keystream(&mut out);
        out
    }

    /// Decrypt a copy of `data`
    pub fn decrypt(&mut self, data: &[u8]) -> Vec<u8> {
        self.encrypt(data)
    }
}

impl std::fmt::Debug for Arc4Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arc4Cipher").finish_non_exhaustive()
    }
}

/// Apply a fresh ARC4 keystream for `key` to `data` in place.
///
/// # Errors
///
/// Returns `CryptoError::InvalidArc4KeyLength` for an empty or oversized key.
pub fn apply(key: &[u8], data: &mut [u8]) -> Result<(), CryptoError> {
    Arc4Cipher::new(key)?.apply_keystream(data);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_arc4_known_vectors() {
        let mut cipher = Arc4Cipher::new(b"Key").expect("valid key");
        assert_eq!(hex::encode(cipher.encrypt(b"Plaintext")), "bbf316e8d940af0ad3");

        let mut cipher = Arc4Cipher::new(b"Wiki").expect("valid key");
        assert_eq!(hex::encode(cipher.encrypt(b"pedia")), "1021bf0420");

        let mut cipher = Arc4Cipher::new(b"Secret").expect("valid key");
        assert_eq!(
            hex::encode(cipher.encrypt(b"Attack at dawn")),
            "45a01f645fc35b383552544b9bf5"
        );
    }

    #[test]
    fn test_state_carries_across_calls() {
        let mut whole = *b"Attack at dawn";
        apply(b"Secret", &mut whole).expect("valid key");

        let mut split = *b"Attack at dawn";
        let mut cipher = Arc4Cipher::new(b"Secret").expect("valid key");
        let (head, tail) = split.split_at_mut(6);
        cipher.apply_keystream(head);
        cipher.apply_keystream(tail);

        assert_eq!(whole, split);
    }

    #[test]
    fn test_round_trip_with_fresh_state() {
        let key = [0x42u8; 16];
        let mut sealed = Arc4Cipher::new(&key).expect("valid key");
        let ciphertext = sealed.encrypt(b"interactive logon blob");
        assert_ne!(&ciphertext[..], b"interactive logon blob");

        let mut opened = Arc4Cipher::new(&key).expect("valid key");
        assert_eq!(opened.decrypt(&ciphertext), b"interactive logon blob");
    }

    #[test]
    fn test_invalid_key_length() {
        assert_eq!(
            Arc4Cipher::new(b"").err(),
            Some(CryptoError::InvalidArc4KeyLength(0))
        );
        assert!(Arc4Cipher::new(&[0u8; 257]).is_err());
        assert!(Arc4Cipher::new(b"a").is_ok());
        assert!(Arc4Cipher::new(&[0u8; 256]).is_ok());
    }

    #[test]
    fn test_empty_data() {
        let mut cipher = Arc4Cipher::new(b"key").expect("valid key");
        assert!(cipher.encrypt(b"").is_empty());
    }
}
