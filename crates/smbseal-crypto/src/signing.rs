//! Per-message signing for the three SMB generations
//!
//! Each generation zeroes the signature field of the header, MACs the header
//! followed by the remaining message fragments, and writes the truncated
//! result back into the field. Verification repeats this on a copy of the
//! header and compares in constant time.
//!
//! | Generation | MAC                                   | Field      |
//! |------------|---------------------------------------|------------|
//! | SMB1       | `MD5(mac_key ‖ response ‖ message)[..8]` | `14..22` |
//! | SMB2       | `HMAC-SHA-256(key, message)[..16]`    | `48..64`   |
//! | SMB3       | `AES-128-CMAC(key, message)`          | `48..64`   |

use crate::error::CryptoError;
use crate::kdf::Dialect;
use crate::provider::CryptoProvider;
use crate::util::{constant_time_eq, prepend};

/// SMB1 header length
pub const SMB1_HEADER_LEN: usize = 32;

/// SMB2/SMB3 header length
pub const SMB2_HEADER_LEN: usize = 64;

const SMB1_SIGNATURE: std::ops::Range<usize> = 14..22;
const SMB2_SIGNATURE: std::ops::Range<usize> = 48..64;

fn check_len(header: &[u8], needed: usize) -> Result<(), CryptoError> {
    if header.len() < needed {
        return Err(CryptoError::MessageTooShort {
            needed,
            actual: header.len(),
        });
    }
    Ok(())
}

/// Sign an SMB1 message in place.
///
/// `sequence` is written little-endian into the first four bytes of the
/// signature field (the rest zeroed) before hashing. `response` is the
/// client's authentication response for the legacy NTLMv1 session setup,
/// or `None` once the session key alone is the MAC key.
///
/// # Errors
///
/// Returns `CryptoError::MessageTooShort` if `header` is shorter than an
/// SMB1 header.
pub fn smb1_sign(
    provider: &CryptoProvider,
    mac_key: &[u8],
    response: Option<&[u8]>,
    sequence: u32,
    header: &mut [u8],
    payload: &[&[u8]],
) -> Result<(), CryptoError> {
    check_len(header, SMB1_HEADER_LEN)?;
    header[SMB1_SIGNATURE].fill(0);
    header[14..18].copy_from_slice(&sequence.to_le_bytes());

    let mut fragments: Vec<&[u8]> = Vec::with_capacity(payload.len() + 3);
    fragments.push(mac_key);
    if let Some(response) = response {
        fragments.push(response);
    }
    fragments.push(header);
    fragments.extend_from_slice(payload);
    let digest = provider.md5(&fragments);

    header[SMB1_SIGNATURE].copy_from_slice(&digest[..8]);
    Ok(())
}

/// Check the signature of a received SMB1 message.
///
/// # Errors
///
/// Returns `CryptoError::MessageTooShort` for a truncated header.
pub fn smb1_verify(
    provider: &CryptoProvider,
    mac_key: &[u8],
    response: Option<&[u8]>,
    sequence: u32,
    header: &[u8],
    payload: &[&[u8]],
) -> Result<bool, CryptoError> {
    check_len(header, SMB1_HEADER_LEN)?;
    let mut copy = header.to_vec();
    smb1_sign(provider, mac_key, response, sequence, &mut copy, payload)?;
    Ok(constant_time_eq(&copy[SMB1_SIGNATURE], &header[SMB1_SIGNATURE]))
}

/// Sign an SMB 2.0.2 / 2.1 message in place with HMAC-SHA-256.
///
/// # Errors
///
/// Returns `CryptoError::MessageTooShort` if `header` is shorter than an
/// SMB2 header.
pub fn smb2_sign(
    provider: &CryptoProvider,
    key: &[u8; 16],
    header: &mut [u8],
    payload: &[&[u8]],
) -> Result<(), CryptoError> {
    check_len(header, SMB2_HEADER_LEN)?;
    header[SMB2_SIGNATURE].fill(0);
    let mac = provider.hmac_sha256(key, &prepend(header, payload));
    header[SMB2_SIGNATURE].copy_from_slice(&mac[..16]);
    Ok(())
}

/// Sign an SMB 3.x message in place with AES-128-CMAC.
///
/// # Errors
///
/// Returns `CryptoError::MessageTooShort` if `header` is shorter than an
/// SMB2 header.
pub fn smb3_sign(
    provider: &CryptoProvider,
    key: &[u8; 16],
    header: &mut [u8],
    payload: &[&[u8]],
) -> Result<(), CryptoError> {
    check_len(header, SMB2_HEADER_LEN)?;
    header[SMB2_SIGNATURE].fill(0);
    let mac = provider.aes_cmac(key, &prepend(header, payload));
    header[SMB2_SIGNATURE].copy_from_slice(&mac);
    Ok(())
}

/// Sign with the algorithm of `dialect`.
///
/// # Errors
///
/// Returns `CryptoError::MessageTooShort` for a truncated header.
pub fn sign(
    provider: &CryptoProvider,
    dialect: Dialect,
    key: &[u8; 16],
    header: &mut [u8],
    payload: &[&[u8]],
) -> Result<(), CryptoError> {
    if dialect.is_smb3() {
        smb3_sign(provider, key, header, payload)
    } else {
        smb2_sign(provider, key, header, payload)
    }
}

/// Check the signature of a received SMB2/SMB3 message.
///
/// # Errors
///
/// Returns `CryptoError::MessageTooShort` for a truncated header.
pub fn verify(
    provider: &CryptoProvider,
    dialect: Dialect,
    key: &[u8; 16],
    header: &[u8],
    payload: &[&[u8]],
) -> Result<bool, CryptoError> {
    check_len(header, SMB2_HEADER_LEN)?;
    let mut copy = header.to_vec();
    sign(provider, dialect, key, &mut copy, payload)?;
    Ok(constant_time_eq(&copy[SMB2_SIGNATURE], &header[SMB2_SIGNATURE]))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{cmac, hmac, md5};

    fn smb2_header(message_id: u64) -> [u8; SMB2_HEADER_LEN] {
        let mut header = [0u8; SMB2_HEADER_LEN];
        header[..4].copy_from_slice(b"\xfeSMB");
        header[4..6].copy_from_slice(&64u16.to_le_bytes());
        header[24..32].copy_from_slice(&message_id.to_le_bytes());
        header[48..64].fill(0xEE);
        header
    }

    #[test]
    fn test_smb1_signature_layout() {
        let provider = CryptoProvider::new();
        let mut header = [0x11u8; SMB1_HEADER_LEN];
        smb1_sign(&provider, b"mackey", Some(b"resp"), 7, &mut header, &[b"body"])
            .expect("full header");

        let mut hashed = [0x11u8; SMB1_HEADER_LEN];
        hashed[14..22].copy_from_slice(&[7, 0, 0, 0, 0, 0, 0, 0]);
        let expected = md5::digest(&[b"mackey", b"resp", &hashed, b"body"]);
        assert_eq!(header[14..22], expected[..8]);
        assert_eq!(header[..14], [0x11; 14]);
    }

    #[test]
    fn test_smb1_verify_detects_sequence_mismatch() {
        let provider = CryptoProvider::new();
        let mut header = [0u8; SMB1_HEADER_LEN];
        smb1_sign(&provider, b"key", None, 2, &mut header, &[]).expect("full header");
        assert!(smb1_verify(&provider, b"key", None, 2, &header, &[]).expect("full header"));
        assert!(!smb1_verify(&provider, b"key", None, 3, &header, &[]).expect("full header"));
    }

    #[test]
    fn test_smb2_matches_hmac_over_zeroed_header() {
        let provider = CryptoProvider::new();
        let key = [0x42u8; 16];
        let mut header = smb2_header(5);
        smb2_sign(&provider, &key, &mut header, &[b"payload"]).expect("full header");

        let mut zeroed = smb2_header(5);
        zeroed[48..64].fill(0);
        let expected = hmac::hmac_sha256(&key, &[&zeroed, b"payload"]);
        assert_eq!(header[48..64], expected[..16]);
    }

    #[test]
    fn test_smb3_matches_cmac_over_zeroed_header() {
        let provider = CryptoProvider::new();
        let key = [0x24u8; 16];
        let mut header = smb2_header(9);
        smb3_sign(&provider, &key, &mut header, &[b"pay", b"load"]).expect("full header");

        let mut zeroed = smb2_header(9);
        zeroed[48..64].fill(0);
        assert_eq!(header[48..64], cmac::aes_cmac(&key, &[&zeroed, b"payload"]));
    }

    #[test]
    fn test_verify_round_trip_and_tamper() {
        let provider = CryptoProvider::new();
        let key = [3u8; 16];
        for dialect in [Dialect::Smb210, Dialect::Smb311] {
            let mut header = smb2_header(1);
            sign(&provider, dialect, &key, &mut header, &[b"data"]).expect("full header");
            assert!(verify(&provider, dialect, &key, &header, &[b"data"]).expect("full header"));
            assert!(!verify(&provider, dialect, &key, &header, &[b"dato"]).expect("full header"));
        }
    }

    #[test]
    fn test_short_header_is_rejected() {
        let provider = CryptoProvider::new();
        let mut header = [0u8; 40];
        assert_eq!(
            smb3_sign(&provider, &[0; 16], &mut header, &[]),
            Err(CryptoError::MessageTooShort {
                needed: SMB2_HEADER_LEN,
                actual: 40
            })
        );
        assert!(smb1_sign(&provider, b"k", None, 0, &mut header[..20], &[]).is_err());
    }
}
