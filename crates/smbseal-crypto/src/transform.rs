//! SMB3 transform (encrypted message) framing
//!
//! An encrypted SMB3 message is a 52-byte transform header followed by the
//! ciphertext of the original message:
//!
//! ```text
//!  0..4   protocol id  0xFD 'S' 'M' 'B'
//!  4..20  signature    AEAD tag
//! 20..36  nonce        11 (CCM) or 12 (GCM) bytes, zero padded
//! 36..40  original message size, u32 LE
//! 40..42  reserved
//! 42..44  flags / encryption algorithm, u16 LE (1 = encrypted)
//! 44..52  session id, u64 LE
//! ```
//!
//! The AEAD associated data is the header from the nonce onwards
//! (`20..52`).

use tracing::{debug, trace};

use crate::error::CryptoError;
use crate::provider::{AeadKey, CryptoProvider};
use crate::scratch::Scratch;

/// Transform header length
pub const HEADER_LEN: usize = 52;

/// Protocol identifier of a transform header
pub const PROTOCOL_ID: [u8; 4] = [0xFD, b'S', b'M', b'B'];

/// Flags value marking the payload as encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;

const AAD_START: usize = 20;

/// Negotiated SMB3 cipher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherId {
    /// AES-128-CCM with an 11-byte nonce
    Aes128Ccm,
    /// AES-128-GCM with a 12-byte nonce
    Aes128Gcm,
}

impl CipherId {
    /// Map a cipher id from the encryption negotiate context
    pub const fn from_wire(id: u16) -> Option<Self> {
        match id {
            0x0001 => Some(Self::Aes128Ccm),
            0x0002 => Some(Self::Aes128Gcm),
            _ => None,
        }
    }

    /// Nonce length carried in the header
    pub const fn nonce_len(self) -> usize {
        match self {
            Self::Aes128Ccm => 11,
            Self::Aes128Gcm => 12,
        }
    }
}

/// Parsed transform header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformHeader {
    /// AEAD tag
    pub signature: [u8; 16],
    /// Nonce field, cipher nonce followed by zero padding
    pub nonce: [u8; 16],
    /// Length of the plaintext message
    pub original_size: u32,
    /// Flags / encryption algorithm
    pub flags: u16,
    /// Session the message belongs to
    pub session_id: u64,
}

impl TransformHeader {
    /// Parse the first [`HEADER_LEN`] bytes of `packet`.
    ///
    /// # Errors
    ///
    /// `MessageTooShort` for a truncated header, `InvalidProtocolId` if the
    /// packet is not a transform.
    pub fn parse(packet: &[u8]) -> Result<Self, CryptoError> {
        let Some(header) = packet.first_chunk::<HEADER_LEN>() else {
            return Err(CryptoError::MessageTooShort {
                needed: HEADER_LEN,
                actual: packet.len(),
            });
        };

        let mut protocol_id = [0u8; 4];
        protocol_id.copy_from_slice(&header[..4]);
        if protocol_id != PROTOCOL_ID {
            return Err(CryptoError::InvalidProtocolId(protocol_id));
        }

        let mut signature = [0u8; 16];
        signature.copy_from_slice(&header[4..20]);
        let mut nonce = [0u8; 16];
        nonce.copy_from_slice(&header[20..36]);

        Ok(Self {
            signature,
            nonce,
            original_size: u32::from_le_bytes([header[36], header[37], header[38], header[39]]),
            flags: u16::from_le_bytes([header[42], header[43]]),
            session_id: u64::from_le_bytes([
                header[44], header[45], header[46], header[47], header[48], header[49],
                header[50], header[51],
            ]),
        })
    }

    /// Serialize to wire format
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&PROTOCOL_ID);
        out[4..20].copy_from_slice(&self.signature);
        out[20..36].copy_from_slice(&self.nonce);
        out[36..40].copy_from_slice(&self.original_size.to_le_bytes());
        out[42..44].copy_from_slice(&self.flags.to_le_bytes());
        out[44..52].copy_from_slice(&self.session_id.to_le_bytes());
        out
    }

    /// Associated data: the serialized header from the nonce onwards
    pub fn aad(&self) -> [u8; HEADER_LEN - AAD_START] {
        let bytes = self.to_bytes();
        let mut aad = [0u8; HEADER_LEN - AAD_START];
        aad.copy_from_slice(&bytes[AAD_START..]);
        aad
    }
}

/// Encrypt `message` in place and return the transform header to send in
/// front of it.
///
/// `nonce` must be exactly [`CipherId::nonce_len`] bytes and must never
/// repeat under the same key. A connection passes its [`ExpandedKey`]
/// (as [`AeadKey::Expanded`]) to skip re-expanding the key per message.
///
/// [`ExpandedKey`]: crate::provider::ExpandedKey
///
/// # Errors
///
/// `InvalidNonceSize` for a nonce of the wrong length, `MessageTooLong` if
/// the size does not fit the header, and working buffer allocation failure.
pub fn encrypt(
    provider: &CryptoProvider,
    cipher: CipherId,
    key: AeadKey<'_>,
    nonce: &[u8],
    session_id: u64,
    scratch: &mut Scratch<'_>,
    message: &mut [u8],
) -> Result<TransformHeader, CryptoError> {
    if nonce.len() != cipher.nonce_len() {
        return Err(CryptoError::InvalidNonceSize {
            mode: "transform",
            actual: nonce.len(),
        });
    }
    let original_size = u32::try_from(message.len()).map_err(|_| CryptoError::MessageTooLong {
        mode: "transform",
        len: message.len(),
        max: u64::from(u32::MAX),
    })?;

    let mut header = TransformHeader {
        signature: [0u8; 16],
        nonce: [0u8; 16],
        original_size,
        flags: FLAG_ENCRYPTED,
        session_id,
    };
    header.nonce[..nonce.len()].copy_from_slice(nonce);
    let aad = header.aad();

    header.signature = match cipher {
        CipherId::Aes128Ccm => provider.ccm_encrypt(key, scratch, nonce, &aad, message)?,
        CipherId::Aes128Gcm => provider.gcm_encrypt(key, scratch, nonce, &aad, message)?,
    };
    trace!(?cipher, size = original_size, "encrypted transform payload");
    Ok(header)
}

/// Authenticate and decrypt a received transform packet in place.
///
/// Returns the parsed header and the plaintext slice of `packet`, or
/// `Ok(None)` if authentication fails. On failure the payload bytes must be
/// discarded.
///
/// # Errors
///
/// Malformed headers (`MessageTooShort`, `InvalidProtocolId`) and working
/// buffer allocation failure.
pub fn decrypt<'p>(
    provider: &CryptoProvider,
    cipher: CipherId,
    key: AeadKey<'_>,
    scratch: &mut Scratch<'_>,
    packet: &'p mut [u8],
) -> Result<Option<(TransformHeader, &'p mut [u8])>, CryptoError> {
    let header = TransformHeader::parse(packet)?;
    let size = header.original_size as usize;
    let available = packet.len() - HEADER_LEN;
    if size > available {
        return Err(CryptoError::MessageTooShort {
            needed: HEADER_LEN + size,
            actual: packet.len(),
        });
    }

    let aad = header.aad();
    let nonce = &header.nonce[..cipher.nonce_len()];
    let payload = &mut packet[HEADER_LEN..HEADER_LEN + size];

    let authentic = match cipher {
        CipherId::Aes128Ccm => {
            provider.ccm_decrypt(key, scratch, nonce, &aad, payload, &header.signature)?
        }
        CipherId::Aes128Gcm => {
            provider.gcm_decrypt(key, scratch, nonce, &aad, payload, &header.signature)?
        }
    };
    if !authentic {
        debug!(?cipher, session_id = header.session_id, size, "transform authentication failed");
        return Ok(None);
    }
    Ok(Some((header, payload)))
}
