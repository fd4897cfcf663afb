//! NTLM password hashes, challenge responses and session security
//!
//! Everything here dispatches through a [`CryptoProvider`]: the NT hash uses
//! the MD4 slot, NTLMv2 the HMAC-MD5 slot, and the sign/seal key derivation
//! the MD5 slot. The DES-based LM pieces live in [`crate::legacy`].

use crate::arc4::Arc4Cipher;
use crate::error::CryptoError;
use crate::kdf::Role;
use crate::legacy::{self, RESPONSE_LEN};
use crate::provider::CryptoProvider;
use crate::util::{constant_time_eq, utf16le};

/// NTLMSSP message signature length
pub const SIGNATURE_LEN: usize = 16;

const SIGNATURE_VERSION: [u8; 4] = [1, 0, 0, 0];

const CLIENT_SIGNING: &[u8] = b"session key to client-to-server signing key magic constant\0";
const SERVER_SIGNING: &[u8] = b"session key to server-to-client signing key magic constant\0";
const CLIENT_SEALING: &[u8] = b"session key to client-to-server sealing key magic constant\0";
const SERVER_SEALING: &[u8] = b"session key to server-to-client sealing key magic constant\0";

/// NT one-way function: MD4 of the UTF-16LE password
pub fn nt_hash(provider: &CryptoProvider, password: &str) -> [u8; 16] {
    provider.md4(&[&utf16le(password)])
}

/// NTLMv1 response: the challenge encrypted under the NT hash
pub fn ntlmv1_response(
    provider: &CryptoProvider,
    password: &str,
    server_challenge: &[u8; 8],
) -> [u8; RESPONSE_LEN] {
    legacy::challenge_response(&nt_hash(provider, password), server_challenge)
}

/// LMv1 response: the challenge encrypted under the LM hash
pub fn lmv1_response(password: &str, server_challenge: &[u8; 8]) -> [u8; RESPONSE_LEN] {
    legacy::challenge_response(&legacy::lm_hash(password), server_challenge)
}

/// NTLMv1 session base key, `MD4(nt_hash)`
pub fn ntlmv1_session_base_key(provider: &CryptoProvider, nt_hash: &[u8; 16]) -> [u8; 16] {
    provider.md4(&[nt_hash])
}

/// NTOWFv2: `HMAC-MD5(nt_hash, UTF-16LE(uppercase(user) || domain))`
pub fn ntowf_v2(
    provider: &CryptoProvider,
    nt_hash: &[u8; 16],
    user: &str,
    domain: &str,
) -> [u8; 16] {
    let identity = utf16le(&(user.to_uppercase() + domain));
    provider.hmac_md5(nt_hash, &[&identity])
}

/// NTLMv2 NT response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ntlmv2Response {
    /// `HMAC-MD5(NTOWFv2, server_challenge || blob)`
    pub nt_proof: [u8; 16],
    /// Wire form: `nt_proof || blob`
    pub response: Vec<u8>,
    /// `HMAC-MD5(NTOWFv2, nt_proof)`
    pub session_base_key: [u8; 16],
}

/// Compute the NTLMv2 response over `blob` (the client's temp structure
/// with timestamp, client challenge and target info).
pub fn ntlmv2_response(
    provider: &CryptoProvider,
    ntowf: &[u8; 16],
    server_challenge: &[u8; 8],
    blob: &[u8],
) -> Ntlmv2Response {
    let nt_proof = provider.hmac_md5(ntowf, &[server_challenge, blob]);
    let mut response = Vec::with_capacity(16 + blob.len());
    response.extend_from_slice(&nt_proof);
    response.extend_from_slice(blob);
    Ntlmv2Response {
        nt_proof,
        response,
        session_base_key: provider.hmac_md5(ntowf, &[&nt_proof]),
    }
}

/// LMv2 response: `HMAC-MD5(NTOWFv2, server || client challenge) || client challenge`
pub fn lmv2_response(
    provider: &CryptoProvider,
    ntowf: &[u8; 16],
    server_challenge: &[u8; 8],
    client_challenge: &[u8; 8],
) -> [u8; RESPONSE_LEN] {
    let mac = provider.hmac_md5(ntowf, &[server_challenge, client_challenge]);
    let mut response = [0u8; RESPONSE_LEN];
    response[..16].copy_from_slice(&mac);
    response[16..].copy_from_slice(client_challenge);
    response
}

/// One direction of NTLMSSP extended session security
struct Direction {
    signing_key: [u8; 16],
    sealing: Arc4Cipher,
    sequence: u32,
}

impl Direction {
    fn new(
        provider: &CryptoProvider,
        exported: &[u8; 16],
        sign: &[u8],
        seal: &[u8],
    ) -> Result<Self, CryptoError> {
        let signing_key = provider.md5(&[exported, sign]);
        let sealing_key = provider.md5(&[exported, seal]);
        Ok(Self {
            signing_key,
            sealing: Arc4Cipher::new(&sealing_key)?,
            sequence: 0,
        })
    }

    /// `01000000 || RC4(HMAC-MD5(signing_key, seq || message)[..8]) || seq`,
    /// advancing both the sequence number and the sealing keystream.
    fn signature(&mut self, provider: &CryptoProvider, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        let seq = self.sequence.to_le_bytes();
        let mac = provider.hmac_md5(&self.signing_key, &[&seq, message]);

        let mut checksum = [0u8; 8];
        checksum.copy_from_slice(&mac[..8]);
        self.sealing.apply_keystream(&mut checksum);
        self.sequence = self.sequence.wrapping_add(1);

        let mut signature = [0u8; SIGNATURE_LEN];
        signature[..4].copy_from_slice(&SIGNATURE_VERSION);
        signature[4..12].copy_from_slice(&checksum);
        signature[12..].copy_from_slice(&seq);
        signature
    }
}

/// Sign and seal state of an authenticated NTLMSSP session (extended
/// session security with key exchange).
///
/// Each direction keeps its own ARC4 handle and sequence number for the
/// life of the session; messages must be processed in the order they are
/// sent.
pub struct NtlmSession {
    outbound: Direction,
    inbound: Direction,
}

impl NtlmSession {
    /// Derive signing and sealing state from the exported session key.
    ///
    /// # Errors
    ///
    /// Only fails if the sealing cipher cannot be keyed, which does not
    /// happen for a 16-byte key.
    pub fn new(
        provider: &CryptoProvider,
        exported_session_key: &[u8; 16],
        role: Role,
    ) -> Result<Self, CryptoError> {
        let key = exported_session_key;
        let client = Direction::new(provider, key, CLIENT_SIGNING, CLIENT_SEALING)?;
        let server = Direction::new(provider, key, SERVER_SIGNING, SERVER_SEALING)?;
        let (outbound, inbound) = match role {
            Role::Client => (client, server),
            Role::Server => (server, client),
        };
        Ok(Self { outbound, inbound })
    }

    /// Encrypt `message` in place and return its signature
    pub fn seal(&mut self, provider: &CryptoProvider, message: &mut [u8]) -> [u8; SIGNATURE_LEN] {
        let plaintext = message.to_vec();
        self.outbound.sealing.apply_keystream(message);
        self.outbound.signature(provider, &plaintext)
    }

    /// Decrypt `message` in place and check its signature.
    ///
    /// On `false` the message must be discarded; the inbound state has
    /// still advanced, as it does for the peer.
    pub fn unseal(
        &mut self,
        provider: &CryptoProvider,
        message: &mut [u8],
        signature: &[u8; SIGNATURE_LEN],
    ) -> bool {
        self.inbound.sealing.apply_keystream(message);
        let expected = self.inbound.signature(provider, message);
        constant_time_eq(&expected, signature)
    }

    /// Signature for an integrity-only message
    pub fn sign(&mut self, provider: &CryptoProvider, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.outbound.signature(provider, message)
    }

    /// Check the signature of an integrity-only message
    pub fn verify(
        &mut self,
        provider: &CryptoProvider,
        message: &[u8],
        signature: &[u8; SIGNATURE_LEN],
    ) -> bool {
        let expected = self.inbound.signature(provider, message);
        constant_time_eq(&expected, signature)
    }
}

impl std::fmt::Debug for NtlmSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NtlmSession")
            .field("outbound_sequence", &self.outbound.sequence)
            .field("inbound_sequence", &self.inbound.sequence)
            .finish_non_exhaustive()
    }
}
