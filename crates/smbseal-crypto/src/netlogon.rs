//! Netlogon secure channel: session keys and the credential chain
//!
//! After `NetrServerReqChallenge` both ends hold the client and server
//! challenges and the machine account's NT hash. Each derives the same
//! session key, computes both initial credentials, and from then on every
//! authenticated call advances the client's stored credential in lock-step
//! on both sides. A single missed or repeated step desynchronises the
//! channel for good; nothing here can detect that beyond a failed compare.

use crate::arc4;
use crate::des;
use crate::error::CryptoError;
use crate::legacy::credential_step;
use crate::provider::CryptoProvider;
use crate::util::constant_time_eq;

/// Netlogon session key length
pub const SESSION_KEY_LEN: usize = 16;

/// Credential and challenge length
pub const CREDENTIAL_LEN: usize = 8;

/// Session key for the strong-key (MD5) negotiate flag:
/// `HMAC-MD5(nt_hash, MD5(0^4 || client_challenge || server_challenge))`
pub fn strong_session_key(
    provider: &CryptoProvider,
    nt_hash: &[u8; 16],
    client_challenge: &[u8; CREDENTIAL_LEN],
    server_challenge: &[u8; CREDENTIAL_LEN],
) -> [u8; SESSION_KEY_LEN] {
    let digest = provider.md5(&[&[0u8; 4], client_challenge, server_challenge]);
    provider.hmac_md5(nt_hash, &[&digest])
}

/// Session key without the strong-key flag.
///
/// The challenges are summed as two pairs of little-endian 32-bit words and
/// encrypted with DES under `nt_hash[0..7]`, then under `nt_hash[9..16]`. Only
/// the low 8 bytes of the key carry material.
pub fn des_session_key(
    nt_hash: &[u8; 16],
    client_challenge: &[u8; CREDENTIAL_LEN],
    server_challenge: &[u8; CREDENTIAL_LEN],
) -> [u8; SESSION_KEY_LEN] {
    let word = |bytes: &[u8; CREDENTIAL_LEN], at: usize| {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    };
    let mut sum = [0u8; CREDENTIAL_LEN];
    sum[..4].copy_from_slice(
        &word(client_challenge, 0)
            .wrapping_add(word(server_challenge, 0))
            .to_le_bytes(),
    );
    sum[4..].copy_from_slice(
        &word(client_challenge, 4)
            .wrapping_add(word(server_challenge, 4))
            .to_le_bytes(),
    );

    let mut first_key = [0u8; 7];
    first_key.copy_from_slice(&nt_hash[..7]);
    let mut second_key = [0u8; 7];
    second_key.copy_from_slice(&nt_hash[9..]);

    let mut key = [0u8; SESSION_KEY_LEN];
    key[..8].copy_from_slice(&des::encrypt_7(&second_key, &des::encrypt_7(&first_key, &sum)));
    key
}

/// Encrypt (or decrypt) an interactive-logon OWF password blob in place
/// with ARC4 keyed by the session key.
///
/// # Errors
///
/// Never fails for a 16-byte session key; the error is the ARC4 key check.
pub fn crypt_logon_blob(
    session_key: &[u8; SESSION_KEY_LEN],
    blob: &mut [u8],
) -> Result<(), CryptoError> {
    arc4::apply(session_key, blob)
}

/// Add `delta` to the first four bytes of a credential as a little-endian
/// word
fn advance(credential: &mut [u8; CREDENTIAL_LEN], delta: u32) {
    let low = u32::from_le_bytes([credential[0], credential[1], credential[2], credential[3]]);
    credential[..4].copy_from_slice(&low.wrapping_add(delta).to_le_bytes());
}

/// Rolling authenticator state shared (as two copies) by client and server
#[derive(Clone)]
pub struct CredentialChain {
    session_key: [u8; SESSION_KEY_LEN],
    client_credential: [u8; CREDENTIAL_LEN],
    server_credential: [u8; CREDENTIAL_LEN],
}

impl CredentialChain {
    /// Compute both initial credentials from the exchanged challenges
    pub fn new(
        session_key: [u8; SESSION_KEY_LEN],
        client_challenge: &[u8; CREDENTIAL_LEN],
        server_challenge: &[u8; CREDENTIAL_LEN],
    ) -> Self {
        Self {
            client_credential: credential_step(client_challenge, &session_key),
            server_credential: credential_step(server_challenge, &session_key),
            session_key,
        }
    }

    /// Credential the client presents in `NetrServerAuthenticate`
    pub const fn client_credential(&self) -> &[u8; CREDENTIAL_LEN] {
        &self.client_credential
    }

    /// Credential the server returns from `NetrServerAuthenticate`
    pub const fn server_credential(&self) -> &[u8; CREDENTIAL_LEN] {
        &self.server_credential
    }

    /// Session key the chain was built from
    pub const fn session_key(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.session_key
    }

    /// Server side check of the client's initial credential
    pub fn verify_client_credential(&self, presented: &[u8; CREDENTIAL_LEN]) -> bool {
        constant_time_eq(presented, &self.client_credential)
    }

    /// Client side check of the server's initial credential
    pub fn verify_server_credential(&self, presented: &[u8; CREDENTIAL_LEN]) -> bool {
        constant_time_eq(presented, &self.server_credential)
    }

    /// Client: fold `timestamp` into the stored credential and return the
    /// authenticator credential for the next call.
    pub fn next_authenticator(&mut self, timestamp: u32) -> [u8; CREDENTIAL_LEN] {
        advance(&mut self.client_credential, timestamp);
        credential_step(&self.client_credential, &self.session_key)
    }

    /// Client: step the stored credential by one and check the server's
    /// return authenticator.
    pub fn verify_return(&mut self, returned: &[u8; CREDENTIAL_LEN]) -> bool {
        advance(&mut self.client_credential, 1);
        let expected = credential_step(&self.client_credential, &self.session_key);
        constant_time_eq(&expected, returned)
    }

    /// Server: check a client authenticator and produce the return
    /// authenticator.
    ///
    /// Returns `None`, leaving the chain untouched, if the authenticator does
    /// not match.
    pub fn accept_authenticator(
        &mut self,
        credential: &[u8; CREDENTIAL_LEN],
        timestamp: u32,
    ) -> Option<[u8; CREDENTIAL_LEN]> {
        let mut stored = self.client_credential;
        advance(&mut stored, timestamp);
        if !constant_time_eq(&credential_step(&stored, &self.session_key), credential) {
            return None;
        }

        advance(&mut stored, 1);
        self.client_credential = stored;
        Some(credential_step(&stored, &self.session_key))
    }
}

impl std::fmt::Debug for CredentialChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialChain").finish_non_exhaustive()
    }
}
