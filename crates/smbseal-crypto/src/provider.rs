//! Pluggable primitive dispatch
//!
//! Every protocol composition in this crate (signing, key derivation,
//! transform encryption, NTLM and Netlogon helpers) reaches its primitives
//! through a [`CryptoProvider`]. A provider starts out with every slot on the
//! built-in software implementation; an embedder with a hardware or FIPS
//! backend can install replacements for any subset of slots with
//! [`CryptoProvider::set_external`] and drop them again with
//! [`CryptoProvider::reset_external`].
//!
//! Overriding takes `&mut self`, so a provider is configured once while a
//! session or connection is being set up and then shared immutably (for
//! example behind an `Arc`) by everything that processes traffic.
//!
//! ```
//! use std::sync::Arc;
//! use smbseal_crypto::{CryptoProvider, ProviderTable, Slot};
//!
//! let mut provider = CryptoProvider::new();
//! let table = ProviderTable::default().with_md5(Arc::new(|_fragments: &[&[u8]]| [0u8; 16]));
//! provider.set_external(&table);
//!
//! assert_eq!(provider.overrides(), vec![Slot::Md5]);
//! assert_eq!(provider.md5(&[b"anything"]), [0u8; 16]);
//!
//! provider.reset_external();
//! assert!(provider.overrides().is_empty());
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::aes::{Aes128, KEY_LEN};
use crate::error::CryptoError;
use crate::hmac::{key_block, pad_blocks};
use crate::scratch::Scratch;
use crate::util::prepend;
use crate::{ccm, cmac, gcm, hmac, md4, md5, sha256, sha512};

/// Unkeyed 16-byte digest over a fragment list (MD4, MD5)
pub type Digest16Fn = Arc<dyn Fn(&[&[u8]]) -> [u8; 16] + Send + Sync>;

/// Keyed 16-byte MAC over a fragment list (HMAC-MD5)
pub type Mac16Fn = Arc<dyn Fn(&[u8], &[&[u8]]) -> [u8; 16] + Send + Sync>;

/// SHA-256 over a fragment list
pub type Sha256Fn = Arc<dyn Fn(&[&[u8]]) -> [u8; sha256::DIGEST_LEN] + Send + Sync>;

/// SHA-512 over a fragment list; the preauth running hash is built on it
pub type Sha512Fn = Arc<dyn Fn(&[&[u8]]) -> [u8; sha512::DIGEST_LEN] + Send + Sync>;

/// AES-128-CMAC over a fragment list
pub type CmacFn = Arc<dyn Fn(&[u8; KEY_LEN], &[&[u8]]) -> [u8; cmac::TAG_LEN] + Send + Sync>;

/// AES-128 key with its schedule expanded once, for connections that
/// encrypt many messages under the same key.
#[derive(Clone)]
pub struct ExpandedKey {
    key: [u8; KEY_LEN],
    cipher: Aes128,
}

impl ExpandedKey {
    /// Expand `key`
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            key: *key,
            cipher: Aes128::new(key),
        }
    }

    /// Raw key bytes, as handed to external AEAD slots
    pub const fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// Expanded schedule used by the software AEAD path
    pub const fn cipher(&self) -> &Aes128 {
        &self.cipher
    }
}

impl fmt::Debug for ExpandedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpandedKey").finish_non_exhaustive()
    }
}

/// Key argument of the AEAD dispatchers.
///
/// External slots always receive the raw bytes. The software path expands a
/// [`AeadKey::Raw`] key on every call and borrows the schedule of an
/// [`AeadKey::Expanded`] one.
#[derive(Clone, Copy)]
pub enum AeadKey<'a> {
    /// Key bytes only
    Raw(&'a [u8; KEY_LEN]),
    /// Key with a reusable schedule
    Expanded(&'a ExpandedKey),
}

impl<'a> AeadKey<'a> {
    /// Raw key bytes
    pub const fn bytes(self) -> &'a [u8; KEY_LEN] {
        match self {
            Self::Raw(key) => key,
            Self::Expanded(expanded) => &expanded.key,
        }
    }

    fn with_cipher<R>(self, f: impl FnOnce(&Aes128) -> R) -> R {
        match self {
            Self::Raw(key) => f(&Aes128::new(key)),
            Self::Expanded(expanded) => f(&expanded.cipher),
        }
    }
}

impl<'a> From<&'a [u8; KEY_LEN]> for AeadKey<'a> {
    fn from(key: &'a [u8; KEY_LEN]) -> Self {
        Self::Raw(key)
    }
}

impl<'a> From<&'a ExpandedKey> for AeadKey<'a> {
    fn from(key: &'a ExpandedKey) -> Self {
        Self::Expanded(key)
    }
}

impl fmt::Debug for AeadKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(_) => f.write_str("AeadKey::Raw(..)"),
            Self::Expanded(_) => f.write_str("AeadKey::Expanded(..)"),
        }
    }
}

/// AEAD encryption in place: `(key, nonce, aad, data) -> tag`
pub type SealFn = Arc<
    dyn Fn(&[u8; KEY_LEN], &[u8], &[u8], &mut [u8]) -> Result<[u8; 16], CryptoError>
        + Send
        + Sync,
>;

/// AEAD decryption in place: `(key, nonce, aad, data, tag) -> authenticated`
pub type OpenFn = Arc<
    dyn Fn(&[u8; KEY_LEN], &[u8], &[u8], &mut [u8], &[u8; 16]) -> Result<bool, CryptoError>
        + Send
        + Sync,
>;

/// One overridable primitive family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// MD4 digest
    Md4,
    /// MD5 digest
    Md5,
    /// HMAC-MD5
    HmacMd5,
    /// SHA-256 digest (also carries HMAC-SHA-256)
    Sha256,
    /// Running SHA-512
    Sha512,
    /// AES-128-CMAC
    AesCmac,
    /// AES-128-CCM encryption
    CcmEncrypt,
    /// AES-128-CCM decryption
    CcmDecrypt,
    /// AES-128-GCM encryption
    GcmEncrypt,
    /// AES-128-GCM decryption
    GcmDecrypt,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Md4 => "md4",
            Self::Md5 => "md5",
            Self::HmacMd5 => "hmac-md5",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::AesCmac => "aes-cmac",
            Self::CcmEncrypt => "ccm-encrypt",
            Self::CcmDecrypt => "ccm-decrypt",
            Self::GcmEncrypt => "gcm-encrypt",
            Self::GcmDecrypt => "gcm-decrypt",
        };
        f.write_str(name)
    }
}

/// A set of primitive implementations, one optional slot per family.
///
/// `None` means "use the built-in implementation". The default table has
/// every slot empty.
#[derive(Clone, Default)]
pub struct ProviderTable {
    /// MD4 replacement
    pub md4: Option<Digest16Fn>,
    /// MD5 replacement
    pub md5: Option<Digest16Fn>,
    /// HMAC-MD5 replacement
    pub hmac_md5: Option<Mac16Fn>,
    /// SHA-256 replacement
    pub sha256: Option<Sha256Fn>,
    /// SHA-512 replacement
    pub sha512: Option<Sha512Fn>,
    /// AES-CMAC replacement
    pub aes_cmac: Option<CmacFn>,
    /// CCM encryption replacement
    pub ccm_encrypt: Option<SealFn>,
    /// CCM decryption replacement
    pub ccm_decrypt: Option<OpenFn>,
    /// GCM encryption replacement
    pub gcm_encrypt: Option<SealFn>,
    /// GCM decryption replacement
    pub gcm_decrypt: Option<OpenFn>,
}

impl ProviderTable {
    /// Set the MD4 slot
    #[must_use]
    pub fn with_md4(mut self, f: Digest16Fn) -> Self {
        self.md4 = Some(f);
        self
    }

    /// Set the MD5 slot
    #[must_use]
    pub fn with_md5(mut self, f: Digest16Fn) -> Self {
        self.md5 = Some(f);
        self
    }

    /// Set the HMAC-MD5 slot
    #[must_use]
    pub fn with_hmac_md5(mut self, f: Mac16Fn) -> Self {
        self.hmac_md5 = Some(f);
        self
    }

    /// Set the SHA-256 slot
    #[must_use]
    pub fn with_sha256(mut self, f: Sha256Fn) -> Self {
        self.sha256 = Some(f);
        self
    }

    /// Set the SHA-512 slot
    #[must_use]
    pub fn with_sha512(mut self, f: Sha512Fn) -> Self {
        self.sha512 = Some(f);
        self
    }

    /// Set the AES-CMAC slot
    #[must_use]
    pub fn with_aes_cmac(mut self, f: CmacFn) -> Self {
        self.aes_cmac = Some(f);
        self
    }

    /// Set both CCM slots
    #[must_use]
    pub fn with_ccm(mut self, encrypt: SealFn, decrypt: OpenFn) -> Self {
        self.ccm_encrypt = Some(encrypt);
        self.ccm_decrypt = Some(decrypt);
        self
    }

    /// Set both GCM slots
    #[must_use]
    pub fn with_gcm(mut self, encrypt: SealFn, decrypt: OpenFn) -> Self {
        self.gcm_encrypt = Some(encrypt);
        self.gcm_decrypt = Some(decrypt);
        self
    }

    /// Slots that carry a replacement
    pub fn populated(&self) -> Vec<Slot> {
        [
            (Slot::Md4, self.md4.is_some()),
            (Slot::Md5, self.md5.is_some()),
            (Slot::HmacMd5, self.hmac_md5.is_some()),
            (Slot::Sha256, self.sha256.is_some()),
            (Slot::Sha512, self.sha512.is_some()),
            (Slot::AesCmac, self.aes_cmac.is_some()),
            (Slot::CcmEncrypt, self.ccm_encrypt.is_some()),
            (Slot::CcmDecrypt, self.ccm_decrypt.is_some()),
            (Slot::GcmEncrypt, self.gcm_encrypt.is_some()),
            (Slot::GcmDecrypt, self.gcm_decrypt.is_some()),
        ]
        .into_iter()
        .filter_map(|(slot, set)| set.then_some(slot))
        .collect()
    }

    fn merge_from(&mut self, other: &Self) {
        fn take<T: Clone>(dst: &mut Option<T>, src: Option<&T>) {
            if let Some(f) = src {
                *dst = Some(f.clone());
            }
        }
        take(&mut self.md4, other.md4.as_ref());
        take(&mut self.md5, other.md5.as_ref());
        take(&mut self.hmac_md5, other.hmac_md5.as_ref());
        take(&mut self.sha256, other.sha256.as_ref());
        take(&mut self.sha512, other.sha512.as_ref());
        take(&mut self.aes_cmac, other.aes_cmac.as_ref());
        take(&mut self.ccm_encrypt, other.ccm_encrypt.as_ref());
        take(&mut self.ccm_decrypt, other.ccm_decrypt.as_ref());
        take(&mut self.gcm_encrypt, other.gcm_encrypt.as_ref());
        take(&mut self.gcm_decrypt, other.gcm_decrypt.as_ref());
    }
}

impl fmt::Debug for ProviderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTable")
            .field("populated", &self.populated())
            .finish()
    }
}

/// The active primitive table that protocol compositions dispatch through
#[derive(Debug, Clone, Default)]
pub struct CryptoProvider {
    active: ProviderTable,
}

impl CryptoProvider {
    /// A provider with every slot on the software implementation
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider with `table` already installed
    pub fn with_overrides(table: &ProviderTable) -> Self {
        let mut provider = Self::new();
        provider.set_external(table);
        provider
    }

    /// Install every populated slot of `table`; empty slots leave the
    /// current entry untouched.
    pub fn set_external(&mut self, table: &ProviderTable) {
        for slot in table.populated() {
            debug!(%slot, "installing external primitive");
        }
        self.active.merge_from(table);
    }

    /// Return every slot to the software implementation
    pub fn reset_external(&mut self) {
        debug!(
            overridden = self.active.populated().len(),
            "resetting primitive table to defaults"
        );
        self.active = ProviderTable::default();
    }

    /// Slots currently routed to an external implementation
    pub fn overrides(&self) -> Vec<Slot> {
        self.active.populated()
    }

    /// MD4 of the concatenated fragments
    pub fn md4(&self, fragments: &[&[u8]]) -> [u8; md4::DIGEST_LEN] {
        match &self.active.md4 {
            Some(f) => f(fragments),
            None => md4::digest(fragments),
        }
    }

    /// MD5 of the concatenated fragments
    pub fn md5(&self, fragments: &[&[u8]]) -> [u8; md5::DIGEST_LEN] {
        match &self.active.md5 {
            Some(f) => f(fragments),
            None => md5::digest(fragments),
        }
    }

    /// HMAC-MD5 of the concatenated fragments
    pub fn hmac_md5(&self, key: &[u8], fragments: &[&[u8]]) -> [u8; md5::DIGEST_LEN] {
        match &self.active.hmac_md5 {
            Some(f) => f(key, fragments),
            None => hmac::hmac_md5(key, fragments),
        }
    }

    /// SHA-256 of the concatenated fragments
    pub fn sha256(&self, fragments: &[&[u8]]) -> [u8; sha256::DIGEST_LEN] {
        match &self.active.sha256 {
            Some(f) => f(fragments),
            None => sha256::digest(fragments),
        }
    }

    /// HMAC-SHA-256 assembled from two calls to the SHA-256 slot
    pub fn hmac_sha256(&self, key: &[u8], fragments: &[&[u8]]) -> [u8; sha256::DIGEST_LEN] {
        let block = key_block(key, |k| self.sha256(&[k]).to_vec());
        let (inner_pad, outer_pad) = pad_blocks(&block);

        let inner = self.sha256(&prepend(&inner_pad, fragments));

        self.sha256(&[&outer_pad, &inner])
    }

    /// SHA-512 of the concatenated fragments
    pub fn sha512(&self, fragments: &[&[u8]]) -> [u8; sha512::DIGEST_LEN] {
        match &self.active.sha512 {
            Some(f) => f(fragments),
            None => sha512::digest(fragments),
        }
    }

    /// Advance a running SHA-512 state: `state = SHA-512(state || fragments)`
    pub fn sha512_running(&self, state: &mut [u8; sha512::DIGEST_LEN], fragments: &[&[u8]]) {
        let next = self.sha512(&prepend(state.as_slice(), fragments));
        *state = next;
    }

    /// AES-128-CMAC of the concatenated fragments
    pub fn aes_cmac(&self, key: &[u8; KEY_LEN], fragments: &[&[u8]]) -> [u8; cmac::TAG_LEN] {
        match &self.active.aes_cmac {
            Some(f) => f(key, fragments),
            None => cmac::aes_cmac(key, fragments),
        }
    }

    /// AES-128-CCM encryption in place, returning the tag.
    ///
    /// `scratch` is only used by the software path, as is the schedule of an
    /// [`AeadKey::Expanded`] key.
    ///
    /// # Errors
    ///
    /// Nonce or length violations and working buffer allocation failure.
    pub fn ccm_encrypt(
        &self,
        key: AeadKey<'_>,
        scratch: &mut Scratch<'_>,
        nonce: &[u8],
        aad: &[u8],
        data: &mut [u8],
    ) -> Result<[u8; ccm::TAG_LEN], CryptoError> {
        match &self.active.ccm_encrypt {
            Some(f) => f(key.bytes(), nonce, aad, data),
            None => key.with_cipher(|cipher| {
                ccm::encrypt_with(cipher, scratch, nonce, aad, data)
            }),
        }
    }

    /// AES-128-CCM decryption in place, returning whether `tag` verified.
    ///
    /// # Errors
    ///
    /// Nonce or length violations and working buffer allocation failure.
    pub fn ccm_decrypt(
        &self,
        key: AeadKey<'_>,
        scratch: &mut Scratch<'_>,
        nonce: &[u8],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8; ccm::TAG_LEN],
    ) -> Result<bool, CryptoError> {
        match &self.active.ccm_decrypt {
            Some(f) => f(key.bytes(), nonce, aad, data, tag),
            None => key.with_cipher(|cipher| {
                ccm::decrypt_with(cipher, scratch, nonce, aad, data, tag)
            }),
        }
    }

    /// AES-128-GCM encryption in place, returning the tag.
    ///
    /// # Errors
    ///
    /// IV or length violations and working buffer allocation failure.
    pub fn gcm_encrypt(
        &self,
        key: AeadKey<'_>,
        scratch: &mut Scratch<'_>,
        iv: &[u8],
        aad: &[u8],
        data: &mut [u8],
    ) -> Result<[u8; gcm::TAG_LEN], CryptoError> {
        match &self.active.gcm_encrypt {
            Some(f) => f(key.bytes(), iv, aad, data),
            None => key.with_cipher(|cipher| {
                gcm::encrypt_with(cipher, scratch, iv, aad, data)
            }),
        }
    }

    /// AES-128-GCM decryption in place, returning whether `tag` verified.
    ///
    /// # Errors
    ///
    /// IV or length violations and working buffer allocation failure.
    pub fn gcm_decrypt(
        &self,
        key: AeadKey<'_>,
        scratch: &mut Scratch<'_>,
        iv: &[u8],
        aad: &[u8],
        data: &mut [u8],
        tag: &[u8; gcm::TAG_LEN],
    ) -> Result<bool, CryptoError> {
        match &self.active.gcm_decrypt {
            Some(f) => f(key.bytes(), iv, aad, data, tag),
            None => key.with_cipher(|cipher| {
                gcm::decrypt_with(cipher, scratch, iv, aad, data, tag)
            }),
        }
    }
}
