//! Routing of protocol compositions through overridden provider slots

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use smbseal_crypto::provider::{OpenFn, SealFn};
use smbseal_crypto::{
    AeadKey, CipherId, CryptoError, CryptoProvider, Dialect, PreauthHash, ProviderTable,
    Scratch, SessionKeys, Slot, md5, netlogon, ntlm, signing, transform,
};

fn counting_md5(calls: &Arc<AtomicUsize>) -> ProviderTable {
    let calls = Arc::clone(calls);
    ProviderTable::default().with_md5(Arc::new(move |_fragments: &[&[u8]]| {
        calls.fetch_add(1, Ordering::SeqCst);
        [0xAB; 16]
    }))
}

#[test]
fn test_md5_override_leaves_nt_hash_on_software_path() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut provider = CryptoProvider::new();
    let software = ntlm::nt_hash(&provider, "password");

    provider.set_external(&counting_md5(&calls));
    assert_eq!(provider.overrides(), vec![Slot::Md5]);

    assert_eq!(ntlm::nt_hash(&provider, "password"), software);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let mut header = [0u8; signing::SMB1_HEADER_LEN];
    signing::smb1_sign(&provider, b"mac key", None, 0, &mut header, &[]).expect("full header");
    assert_eq!(header[14..22], [0xAB; 8]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let strong = netlogon::strong_session_key(&provider, &software, b"clientch", b"serverch");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        strong,
        provider.hmac_md5(&software, &[&[0xAB; 16]]),
        "strong key must hash the overridden MD5 output"
    );
}

#[test]
fn test_reset_restores_software_results() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut provider = CryptoProvider::with_overrides(&counting_md5(&calls));
    assert_eq!(provider.md5(&[b"abc"]), [0xAB; 16]);

    provider.reset_external();
    assert!(provider.overrides().is_empty());
    assert_eq!(provider.md5(&[b"abc"]), md5::digest(&[b"abc"]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_sha256_override_reaches_kdf_and_smb2_signing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let provider = CryptoProvider::with_overrides(&ProviderTable::default().with_sha256(
        Arc::new(move |fragments: &[&[u8]]| {
            counter.fetch_add(1, Ordering::SeqCst);
            smbseal_crypto::sha256::digest(fragments)
        }),
    ));

    let keys = SessionKeys::derive(&provider, Dialect::Smb302, &[7; 16], None)
        .expect("no preauth needed");
    // four purpose keys, two SHA-256 calls each
    assert_eq!(calls.load(Ordering::SeqCst), 8);

    let mut header = [0u8; signing::SMB2_HEADER_LEN];
    signing::sign(&provider, Dialect::Smb210, &keys.signing, &mut header, &[]).expect("full header");
    assert_eq!(calls.load(Ordering::SeqCst), 10);

    // SMB3 signing uses the CMAC slot, not SHA-256
    signing::sign(&provider, Dialect::Smb302, &keys.signing, &mut header, &[]).expect("full header");
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[test]
fn test_cmac_and_sha512_overrides() {
    let table = ProviderTable::default()
        .with_aes_cmac(Arc::new(|key: &[u8; 16], _fragments: &[&[u8]]| *key))
        .with_sha512(Arc::new(|fragments: &[&[u8]]| [fragments.len() as u8; 64]));
    let provider = CryptoProvider::with_overrides(&table);

    let mut header = [0u8; signing::SMB2_HEADER_LEN];
    signing::smb3_sign(&provider, &[0x5C; 16], &mut header, &[b"ignored"]).expect("full header");
    assert_eq!(header[48..64], [0x5C; 16]);

    let mut preauth = PreauthHash::new();
    preauth.update(&provider, &[b"negotiate"]);
    preauth.update(&provider, &[b"session setup"]);
    assert_eq!(preauth.value()[0], 2);
}

#[test]
fn test_aead_override_reaches_transform() {
    let seal: SealFn = Arc::new(
        |_key: &[u8; 16], _nonce: &[u8], _aad: &[u8], data: &mut [u8]| -> Result<[u8; 16], CryptoError> {
            data.reverse();
            Ok([0x77; 16])
        },
    );
    let open: OpenFn = Arc::new(
        |_key: &[u8; 16], _nonce: &[u8], _aad: &[u8], data: &mut [u8], tag: &[u8; 16]| -> Result<bool, CryptoError> {
            data.reverse();
            Ok(tag == &[0x77; 16])
        },
    );
    let provider = CryptoProvider::with_overrides(&ProviderTable::default().with_gcm(seal, open));

    let mut body = *b"abcdef";
    let header = transform::encrypt(
        &provider,
        CipherId::Aes128Gcm,
        AeadKey::Raw(&[0; 16]),
        &[1; 12],
        42,
        &mut Scratch::owned(),
        &mut body,
    )
    .expect("valid transform inputs");
    assert_eq!(&body, b"fedcba");
    assert_eq!(header.signature, [0x77; 16]);

    let mut packet = header.to_bytes().to_vec();
    packet.extend_from_slice(&body);
    let (_, plain) = transform::decrypt(
        &provider,
        CipherId::Aes128Gcm,
        AeadKey::Raw(&[0; 16]),
        &mut Scratch::owned(),
        &mut packet,
    )
    .expect("well formed")
    .expect("override accepts its own tag");
    assert_eq!(plain, b"abcdef");

    // CCM still runs the software implementation
    let mut body = *b"abcdef";
    transform::encrypt(
        &provider,
        CipherId::Aes128Ccm,
        AeadKey::Raw(&[0; 16]),
        &[1; 11],
        42,
        &mut Scratch::owned(),
        &mut body,
    )
    .expect("valid transform inputs");
    assert_ne!(&body, b"fedcba");
}

#[test]
fn test_configured_provider_is_shareable_across_threads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(CryptoProvider::with_overrides(&counting_md5(&calls)));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let provider = Arc::clone(&provider);
            scope.spawn(move || {
                for _ in 0..10 {
                    assert_eq!(provider.md5(&[b"x"]), [0xAB; 16]);
                }
            });
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 40);
}
