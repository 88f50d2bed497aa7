// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Signature verification tests over freshly generated keys.

use hcert_common::parse_cose_sign1;
use hcert_validation::{verify_signature, CoseAlgorithm, IssuerPublicKey, SignatureError};
use p256::pkcs8::EncodePublicKey as _;
use signature::SignatureEncoding as _;
use signature::Signer as _;

// Helper to build protected headers containing `{ 1: alg }`.
fn encode_protected_map(alg: i64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut enc = minicbor::Encoder::new(&mut out);
    enc.map(1).unwrap();
    enc.i64(1).unwrap();
    enc.i64(alg).unwrap();
    out
}

// Helper to build a minimal COSE_Sign1 structure with an embedded payload.
fn encode_sign1(protected: &[u8], payload: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut enc = minicbor::Encoder::new(&mut out);

    enc.array(4).unwrap();
    enc.bytes(protected).unwrap();
    enc.map(0).unwrap();
    enc.bytes(payload).unwrap();
    enc.bytes(signature).unwrap();
    out
}

fn sig_structure_for(protected: &[u8], payload: &[u8]) -> Vec<u8> {
    let msg = encode_sign1(protected, payload, b"");
    let parsed = parse_cose_sign1(&msg).unwrap();
    parsed.sig_structure(None).unwrap()
}

fn es256_key() -> (p256::ecdsa::SigningKey, IssuerPublicKey) {
    let mut rng = p256::elliptic_curve::rand_core::OsRng;
    let sk = p256::ecdsa::SigningKey::random(&mut rng);
    let vk = p256::ecdsa::VerifyingKey::from(&sk);
    let spki = vk.to_public_key_der().unwrap().to_vec();
    let key = IssuerPublicKey::from_spki_der(&spki).unwrap();
    (sk, key)
}

#[test]
fn es256_verifies_raw_rs_signature() {
    let (sk, key) = es256_key();

    let protected = encode_protected_map(-7);
    let sig_structure = sig_structure_for(&protected, b"payload");
    let signature: p256::ecdsa::Signature = sk.sign(&sig_structure);
    let sig_bytes = signature.to_bytes();

    assert!(verify_signature(
        CoseAlgorithm::Es256,
        &key,
        &sig_structure,
        AsRef::<[u8]>::as_ref(&sig_bytes)
    )
    .is_ok());
}

#[test]
fn es256_rejects_tampered_sig_structure() {
    let (sk, key) = es256_key();

    let protected = encode_protected_map(-7);
    let sig_structure = sig_structure_for(&protected, b"payload");
    let signature: p256::ecdsa::Signature = sk.sign(&sig_structure);

    let mut tampered = sig_structure.clone();
    let n = tampered.len();
    tampered[n - 1] ^= 0x01;
    let sig_bytes = signature.to_bytes();

    assert_eq!(
        verify_signature(
            CoseAlgorithm::Es256,
            &key,
            &tampered,
            AsRef::<[u8]>::as_ref(&sig_bytes)
        ),
        Err(SignatureError::VerificationFailed)
    );
}

#[test]
fn es256_rejects_der_encoded_signature() {
    let (sk, key) = es256_key();

    let protected = encode_protected_map(-7);
    let sig_structure = sig_structure_for(&protected, b"payload");
    let signature: p256::ecdsa::Signature = sk.sign(&sig_structure);
    let der = signature.to_der();

    let err = verify_signature(CoseAlgorithm::Es256, &key, &sig_structure, der.as_bytes())
        .unwrap_err();
    assert!(matches!(err, SignatureError::MalformedSignature(_)));
}

#[test]
fn es256_rejects_wrong_length_signature() {
    let (_, key) = es256_key();
    let sig_structure = sig_structure_for(&encode_protected_map(-7), b"payload");

    let err =
        verify_signature(CoseAlgorithm::Es256, &key, &sig_structure, &[0u8; 63]).unwrap_err();
    assert!(matches!(err, SignatureError::MalformedSignature(_)));
}

#[test]
fn ps256_verifies() {
    use rsa::pkcs8::EncodePublicKey as _;
    use signature::RandomizedSigner;

    let mut rng = rsa::rand_core::OsRng;
    let private_key = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
    let spki = private_key
        .to_public_key()
        .to_public_key_der()
        .unwrap()
        .to_vec();
    let key = IssuerPublicKey::from_spki_der(&spki).unwrap();

    let protected = encode_protected_map(-37);
    let sig_structure = sig_structure_for(&protected, b"payload");

    let signing_key = rsa::pss::SigningKey::<sha2::Sha256>::new(private_key);
    let signature: rsa::pss::Signature = signing_key.sign_with_rng(&mut rng, &sig_structure);
    let sig_bytes = signature.to_bytes();

    assert!(
        verify_signature(CoseAlgorithm::Ps256, &key, &sig_structure, sig_bytes.as_ref()).is_ok()
    );

    // And the wrong Sig_structure fails.
    let other = sig_structure_for(&protected, b"other payload");
    assert_eq!(
        verify_signature(CoseAlgorithm::Ps256, &key, &other, sig_bytes.as_ref()),
        Err(SignatureError::VerificationFailed)
    );
}

#[test]
fn algorithm_key_mismatch_fails() {
    let (_, ec_key) = es256_key();
    let sig_structure = sig_structure_for(&encode_protected_map(-37), b"payload");

    let err =
        verify_signature(CoseAlgorithm::Ps256, &ec_key, &sig_structure, &[0u8; 256]).unwrap_err();
    assert!(matches!(err, SignatureError::InvalidPublicKey(_)));
}

#[test]
fn only_es256_and_ps256_have_labels() {
    assert_eq!(CoseAlgorithm::from_label(-7), Some(CoseAlgorithm::Es256));
    assert_eq!(CoseAlgorithm::from_label(-37), Some(CoseAlgorithm::Ps256));
    for label in [-35, -36, -257, -48, 0, 1] {
        assert_eq!(CoseAlgorithm::from_label(label), None);
    }
}
