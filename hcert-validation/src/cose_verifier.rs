// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! COSE_Sign1 signature verification.
//!
//! Health certificates and trust-list bundles are signed with one of two
//! algorithms:
//! - ES256: ECDSA over P-256 with SHA-256. COSE carries the signature as the
//!   raw `r || s` concatenation (64 bytes); DER-encoded signatures are
//!   rejected.
//! - PS256: RSASSA-PSS with SHA-256 and MGF1-SHA256.
//!
//! Any other `alg` label is unsupported and must be treated as a signature
//! failure by callers.

use rsa::pss;
use sha2::Sha256;
use signature::Verifier;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use thiserror::Error;

use crate::public_key::IssuerPublicKey;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(i64)]
pub enum CoseAlgorithm {
    /// ECDSA w/ SHA-256 over P-256.
    Es256 = -7,
    /// RSASSA-PSS w/ SHA-256.
    Ps256 = -37,
}

impl CoseAlgorithm {
    /// Map a COSE `alg` header label to a supported algorithm.
    pub fn from_label(label: i64) -> Option<Self> {
        match label {
            -7 => Some(CoseAlgorithm::Es256),
            -37 => Some(CoseAlgorithm::Ps256),
            _ => None,
        }
    }

    pub fn label(self) -> i64 {
        self as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("bad public key: {0}")]
    InvalidPublicKey(String),
    #[error("bad signature encoding: {0}")]
    MalformedSignature(String),
    #[error("signature verification failed")]
    VerificationFailed,
}

/// Verify a COSE signature for a given algorithm and issuer key.
///
/// `sig_structure` is the exact byte array that must be verified per RFC 8152.
/// `cose_signature` is the signature byte string from the COSE_Sign1 structure.
pub fn verify_signature(
    alg: CoseAlgorithm,
    key: &IssuerPublicKey,
    sig_structure: &[u8],
    cose_signature: &[u8],
) -> Result<(), SignatureError> {
    match (alg, key) {
        (CoseAlgorithm::Es256, IssuerPublicKey::EcP256(pk)) => {
            verify_ecdsa_p256(pk, sig_structure, cose_signature)
        }
        (CoseAlgorithm::Ps256, IssuerPublicKey::Rsa(pk)) => {
            verify_rsa_pss(pk, sig_structure, cose_signature)
        }
        (CoseAlgorithm::Es256, IssuerPublicKey::Rsa(_)) => Err(SignatureError::InvalidPublicKey(
            "ES256 requires an EC P-256 key".to_string(),
        )),
        (CoseAlgorithm::Ps256, IssuerPublicKey::EcP256(_)) => Err(
            SignatureError::InvalidPublicKey("PS256 requires an RSA key".to_string()),
        ),
    }
}

/// Verify ES256 (P-256 ECDSA).
fn verify_ecdsa_p256(
    pk: &p256::PublicKey,
    msg: &[u8],
    sig: &[u8],
) -> Result<(), SignatureError> {
    // Convert to SEC1 encoded point bytes expected by the ECDSA verifying key.
    let ep = pk.to_encoded_point(false);
    let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(ep.as_bytes())
        .map_err(|e| SignatureError::InvalidPublicKey(format!("bad P-256 public key: {e}")))?;

    // COSE carries ECDSA signatures as the raw `r || s` concatenation; the
    // fixed-width parse rejects DER-encoded signatures.
    let signature = p256::ecdsa::Signature::from_slice(sig)
        .map_err(|e| SignatureError::MalformedSignature(format!("bad ES256 signature: {e}")))?;
    vk.verify(msg, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}

/// Verify PS256 (RSASSA-PSS + SHA-256).
fn verify_rsa_pss(pk: &rsa::RsaPublicKey, msg: &[u8], sig: &[u8]) -> Result<(), SignatureError> {
    let vk = pss::VerifyingKey::<Sha256>::new(pk.clone());
    let signature = pss::Signature::try_from(sig)
        .map_err(|e| SignatureError::MalformedSignature(format!("bad PS256 signature bytes: {e}")))?;
    vk.verify(msg, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}
