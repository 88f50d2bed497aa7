// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Issuer public key extraction.
//!
//! Trust-list entries and trust anchors carry key material as either a DER
//! X.509 certificate or a bare DER SubjectPublicKeyInfo, frequently wrapped
//! in base64. This module normalizes all of those into a typed key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rsa::pkcs8::DecodePublicKey as _;
use rsa::RsaPublicKey;
use p256::pkcs8::DecodePublicKey as _;

/// A parsed issuer public key.
///
/// The two variants match the two COSE algorithms this domain honors:
/// ES256 requires an EC P-256 key, PS256 an RSA key.
#[derive(Debug, Clone)]
pub enum IssuerPublicKey {
    EcP256(p256::PublicKey),
    Rsa(RsaPublicKey),
}

impl IssuerPublicKey {
    /// Parse a key from a base64 string holding a DER certificate or SPKI.
    ///
    /// Whitespace (e.g. PEM-style line breaks) is tolerated.
    pub fn from_base64_der(b64: &str) -> Result<Self, String> {
        let compact: String = b64.chars().filter(|c| !c.is_whitespace()).collect();
        let der = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| format!("bad base64 key material: {e}"))?;
        Self::from_der(&der)
    }

    /// Parse a key from a DER X.509 certificate or a DER SPKI.
    pub fn from_der(der: &[u8]) -> Result<Self, String> {
        let spki = extract_spki_der_from_der_key_or_cert(der);
        Self::from_spki_der(&spki)
    }

    /// Parse a key from DER SubjectPublicKeyInfo bytes.
    pub fn from_spki_der(spki: &[u8]) -> Result<Self, String> {
        if let Ok(pk) = p256::PublicKey::from_public_key_der(spki) {
            return Ok(IssuerPublicKey::EcP256(pk));
        }
        if let Ok(pk) = RsaPublicKey::from_public_key_der(spki) {
            return Ok(IssuerPublicKey::Rsa(pk));
        }
        Err("public key is neither EC P-256 nor RSA".to_string())
    }
}

/// Normalize key input: if the DER parses as an X.509 certificate, use the
/// certificate's SubjectPublicKeyInfo; otherwise assume the input is already
/// SPKI DER.
fn extract_spki_der_from_der_key_or_cert(der: &[u8]) -> Vec<u8> {
    if let Ok((_, cert)) = x509_parser::parse_x509_certificate(der) {
        // `raw` is the DER encoding of the SPKI structure inside the certificate.
        return cert.tbs_certificate.subject_pki.raw.to_vec();
    }
    der.to_vec()
}
