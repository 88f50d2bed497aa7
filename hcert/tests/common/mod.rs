// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared helpers for `hcert` integration tests.
//!
//! Fixtures are produced at test time: keys are generated, certificates and
//! trust-list bundles are signed with them, and `HC1:` strings are assembled
//! through the same gzip/Base45 framing the pipeline decodes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write as _;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::write::GzEncoder;
use flate2::Compression;
use p256::pkcs8::DecodePrivateKey as _;
use p256::pkcs8::EncodePublicKey as _;
use signature::Signer as _;

use hcert::fetch::{FetchError, FetchResponse, HttpFetcher};
use hcert::rules::{
    BusinessRule, BusinessRulesEngine, ExternalParameters, RuleFilter, RuleResult,
};
use hcert::{StoreEndpoints, VerifierConfig};
use hcert_common::base45;

/// Reference instant all fixture windows are laid out around.
pub const NOW: i64 = 1_700_000_000;

pub const TRUST_URL: &str = "https://trust.test/trustlist";
pub const TRUST_SIG_URL: &str = "https://trust.test/trustlistsig";
pub const RULES_URL: &str = "https://trust.test/rules";
pub const RULES_SIG_URL: &str = "https://trust.test/rulessig";
pub const VALUE_SETS_URL: &str = "https://trust.test/valuesets";
pub const VALUE_SETS_SIG_URL: &str = "https://trust.test/valuesetssig";

/// Creates a self-signed P-256 certificate and matching signing key.
pub fn make_self_signed_p256_cert_and_key() -> (Vec<u8>, p256::ecdsa::SigningKey) {
    let certified = rcgen::generate_simple_self_signed(["example.test".to_string()]).unwrap();
    let cert_der = certified.cert.der().to_vec();

    let key_der = certified.key_pair.serialize_der();
    let signing_key = p256::ecdsa::SigningKey::from_pkcs8_der(&key_der).unwrap();

    (cert_der, signing_key)
}

/// SPKI DER for a signing key, the form trust-list entries carry.
pub fn spki_der(signing_key: &p256::ecdsa::SigningKey) -> Vec<u8> {
    p256::ecdsa::VerifyingKey::from(signing_key)
        .to_public_key_der()
        .unwrap()
        .to_vec()
}

/// Encodes a protected header map `{1: alg, 4: kid}` as CBOR bytes.
pub fn protected_header(alg: i64, kid: Option<&[u8]>) -> Vec<u8> {
    let mut enc = minicbor::Encoder::new(Vec::new());
    enc.map(1 + kid.is_some() as u64).unwrap();
    enc.i64(1).unwrap();
    enc.i64(alg).unwrap();
    if let Some(kid) = kid {
        enc.i64(4).unwrap();
        enc.bytes(kid).unwrap();
    }
    enc.into_writer()
}

fn encode_cose(protected: &[u8], payload: Option<&[u8]>, signature: &[u8]) -> Vec<u8> {
    let mut enc = minicbor::Encoder::new(Vec::new());
    enc.array(4).unwrap();
    enc.bytes(protected).unwrap();
    enc.map(0).unwrap();
    match payload {
        Some(p) => {
            enc.bytes(p).unwrap();
        }
        None => {
            enc.null().unwrap();
        }
    }
    enc.bytes(signature).unwrap();
    enc.into_writer()
}

/// Signs a COSE_Sign1 with ES256 and embeds the signature.
///
/// `payload: None` produces a detached message whose Sig_structure covers
/// `external_payload`.
pub fn sign_es256(
    protected: &[u8],
    payload: Option<&[u8]>,
    external_payload: Option<&[u8]>,
    signing_key: &p256::ecdsa::SigningKey,
) -> Vec<u8> {
    let placeholder = encode_cose(protected, payload, &[]);
    let parsed = hcert_common::parse_cose_sign1(&placeholder).unwrap();
    let sig_structure = parsed.sig_structure(external_payload).unwrap();
    let signature: p256::ecdsa::Signature = signing_key.sign(&sig_structure);
    let sig_bytes = signature.to_bytes();
    encode_cose(protected, payload, AsRef::<[u8]>::as_ref(&sig_bytes))
}

/// One trust-list entry fixture.
pub struct EntryFixture {
    pub kid: Vec<u8>,
    pub not_before: i64,
    pub not_after: i64,
    pub usage_bits: u8,
    pub key_der: Vec<u8>,
}

impl EntryFixture {
    pub fn active(kid: &[u8], usage_bits: u8, signing_key: &p256::ecdsa::SigningKey) -> Self {
        Self {
            kid: kid.to_vec(),
            not_before: NOW - 10_000,
            not_after: NOW + 10_000,
            usage_bits,
            key_der: spki_der(signing_key),
        }
    }
}

/// Encodes a trust-list payload with the integer-keyed wire schema.
pub fn encode_trust_list(valid_from: i64, valid_until: i64, entries: &[EntryFixture]) -> Vec<u8> {
    let mut enc = minicbor::Encoder::new(Vec::new());
    enc.map(3).unwrap();
    enc.i64(1).unwrap();
    enc.i64(valid_from).unwrap();
    enc.i64(2).unwrap();
    enc.i64(valid_until).unwrap();
    enc.i64(3).unwrap();
    enc.array(entries.len() as u64).unwrap();
    for e in entries {
        enc.map(5).unwrap();
        enc.i64(1).unwrap();
        enc.bytes(&e.kid).unwrap();
        enc.i64(2).unwrap();
        enc.i64(e.not_before).unwrap();
        enc.i64(3).unwrap();
        enc.i64(e.not_after).unwrap();
        enc.i64(4).unwrap();
        enc.i64(e.usage_bits as i64).unwrap();
        enc.i64(5).unwrap();
        enc.bytes(&e.key_der).unwrap();
    }
    enc.into_writer()
}

/// A self-contained signed bundle: payload embedded in the COSE envelope.
pub fn signed_bundle(payload: &[u8], anchor_key: &p256::ecdsa::SigningKey) -> Vec<u8> {
    sign_es256(&protected_header(-7, None), Some(payload), None, anchor_key)
}

/// A detached signature object over a raw content file.
pub fn detached_signature(content: &[u8], anchor_key: &p256::ecdsa::SigningKey) -> Vec<u8> {
    sign_es256(&protected_header(-7, None), None, Some(content), anchor_key)
}

/// The kind of entries a fixture certificate carries.
#[derive(Clone, Copy)]
pub enum FixtureKind {
    Vaccination,
    Test,
    Recovery,
}

/// Encodes a CWT claim map holding a minimal but schema-complete certificate.
pub fn encode_cwt(
    issuer: Option<&str>,
    issued_at: Option<i64>,
    expires_at: Option<i64>,
    kind: FixtureKind,
) -> Vec<u8> {
    let mut enc = minicbor::Encoder::new(Vec::new());
    let len = 1 + issuer.is_some() as u64 + issued_at.is_some() as u64 + expires_at.is_some() as u64;
    enc.map(len).unwrap();
    if let Some(iss) = issuer {
        enc.i64(1).unwrap();
        enc.str(iss).unwrap();
    }
    if let Some(exp) = expires_at {
        enc.i64(4).unwrap();
        enc.i64(exp).unwrap();
    }
    if let Some(iat) = issued_at {
        enc.i64(6).unwrap();
        enc.i64(iat).unwrap();
    }
    enc.i64(-260).unwrap();
    enc.map(1).unwrap();
    enc.i64(1).unwrap();

    enc.map(4).unwrap();
    enc.str("ver").unwrap();
    enc.str("1.2.1").unwrap();
    enc.str("nam").unwrap();
    enc.map(4).unwrap();
    enc.str("fn").unwrap();
    enc.str("Musterfrau-Gößinger").unwrap();
    enc.str("fnt").unwrap();
    enc.str("MUSTERFRAU<GOESSINGER").unwrap();
    enc.str("gn").unwrap();
    enc.str("Gabriele").unwrap();
    enc.str("gnt").unwrap();
    enc.str("GABRIELE").unwrap();
    enc.str("dob").unwrap();
    enc.str("1998-02-26").unwrap();
    match kind {
        FixtureKind::Vaccination => {
            enc.str("v").unwrap();
            enc.array(1).unwrap();
            enc.map(6).unwrap();
            enc.str("tg").unwrap();
            enc.str("840539006").unwrap();
            enc.str("mp").unwrap();
            enc.str("EU/1/20/1528").unwrap();
            enc.str("dn").unwrap();
            enc.i64(2).unwrap();
            enc.str("sd").unwrap();
            enc.i64(2).unwrap();
            enc.str("dt").unwrap();
            enc.str("2021-02-18").unwrap();
            enc.str("ci").unwrap();
            enc.str("URN:UVCI:01:AT:10807843F94AEE0EE5093FBC254BD813#B").unwrap();
        }
        FixtureKind::Test => {
            enc.str("t").unwrap();
            enc.array(1).unwrap();
            enc.map(4).unwrap();
            enc.str("tg").unwrap();
            enc.str("840539006").unwrap();
            enc.str("tt").unwrap();
            enc.str("LP6464-4").unwrap();
            enc.str("tr").unwrap();
            enc.str("260415000").unwrap();
            enc.str("ci").unwrap();
            enc.str("URN:UVCI:01:AT:B5921A35D6A0D696421B3E2462178297#E").unwrap();
        }
        FixtureKind::Recovery => {
            enc.str("r").unwrap();
            enc.array(1).unwrap();
            enc.map(4).unwrap();
            enc.str("tg").unwrap();
            enc.str("840539006").unwrap();
            enc.str("df").unwrap();
            enc.str("2021-04-04").unwrap();
            enc.str("du").unwrap();
            enc.str("2021-10-04").unwrap();
            enc.str("ci").unwrap();
            enc.str("URN:UVCI:01:AT:858CC18CFCF5965EF82F60E493349AA5#K").unwrap();
        }
    }

    enc.into_writer()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Assembles a full `HC1:` string from COSE bytes.
pub fn hc1_encode(cose: &[u8]) -> String {
    format!("HC1:{}", base45::encode(&gzip(cose)))
}

/// Builds a complete signed `HC1:` certificate string.
pub fn signed_hc1(
    kid: &[u8],
    issuer_key: &p256::ecdsa::SigningKey,
    issued_at: i64,
    expires_at: i64,
    kind: FixtureKind,
) -> String {
    let cwt = encode_cwt(Some("AT"), Some(issued_at), Some(expires_at), kind);
    let cose = sign_es256(&protected_header(-7, Some(kid)), Some(&cwt), None, issuer_key);
    hc1_encode(&cose)
}

/// A fetcher serving canned responses from a mutable map.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, Result<FetchResponse, FetchError>>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ok(&self, url: &str, body: Vec<u8>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(FetchResponse { status: 200, body }));
    }

    pub fn set_status(&self, url: &str, status: u16) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Ok(FetchResponse {
                status,
                body: Vec::new(),
            }),
        );
    }

    pub fn set_unreachable(&self, url: &str) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            Err(FetchError::Transport("connection refused".to_string())),
        );
    }

    /// Number of GETs served for `url`.
    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HttpFetcher for MockFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Transport(format!("no response for {url}"))))
    }
}

/// An engine stub that records its inputs and replays canned results.
#[derive(Default)]
pub struct StubEngine {
    pub results: Mutex<Vec<RuleResult>>,
    pub seen_rules: Mutex<Vec<String>>,
    pub seen_filter: Mutex<Option<(String, String)>>,
    pub seen_value_sets: Mutex<Option<HashMap<String, Vec<String>>>>,
    pub seen_certificate: Mutex<Option<serde_json::Value>>,
}

impl StubEngine {
    pub fn returning(results: Vec<RuleResult>) -> Self {
        Self {
            results: Mutex::new(results),
            ..Default::default()
        }
    }
}

impl BusinessRulesEngine for StubEngine {
    fn evaluate(
        &self,
        rules: &[BusinessRule],
        filter: &RuleFilter,
        external: &ExternalParameters,
        certificate: &serde_json::Value,
    ) -> Vec<RuleResult> {
        *self.seen_rules.lock().unwrap() =
            rules.iter().map(|r| r.identifier.clone()).collect();
        *self.seen_filter.lock().unwrap() = Some((
            filter.country.clone(),
            filter.certification_type.as_str().to_string(),
        ));
        *self.seen_value_sets.lock().unwrap() = Some(external.value_sets.clone());
        *self.seen_certificate.lock().unwrap() = Some(certificate.clone());
        self.results.lock().unwrap().clone()
    }
}

/// Test configuration pointing every store at the mock endpoints.
pub fn test_config(anchor_cert_der: &[u8]) -> VerifierConfig {
    let anchor = STANDARD.encode(anchor_cert_der);
    VerifierConfig {
        trust_list: StoreEndpoints {
            url: TRUST_URL.into(),
            signature_url: TRUST_SIG_URL.into(),
            anchor: anchor.clone(),
        },
        business_rules: StoreEndpoints {
            url: RULES_URL.into(),
            signature_url: RULES_SIG_URL.into(),
            anchor: anchor.clone(),
        },
        value_sets: StoreEndpoints {
            url: VALUE_SETS_URL.into(),
            signature_url: VALUE_SETS_SIG_URL.into(),
            anchor,
        },
        ..VerifierConfig::default()
    }
}

/// A rules bundle with one rule, and a value-sets bundle with one set.
pub fn encode_rules_bundle(valid_from: i64, valid_until: i64) -> Vec<u8> {
    let mut enc = minicbor::Encoder::new(Vec::new());
    enc.map(3).unwrap();
    enc.str("validFrom").unwrap();
    enc.i64(valid_from).unwrap();
    enc.str("validUntil").unwrap();
    enc.i64(valid_until).unwrap();
    enc.str("rules").unwrap();
    enc.array(1).unwrap();
    enc.map(3).unwrap();
    enc.str("identifier").unwrap();
    enc.str("GR-AT-0001").unwrap();
    enc.str("country").unwrap();
    enc.str("AT").unwrap();
    enc.str("logic").unwrap();
    enc.str(r#"{"var":"payload.v.0.dn"}"#).unwrap();
    enc.into_writer()
}

pub fn encode_value_sets_bundle(valid_from: i64, valid_until: i64) -> Vec<u8> {
    let mut enc = minicbor::Encoder::new(Vec::new());
    enc.map(3).unwrap();
    enc.str("validFrom").unwrap();
    enc.i64(valid_from).unwrap();
    enc.str("validUntil").unwrap();
    enc.i64(valid_until).unwrap();
    enc.str("sets").unwrap();
    enc.map(1).unwrap();
    enc.str("vaccines-covid-19-names").unwrap();
    enc.map(3).unwrap();
    enc.str("validFrom").unwrap();
    enc.i64(valid_from).unwrap();
    enc.str("validUntil").unwrap();
    enc.i64(valid_until).unwrap();
    enc.str("values").unwrap();
    enc.map(1).unwrap();
    enc.str("EU/1/20/1528").unwrap();
    enc.str("Comirnaty").unwrap();
    enc.into_writer()
}
