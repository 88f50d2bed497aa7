// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The layered verification pipeline.
//!
//! ```text
//! input -> strip HC1: -> Base45 -> gzip -> COSE_Sign1 -> CWT -> EuHealthCert
//! ```
//!
//! Each stage short-circuits to a terminal verdict on failure. From the
//! temporal check onward the decoded metadata and certificate travel with the
//! failure verdict, so callers can still display an expired certificate.

use std::sync::Arc;

use hcert_common::{base45, decompress, parse_cose_sign1};
use hcert_validation::{verify_signature, CoseAlgorithm};
use tracing::debug;

use crate::certificate::EuHealthCert;
use crate::clock::{Clock, SystemClock};
use crate::config::VerifierConfig;
use crate::cwt::Cwt;
use crate::error::VerificationError;
use crate::fetch::{HttpFetcher, ReqwestFetcher};
use crate::rules::{
    BusinessRules, BusinessRulesEngine, ExternalParameters, RuleFilter, RuleResult, ValueSets,
};
use crate::storage::{EncryptedFileStorage, ProtectedStorage};
use crate::store::SignedStore;
use crate::truststore::TrustStore;
use crate::verdict::{VerificationMeta, VerificationVerdict};

const SCHEME_PREFIX: &str = "HC1:";

/// The verification core.
///
/// Holds the three process-wide stores and the injected capabilities. Tests
/// construct a fresh instance with in-memory capabilities instead of relying
/// on any static state.
pub struct CertificateVerifier {
    trust: TrustStore,
    rules: SignedStore<BusinessRules>,
    value_sets: SignedStore<ValueSets>,
    clock: Arc<dyn Clock>,
    engine: Arc<dyn BusinessRulesEngine>,
    enforce_issued_at: bool,
}

impl CertificateVerifier {
    /// Production wiring: HTTP fetch, encrypted files, system clock.
    pub fn new(
        config: VerifierConfig,
        engine: Arc<dyn BusinessRulesEngine>,
    ) -> Result<Self, VerificationError> {
        let fetcher: Arc<dyn HttpFetcher> = Arc::new(
            ReqwestFetcher::new(config.http_timeout)
                .map_err(|e| VerificationError::TrustServiceError(e.to_string()))?,
        );
        let storage: Arc<dyn ProtectedStorage> = Arc::new(EncryptedFileStorage::new(
            config.storage_dir.clone(),
            &config.storage_alias,
        ));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Ok(Self::with_capabilities(config, fetcher, storage, clock, engine))
    }

    /// Capability-injecting constructor; tests wire in-memory variants here.
    pub fn with_capabilities(
        config: VerifierConfig,
        fetcher: Arc<dyn HttpFetcher>,
        storage: Arc<dyn ProtectedStorage>,
        clock: Arc<dyn Clock>,
        engine: Arc<dyn BusinessRulesEngine>,
    ) -> Self {
        let trust = TrustStore::new(
            config.trust_list,
            Arc::clone(&fetcher),
            Arc::clone(&storage),
            Arc::clone(&clock),
            config.unavailable_trust_list_policy,
        );
        let rules = SignedStore::new(
            config.business_rules,
            Arc::clone(&fetcher),
            Arc::clone(&storage),
            Arc::clone(&clock),
        );
        let value_sets = SignedStore::new(
            config.value_sets,
            Arc::clone(&fetcher),
            Arc::clone(&storage),
            Arc::clone(&clock),
        );

        Self {
            trust,
            rules,
            value_sets,
            clock,
            engine,
            enforce_issued_at: config.enforce_issued_at,
        }
    }

    /// Decode and verify one encoded certificate.
    ///
    /// Never fails as a `Result`: every failure mode is a verdict carrying
    /// exactly one error tag.
    pub async fn verify(&self, encoded: &str) -> VerificationVerdict {
        // 1. Scheme prefix.
        let Some(body) = encoded.strip_prefix(SCHEME_PREFIX) else {
            return VerificationVerdict::rejected(VerificationError::InvalidSchemePrefix);
        };

        // 2. Base45.
        let compressed = match base45::decode(body) {
            Ok(bytes) => bytes,
            Err(e) => {
                return VerificationVerdict::rejected(VerificationError::Base45DecodingFailed(e))
            }
        };

        // 3. Gzip.
        let cose_bytes = match decompress::inflate(&compressed) {
            Ok(bytes) => bytes,
            Err(e) => {
                return VerificationVerdict::rejected(VerificationError::DecompressionFailed(e))
            }
        };

        // 4. COSE_Sign1; the key identifier is required for trust lookup.
        let parsed = match parse_cose_sign1(&cose_bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                return VerificationVerdict::rejected(VerificationError::CoseDeserializationFailed(
                    e,
                ))
            }
        };
        let Some(key_id) = parsed.key_id().map(<[u8]>::to_vec) else {
            return VerificationVerdict::rejected(VerificationError::CoseDeserializationFailed(
                "missing key identifier (kid)".to_string(),
            ));
        };
        let Some(payload) = parsed.payload.as_deref() else {
            return VerificationVerdict::rejected(VerificationError::CborDeserializationFailed(
                "COSE payload is detached".to_string(),
            ));
        };

        // 5. CWT + health certificate projection.
        let cwt = match Cwt::parse(payload) {
            Ok(cwt) => cwt,
            Err(e) => {
                return VerificationVerdict::rejected(VerificationError::CborDeserializationFailed(
                    e,
                ))
            }
        };

        let meta = VerificationMeta {
            issuer: cwt.issuer.clone(),
            issued_at: cwt.issued_at,
            expires_at: cwt.expires_at,
        };
        let certificate = cwt.certificate.clone();

        // 6. Temporal validity. Decoded content rides along from here on.
        if let Err(e) = cwt.is_valid(self.clock.now(), self.enforce_issued_at) {
            return VerificationVerdict::rejected_with_content(e, meta, certificate);
        }

        // 7. Trust lookup by (kid, certificate type).
        let key = match self
            .trust
            .key_for(&key_id, certificate.certification_type())
            .await
        {
            Ok(key) => key,
            Err(e) => return VerificationVerdict::rejected_with_content(e, meta, certificate),
        };

        // 8. Signature. Unsupported algorithms fail here, not earlier: the
        // decode stages have no opinion about crypto.
        let Some(alg) = parsed.algorithm().and_then(CoseAlgorithm::from_label) else {
            return VerificationVerdict::rejected_with_content(
                VerificationError::SignatureInvalid,
                meta,
                certificate,
            );
        };

        let sig_structure = match parsed.sig_structure(None) {
            Ok(bytes) => bytes,
            Err(_) => {
                return VerificationVerdict::rejected_with_content(
                    VerificationError::SignatureInvalid,
                    meta,
                    certificate,
                )
            }
        };

        match verify_signature(alg, &key, &sig_structure, &parsed.signature) {
            Ok(()) => {
                debug!(issuer = meta.issuer.as_deref().unwrap_or("?"), "certificate verified");
                VerificationVerdict::ok(meta, certificate)
            }
            Err(_) => VerificationVerdict::rejected_with_content(
                VerificationError::SignatureInvalid,
                meta,
                certificate,
            ),
        }
    }

    /// Evaluate country business rules for an already-verified certificate.
    ///
    /// Fail-closed: when either bundle cannot be loaded, a single synthetic
    /// `Failed` result is returned. An engine result set that comes back
    /// empty becomes a single synthetic `Passed` result.
    pub async fn evaluate_rules(
        &self,
        certificate: &EuHealthCert,
        issued_at: i64,
        expires_at: i64,
        country: &str,
    ) -> Vec<RuleResult> {
        let rules = match self.rules.load().await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(error = %e, "business rules unavailable, failing closed");
                return vec![RuleResult::fail_closed()];
            }
        };
        let value_sets = match self.value_sets.load().await {
            Ok(sets) => sets,
            Err(e) => {
                tracing::warn!(error = %e, "value sets unavailable, failing closed");
                return vec![RuleResult::fail_closed()];
            }
        };

        let certificate_json = certificate.to_json();

        let filter = RuleFilter {
            country: country.to_string(),
            certification_type: certificate.certification_type(),
        };
        let external = ExternalParameters {
            validation_clock: self.clock.now(),
            issued_at,
            expires_at,
            value_sets: value_sets.flatten(),
        };

        let results = self
            .engine
            .evaluate(&rules.rules, &filter, &external, &certificate_json);

        if results.is_empty() {
            vec![RuleResult::default_pass()]
        } else {
            results
        }
    }

    /// Explicitly refresh the trust list.
    pub async fn update_trust_list(&self) -> Result<(), VerificationError> {
        self.trust.update().await
    }
}
