// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! EU Digital Green Certificate verification.
//!
//! Given the textual payload of a certificate QR code, this crate decides
//! whether the certificate is structurally well-formed, cryptographically
//! authentic against a signed trust list, temporally valid, and (via an
//! injected CertLogic engine) compliant with country business rules.
//!
//! The entry point is [`CertificateVerifier`]:
//!
//! ```no_run
//! use std::sync::Arc;
//! use hcert::{CertificateVerifier, VerifierConfig};
//! # use hcert::rules::{BusinessRulesEngine, BusinessRule, RuleFilter, ExternalParameters, RuleResult};
//! # struct Engine;
//! # impl BusinessRulesEngine for Engine {
//! #     fn evaluate(&self, _: &[BusinessRule], _: &RuleFilter, _: &ExternalParameters,
//! #                 _: &serde_json::Value) -> Vec<RuleResult> { Vec::new() }
//! # }
//!
//! # async fn run() {
//! let verifier = CertificateVerifier::new(VerifierConfig::default(), Arc::new(Engine)).unwrap();
//! let verdict = verifier.verify("HC1:NCFOXN...").await;
//! if verdict.valid {
//!     println!("{:?}", verdict.certificate);
//! }
//! # }
//! ```
//!
//! Verification is layered: prefix strip, Base45, gzip, COSE_Sign1, CWT,
//! temporal check, trust lookup, signature check. The trust list, business
//! rules and value sets are COSE-signed bundles fetched over HTTP, verified
//! against compiled-in anchors, cached process-wide and persisted encrypted.

pub mod certificate;
pub mod clock;
pub mod config;
pub mod cwt;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod rules;
pub mod storage;
pub mod store;
pub mod truststore;
pub mod trustlist;
pub mod verdict;

pub use certificate::{CertificateContent, CertificationType, EuHealthCert, PersonName};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    StoreEndpoints, UnavailableTrustListPolicy, VerifierConfig, DEFAULT_TRUST_ANCHOR_B64,
};
pub use cwt::Cwt;
pub use error::VerificationError;
pub use pipeline::CertificateVerifier;
pub use truststore::TrustStore;
pub use trustlist::{KeyUsageMask, TrustEntry, TrustList};
pub use verdict::{VerificationMeta, VerificationVerdict};
