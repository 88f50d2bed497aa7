// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The terminal result of a verification request.

use crate::certificate::EuHealthCert;
use crate::error::VerificationError;

/// CWT metadata surfaced alongside the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationMeta {
    pub issuer: Option<String>,
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
}

/// A signed-validity verdict.
///
/// Invariant: `valid` iff `error` is `None`, enforced by the constructors.
/// Validity/trust/signature failures still carry the decoded `meta` and
/// `certificate` so callers can display the contents of e.g. an expired
/// certificate; decode-layer failures carry neither.
#[derive(Debug, Clone)]
pub struct VerificationVerdict {
    pub valid: bool,
    pub meta: Option<VerificationMeta>,
    pub certificate: Option<EuHealthCert>,
    pub error: Option<VerificationError>,
}

impl VerificationVerdict {
    pub fn ok(meta: VerificationMeta, certificate: EuHealthCert) -> Self {
        Self {
            valid: true,
            meta: Some(meta),
            certificate: Some(certificate),
            error: None,
        }
    }

    pub fn rejected(error: VerificationError) -> Self {
        Self {
            valid: false,
            meta: None,
            certificate: None,
            error: Some(error),
        }
    }

    pub fn rejected_with_content(
        error: VerificationError,
        meta: VerificationMeta,
        certificate: EuHealthCert,
    ) -> Self {
        debug_assert!(error.surfaces_content());
        Self {
            valid: false,
            meta: Some(meta),
            certificate: Some(certificate),
            error: Some(error),
        }
    }

    /// Wrap an upstream capture failure (`QR_CODE_ERROR`, `USER_CANCELLED`)
    /// into a verdict. The core itself never produces these.
    pub fn from_capture_error(error: VerificationError) -> Self {
        debug_assert!(matches!(
            error,
            VerificationError::QrCodeError(_) | VerificationError::UserCancelled
        ));
        Self::rejected(error)
    }
}
