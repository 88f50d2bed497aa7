// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The verification error taxonomy.
//!
//! Every terminal verdict carries exactly one of these. The core never
//! panics and never propagates an `Err` out of `verify`: failures become
//! verdicts.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The input does not start with the `HC1:` scheme prefix.
    #[error("input does not start with the HC1: scheme prefix")]
    InvalidSchemePrefix,

    #[error("Base45 decoding failed: {0}")]
    Base45DecodingFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("COSE_Sign1 deserialization failed: {0}")]
    CoseDeserializationFailed(String),

    #[error("CWT deserialization failed: {0}")]
    CborDeserializationFailed(String),

    /// The certificate is outside its `[issued-at, expires-at]` window.
    /// Decoded content is still surfaced alongside this error.
    #[error("certificate is outside its validity window")]
    CwtExpired,

    #[error("signing key is not in the trust list")]
    KeyNotInTrustList,

    #[error("signing key is outside its own validity window")]
    PublicKeyExpired,

    /// The key exists and is current, but is not authorized to sign this
    /// certificate type.
    #[error("signing key is not authorized for this certificate type")]
    UnsuitablePublicKeyType,

    #[error("signing key material could not be parsed: {0}")]
    KeyCreationError(String),

    #[error("signature verification failed")]
    SignatureInvalid,

    /// A trust-service refresh failed; carries a free-form cause for logs.
    #[error("trust service error: {0}")]
    TrustServiceError(String),

    /// Produced by the QR capture layer, passed through verbatim.
    #[error("QR capture error: {0}")]
    QrCodeError(String),

    /// Produced by the capture layer when the user aborts, passed through.
    #[error("cancelled by the user")]
    UserCancelled,
}

impl VerificationError {
    /// Stable machine-readable tag for logs and host bindings.
    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::InvalidSchemePrefix => "INVALID_SCHEME_PREFIX",
            VerificationError::Base45DecodingFailed(_) => "BASE_45_DECODING_FAILED",
            VerificationError::DecompressionFailed(_) => "DECOMPRESSION_FAILED",
            VerificationError::CoseDeserializationFailed(_) => "COSE_DESERIALIZATION_FAILED",
            VerificationError::CborDeserializationFailed(_) => "CBOR_DESERIALIZATION_FAILED",
            VerificationError::CwtExpired => "CWT_EXPIRED",
            VerificationError::KeyNotInTrustList => "KEY_NOT_IN_TRUST_LIST",
            VerificationError::PublicKeyExpired => "PUBLIC_KEY_EXPIRED",
            VerificationError::UnsuitablePublicKeyType => "UNSUITABLE_PUBLIC_KEY_TYPE",
            VerificationError::KeyCreationError(_) => "KEY_CREATION_ERROR",
            VerificationError::SignatureInvalid => "SIGNATURE_INVALID",
            VerificationError::TrustServiceError(_) => "TRUST_SERVICE_ERROR",
            VerificationError::QrCodeError(_) => "QR_CODE_ERROR",
            VerificationError::UserCancelled => "USER_CANCELLED",
        }
    }

    /// Whether decoded certificate content is still surfaced alongside this
    /// error (validity/trust/signature failures happen after decoding).
    pub fn surfaces_content(&self) -> bool {
        matches!(
            self,
            VerificationError::CwtExpired
                | VerificationError::KeyNotInTrustList
                | VerificationError::PublicKeyExpired
                | VerificationError::UnsuitablePublicKeyType
                | VerificationError::KeyCreationError(_)
                | VerificationError::SignatureInvalid
                | VerificationError::TrustServiceError(_)
        )
    }
}
