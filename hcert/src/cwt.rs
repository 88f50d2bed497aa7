// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! CBOR Web Token parsing and temporal validation.
//!
//! The COSE payload is a CWT map with integer keys: 1 = issuer,
//! 4 = expiration, 6 = issued-at, -260 = a container map whose key 1 holds
//! the health certificate. Unknown keys are ignored.

use hcert_common::cbor::decode_map;
use hcert_common::{CborMapExt, CborValue};
use minicbor::data::Type;
use minicbor::Decoder;

use crate::certificate::EuHealthCert;
use crate::error::VerificationError;

const CLAIM_ISSUER: i64 = 1;
const CLAIM_EXPIRES_AT: i64 = 4;
const CLAIM_ISSUED_AT: i64 = 6;
const CLAIM_HCERT_CONTAINER: i64 = -260;

#[derive(Debug, Clone)]
pub struct Cwt {
    pub issuer: Option<String>,
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub certificate: EuHealthCert,
}

impl Cwt {
    /// Parse COSE payload bytes into a CWT.
    ///
    /// Some issuers wrap the claim map in one more bstr; a single unwrap is
    /// applied when the payload decodes to a byte string.
    pub fn parse(payload: &[u8]) -> Result<Self, String> {
        let mut dec = Decoder::new(payload);

        let map = match dec.datatype().map_err(|e| e.to_string())? {
            Type::Bytes => {
                let inner = dec
                    .bytes()
                    .map_err(|e| format!("failed to read wrapped claim bytes: {e}"))?;
                let mut inner_dec = Decoder::new(inner);
                decode_map(&mut inner_dec)?
            }
            Type::Map => decode_map(&mut dec)?,
            other => return Err(format!("CWT payload is not a CBOR map: {other:?}")),
        };

        let issuer = map
            .int_key(CLAIM_ISSUER)
            .and_then(CborValue::as_text)
            .map(str::to_string);
        let expires_at = map.int_key(CLAIM_EXPIRES_AT).and_then(CborValue::as_i64);
        let issued_at = map.int_key(CLAIM_ISSUED_AT).and_then(CborValue::as_i64);

        let container = map
            .int_key(CLAIM_HCERT_CONTAINER)
            .and_then(CborValue::as_map)
            .ok_or_else(|| "missing health certificate container (-260)".to_string())?;

        let cert_value = container
            .int_key(1)
            .ok_or_else(|| "missing health certificate at -260/1".to_string())?;

        let certificate = EuHealthCert::from_cbor(cert_value)?;

        Ok(Self {
            issuer,
            issued_at,
            expires_at,
            certificate,
        })
    }

    /// Temporal validity: `issued-at <= now <= expires-at`.
    ///
    /// A missing expiration is a failure; a missing issued-at is treated as 0.
    /// The issued-at bound is only enforced when `enforce_issued_at` is set.
    pub fn is_valid(&self, now: i64, enforce_issued_at: bool) -> Result<(), VerificationError> {
        let expires_at = self.expires_at.ok_or(VerificationError::CwtExpired)?;
        if now > expires_at {
            return Err(VerificationError::CwtExpired);
        }

        if enforce_issued_at && now < self.issued_at.unwrap_or(0) {
            return Err(VerificationError::CwtExpired);
        }

        Ok(())
    }
}
