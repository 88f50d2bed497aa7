// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The signed catalog of authorized issuer keys.
//!
//! Wire schema (CBOR, integer keys):
//!
//! ```text
//! trust-list = {1: valid-from, 2: valid-until, 3: [entry, ...]}
//! entry      = {1: kid bstr, 2: not-before, 3: not-after,
//!               4: usage-mask uint, 5: key material bstr (DER cert or SPKI)}
//! ```
//!
//! Usage-mask bits: 1 = vaccination, 2 = test, 4 = recovery.

use hcert_common::cbor::decode_map_bytes;
use hcert_common::{CborMapExt, CborValue};

use crate::certificate::CertificationType;
use crate::store::SignedPayload;

/// Which certificate types an issuer key may attest to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsageMask(u8);

impl KeyUsageMask {
    pub const VACCINATION: u8 = 0b001;
    pub const TEST: u8 = 0b010;
    pub const RECOVERY: u8 = 0b100;
    const ALL_BITS: u8 = 0b111;

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn allows(self, certification_type: CertificationType) -> bool {
        let bit = match certification_type {
            CertificationType::Vaccination => Self::VACCINATION,
            CertificationType::Test => Self::TEST,
            CertificationType::Recovery => Self::RECOVERY,
        };
        self.0 & bit != 0
    }
}

#[derive(Debug, Clone)]
pub struct TrustEntry {
    pub key_id: Vec<u8>,
    pub not_before: i64,
    pub not_after: i64,
    pub usage: KeyUsageMask,
    /// DER certificate or SPKI; parsed lazily at lookup so one bad entry
    /// cannot poison the list.
    pub public_key_der: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TrustList {
    pub valid_from: i64,
    pub valid_until: i64,
    /// Document order matters: the first in-window, type-compatible entry
    /// wins a lookup.
    pub entries: Vec<TrustEntry>,
}

impl TrustList {
    pub fn is_fresh(&self, now: i64) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    /// Decode the CBOR payload of a trust-list bundle.
    pub fn decode(payload: &[u8]) -> Result<Self, String> {
        let map = decode_map_bytes(payload).map_err(|e| format!("trust list: {e}"))?;

        let valid_from = map
            .int_key(1)
            .and_then(CborValue::as_i64)
            .ok_or_else(|| "trust list: missing valid-from (1)".to_string())?;
        let valid_until = map
            .int_key(2)
            .and_then(CborValue::as_i64)
            .ok_or_else(|| "trust list: missing valid-until (2)".to_string())?;

        if valid_from > valid_until {
            return Err("trust list: valid-from is after valid-until".to_string());
        }

        let raw_entries = map
            .int_key(3)
            .and_then(CborValue::as_array)
            .ok_or_else(|| "trust list: missing entries (3)".to_string())?;

        let mut entries = Vec::with_capacity(raw_entries.len());
        for (i, value) in raw_entries.iter().enumerate() {
            entries.push(
                TrustEntry::from_cbor(value).map_err(|e| format!("trust list entry {i}: {e}"))?,
            );
        }

        Ok(Self {
            valid_from,
            valid_until,
            entries,
        })
    }
}

impl SignedPayload for TrustList {
    const STORAGE_FILE: &'static str = "trust-list.bin";
    const KIND: &'static str = "trust-list";

    fn decode(payload: &[u8]) -> Result<Self, String> {
        TrustList::decode(payload)
    }

    fn valid_from(&self) -> i64 {
        self.valid_from
    }

    fn valid_until(&self) -> i64 {
        self.valid_until
    }
}

impl TrustEntry {
    fn from_cbor(value: &CborValue) -> Result<Self, String> {
        let map = value
            .as_map()
            .ok_or_else(|| "entry is not a CBOR map".to_string())?;

        let key_id = map
            .int_key(1)
            .and_then(CborValue::as_bytes)
            .ok_or_else(|| "missing key-id (1)".to_string())?
            .to_vec();
        let not_before = map
            .int_key(2)
            .and_then(CborValue::as_i64)
            .ok_or_else(|| "missing not-before (2)".to_string())?;
        let not_after = map
            .int_key(3)
            .and_then(CborValue::as_i64)
            .ok_or_else(|| "missing not-after (3)".to_string())?;
        let usage_bits = map
            .int_key(4)
            .and_then(CborValue::as_i64)
            .ok_or_else(|| "missing usage mask (4)".to_string())?;
        let public_key_der = map
            .int_key(5)
            .and_then(CborValue::as_bytes)
            .ok_or_else(|| "missing key material (5)".to_string())?
            .to_vec();

        if not_before > not_after {
            return Err("not-before is after not-after".to_string());
        }

        Ok(Self {
            key_id,
            not_before,
            not_after,
            usage: KeyUsageMask::from_bits(usage_bits as u8),
            public_key_der,
        })
    }
}
