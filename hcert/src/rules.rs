// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Business-rules and value-sets bundles, and the engine seam.
//!
//! The CertLogic engine itself is a pre-existing external component; the core
//! only loads its inputs (rules, value sets), shapes the parameter records and
//! hands over the certificate serialized to the EHN JSON form.
//!
//! Bundle payloads are CBOR with text keys, mirroring the JSON the backends
//! publish:
//!
//! ```text
//! rules      = {"validFrom": int, "validUntil": int, "rules": [rule, ...]}
//! rule       = {"identifier": tstr, ?"country": tstr, ?"version": tstr,
//!               "logic": tstr}          ; JSON-Logic document as JSON text
//! value-sets = {"validFrom": int, "validUntil": int,
//!               "sets": {name: {"validFrom": int, "validUntil": int,
//!                               "values": {id: display}}}}
//! ```

use std::collections::{BTreeMap, HashMap};

use hcert_common::cbor::decode_map_bytes;
use hcert_common::{CborKey, CborMapExt, CborValue};

use crate::certificate::CertificationType;
use crate::store::SignedPayload;

#[derive(Debug, Clone)]
pub struct BusinessRule {
    pub identifier: String,
    pub country: Option<String>,
    pub version: Option<String>,
    /// The JSON-Logic document the engine evaluates.
    pub logic: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct BusinessRules {
    pub valid_from: i64,
    pub valid_until: i64,
    pub rules: Vec<BusinessRule>,
}

#[derive(Debug, Clone)]
pub struct ValueSet {
    pub valid_from: i64,
    pub valid_until: i64,
    /// id -> display name.
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ValueSets {
    pub valid_from: i64,
    pub valid_until: i64,
    pub sets: BTreeMap<String, ValueSet>,
}

impl ValueSets {
    /// Flatten to the engine's external-parameter shape: set name -> ids.
    pub fn flatten(&self) -> HashMap<String, Vec<String>> {
        self.sets
            .iter()
            .map(|(name, set)| (name.clone(), set.values.keys().cloned().collect()))
            .collect()
    }
}

impl SignedPayload for BusinessRules {
    const STORAGE_FILE: &'static str = "business-rules.bin";
    const KIND: &'static str = "business-rules";

    fn decode(payload: &[u8]) -> Result<Self, String> {
        let map = decode_map_bytes(payload).map_err(|e| format!("business rules: {e}"))?;

        let (valid_from, valid_until) = bundle_window(&map, "business rules")?;

        let raw_rules = map
            .text_key("rules")
            .and_then(CborValue::as_array)
            .ok_or_else(|| "business rules: missing rules array".to_string())?;

        let mut rules = Vec::with_capacity(raw_rules.len());
        for (i, value) in raw_rules.iter().enumerate() {
            rules.push(BusinessRule::from_cbor(value).map_err(|e| format!("rule {i}: {e}"))?);
        }

        Ok(Self {
            valid_from,
            valid_until,
            rules,
        })
    }

    fn valid_from(&self) -> i64 {
        self.valid_from
    }

    fn valid_until(&self) -> i64 {
        self.valid_until
    }
}

impl BusinessRule {
    fn from_cbor(value: &CborValue) -> Result<Self, String> {
        let map = value
            .as_map()
            .ok_or_else(|| "rule is not a CBOR map".to_string())?;

        let identifier = map
            .text_key("identifier")
            .and_then(CborValue::as_text)
            .ok_or_else(|| "missing identifier".to_string())?
            .to_string();

        let logic_text = map
            .text_key("logic")
            .and_then(CborValue::as_text)
            .ok_or_else(|| "missing logic".to_string())?;
        let logic = serde_json::from_str(logic_text)
            .map_err(|e| format!("logic is not valid JSON: {e}"))?;

        Ok(Self {
            identifier,
            country: map
                .text_key("country")
                .and_then(CborValue::as_text)
                .map(str::to_string),
            version: map
                .text_key("version")
                .and_then(CborValue::as_text)
                .map(str::to_string),
            logic,
        })
    }
}

impl SignedPayload for ValueSets {
    const STORAGE_FILE: &'static str = "value-sets.bin";
    const KIND: &'static str = "value-sets";

    fn decode(payload: &[u8]) -> Result<Self, String> {
        let map = decode_map_bytes(payload).map_err(|e| format!("value sets: {e}"))?;

        let (valid_from, valid_until) = bundle_window(&map, "value sets")?;

        let raw_sets = map
            .text_key("sets")
            .and_then(CborValue::as_map)
            .ok_or_else(|| "value sets: missing sets map".to_string())?;

        let mut sets = BTreeMap::new();
        for (key, value) in raw_sets {
            let CborKey::Text(name) = key else {
                return Err("value set name is not text".to_string());
            };
            sets.insert(
                name.clone(),
                ValueSet::from_cbor(value).map_err(|e| format!("value set {name}: {e}"))?,
            );
        }

        Ok(Self {
            valid_from,
            valid_until,
            sets,
        })
    }

    fn valid_from(&self) -> i64 {
        self.valid_from
    }

    fn valid_until(&self) -> i64 {
        self.valid_until
    }
}

impl ValueSet {
    fn from_cbor(value: &CborValue) -> Result<Self, String> {
        let map = value
            .as_map()
            .ok_or_else(|| "value set is not a CBOR map".to_string())?;

        let (valid_from, valid_until) = bundle_window(map, "value set")?;

        let raw_values = map
            .text_key("values")
            .and_then(CborValue::as_map)
            .ok_or_else(|| "missing values map".to_string())?;

        let mut values = BTreeMap::new();
        for (key, value) in raw_values {
            let CborKey::Text(id) = key else {
                return Err("value id is not text".to_string());
            };
            let display = value
                .as_text()
                .ok_or_else(|| format!("value {id} is not text"))?;
            values.insert(id.clone(), display.to_string());
        }

        Ok(Self {
            valid_from,
            valid_until,
            values,
        })
    }
}

fn bundle_window(map: &hcert_common::CborMap, what: &str) -> Result<(i64, i64), String> {
    let valid_from = map
        .text_key("validFrom")
        .and_then(CborValue::as_i64)
        .ok_or_else(|| format!("{what}: missing validFrom"))?;
    let valid_until = map
        .text_key("validUntil")
        .and_then(CborValue::as_i64)
        .ok_or_else(|| format!("{what}: missing validUntil"))?;
    if valid_from > valid_until {
        return Err(format!("{what}: validFrom is after validUntil"));
    }
    Ok((valid_from, valid_until))
}

/// Country/type scope the engine filters rules on.
#[derive(Debug, Clone)]
pub struct RuleFilter {
    pub country: String,
    pub certification_type: CertificationType,
}

/// Out-of-certificate inputs the engine evaluates against.
#[derive(Debug, Clone)]
pub struct ExternalParameters {
    pub validation_clock: i64,
    pub issued_at: i64,
    pub expires_at: i64,
    /// Flattened value sets: set name -> member ids.
    pub value_sets: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    Passed,
    Failed,
    /// The rule could not be decided from the available data.
    Open,
}

#[derive(Debug, Clone)]
pub struct RuleResult {
    /// Identifier of the rule that produced this result; `None` for the
    /// synthetic results the orchestration emits itself.
    pub identifier: Option<String>,
    pub outcome: RuleOutcome,
}

impl RuleResult {
    /// Synthetic pass when the engine returns no applicable rule.
    pub fn default_pass() -> Self {
        Self {
            identifier: None,
            outcome: RuleOutcome::Passed,
        }
    }

    /// Synthetic failure when rule inputs could not be loaded: an offline
    /// device without rules must not silently pass.
    pub fn fail_closed() -> Self {
        Self {
            identifier: None,
            outcome: RuleOutcome::Failed,
        }
    }
}

/// The external CertLogic engine, injected at construction time.
pub trait BusinessRulesEngine: Send + Sync {
    fn evaluate(
        &self,
        rules: &[BusinessRule],
        filter: &RuleFilter,
        external: &ExternalParameters,
        certificate: &serde_json::Value,
    ) -> Vec<RuleResult>;
}
