// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The typed EU health certificate and its projection from CBOR.
//!
//! The EHN schema keys are terse two-letter names (`nam`, `dob`, `tg`, ...).
//! The structs keep readable field names; [`EuHealthCert::to_json`] projects
//! back to the schema names, producing the exact JSON document the CertLogic
//! rules address.

use hcert_common::{CborMapExt, CborValue};
use serde_json::{Map, Value};

/// The kind of attestation a certificate carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificationType {
    Vaccination,
    Test,
    Recovery,
}

impl CertificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            CertificationType::Vaccination => "vaccination",
            CertificationType::Test => "test",
            CertificationType::Recovery => "recovery",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName {
    pub family_name: Option<String>,
    pub family_name_transliterated: Option<String>,
    pub given_name: Option<String>,
    pub given_name_transliterated: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaccinationEntry {
    pub target_disease: Option<String>,
    pub prophylaxis: Option<String>,
    pub medicinal_product: Option<String>,
    pub manufacturer: Option<String>,
    pub dose_number: Option<i64>,
    pub series_doses: Option<i64>,
    pub date_of_vaccination: Option<String>,
    pub country: Option<String>,
    pub issuer: Option<String>,
    pub certificate_identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestEntry {
    pub target_disease: Option<String>,
    pub test_type: Option<String>,
    pub test_name: Option<String>,
    pub test_device: Option<String>,
    pub sample_collected_at: Option<String>,
    pub result: Option<String>,
    pub testing_centre: Option<String>,
    pub country: Option<String>,
    pub issuer: Option<String>,
    pub certificate_identifier: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryEntry {
    pub target_disease: Option<String>,
    pub first_positive_result: Option<String>,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub country: Option<String>,
    pub issuer: Option<String>,
    pub certificate_identifier: Option<String>,
}

/// Exactly one of the three entry groups, enforced at the type level.
#[derive(Debug, Clone, PartialEq)]
pub enum CertificateContent {
    Vaccination(Vec<VaccinationEntry>),
    Test(Vec<TestEntry>),
    Recovery(Vec<RecoveryEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EuHealthCert {
    pub version: String,
    pub name: PersonName,
    pub date_of_birth: String,
    pub content: CertificateContent,
}

impl EuHealthCert {
    pub fn certification_type(&self) -> CertificationType {
        match self.content {
            CertificateContent::Vaccination(_) => CertificationType::Vaccination,
            CertificateContent::Test(_) => CertificationType::Test,
            CertificateContent::Recovery(_) => CertificationType::Recovery,
        }
    }

    /// Project to the EHN JSON shape
    /// (`{"ver": ..., "nam": {...}, "dob": ..., "v" | "t" | "r": [...]}`).
    ///
    /// Built by hand rather than through a serializer: none of the fields can
    /// fail to convert, so the projection is infallible.
    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("ver".to_string(), Value::String(self.version.clone()));
        doc.insert("nam".to_string(), self.name.to_json());
        doc.insert("dob".to_string(), Value::String(self.date_of_birth.clone()));

        let (group, entries) = match &self.content {
            CertificateContent::Vaccination(entries) => {
                ("v", entries.iter().map(VaccinationEntry::to_json).collect())
            }
            CertificateContent::Test(entries) => {
                ("t", entries.iter().map(TestEntry::to_json).collect())
            }
            CertificateContent::Recovery(entries) => {
                ("r", entries.iter().map(RecoveryEntry::to_json).collect())
            }
        };
        doc.insert(group.to_string(), Value::Array(entries));

        Value::Object(doc)
    }

    /// Project the `-260/1` CBOR value into a typed certificate.
    pub fn from_cbor(value: &CborValue) -> Result<Self, String> {
        let map = value
            .as_map()
            .ok_or_else(|| "health certificate is not a CBOR map".to_string())?;

        let version = required_text(map, "ver")?;
        let date_of_birth = required_text(map, "dob")?;
        let name = PersonName::from_cbor(
            map.text_key("nam")
                .ok_or_else(|| "missing name object (nam)".to_string())?,
        )?;

        let v = non_empty_array(map.text_key("v"));
        let t = non_empty_array(map.text_key("t"));
        let r = non_empty_array(map.text_key("r"));

        let content = match (v, t, r) {
            (Some(entries), None, None) => CertificateContent::Vaccination(
                entries
                    .iter()
                    .map(VaccinationEntry::from_cbor)
                    .collect::<Result<_, _>>()?,
            ),
            (None, Some(entries), None) => CertificateContent::Test(
                entries
                    .iter()
                    .map(TestEntry::from_cbor)
                    .collect::<Result<_, _>>()?,
            ),
            (None, None, Some(entries)) => CertificateContent::Recovery(
                entries
                    .iter()
                    .map(RecoveryEntry::from_cbor)
                    .collect::<Result<_, _>>()?,
            ),
            (None, None, None) => {
                return Err("certificate has none of v/t/r".to_string());
            }
            _ => {
                return Err("certificate has more than one of v/t/r".to_string());
            }
        };

        Ok(Self {
            version,
            name,
            date_of_birth,
            content,
        })
    }
}

impl PersonName {
    fn from_cbor(value: &CborValue) -> Result<Self, String> {
        let map = value
            .as_map()
            .ok_or_else(|| "name (nam) is not a CBOR map".to_string())?;

        let name = Self {
            family_name: optional_text(map, "fn"),
            family_name_transliterated: optional_text(map, "fnt"),
            given_name: optional_text(map, "gn"),
            given_name_transliterated: optional_text(map, "gnt"),
        };

        if name.family_name.is_none() && name.family_name_transliterated.is_none() {
            return Err("name has neither fn nor fnt".to_string());
        }
        if name.given_name.is_none() && name.given_name_transliterated.is_none() {
            return Err("name has neither gn nor gnt".to_string());
        }

        Ok(name)
    }

    fn to_json(&self) -> Value {
        let mut doc = Map::new();
        put_text(&mut doc, "fn", &self.family_name);
        put_text(&mut doc, "fnt", &self.family_name_transliterated);
        put_text(&mut doc, "gn", &self.given_name);
        put_text(&mut doc, "gnt", &self.given_name_transliterated);
        Value::Object(doc)
    }
}

impl VaccinationEntry {
    fn from_cbor(value: &CborValue) -> Result<Self, String> {
        let map = value
            .as_map()
            .ok_or_else(|| "vaccination entry is not a CBOR map".to_string())?;
        Ok(Self {
            target_disease: optional_text(map, "tg"),
            prophylaxis: optional_text(map, "vp"),
            medicinal_product: optional_text(map, "mp"),
            manufacturer: optional_text(map, "ma"),
            dose_number: map.text_key("dn").and_then(CborValue::as_i64),
            series_doses: map.text_key("sd").and_then(CborValue::as_i64),
            date_of_vaccination: optional_text(map, "dt"),
            country: optional_text(map, "co"),
            issuer: optional_text(map, "is"),
            certificate_identifier: optional_text(map, "ci"),
        })
    }

    fn to_json(&self) -> Value {
        let mut doc = Map::new();
        put_text(&mut doc, "tg", &self.target_disease);
        put_text(&mut doc, "vp", &self.prophylaxis);
        put_text(&mut doc, "mp", &self.medicinal_product);
        put_text(&mut doc, "ma", &self.manufacturer);
        put_int(&mut doc, "dn", self.dose_number);
        put_int(&mut doc, "sd", self.series_doses);
        put_text(&mut doc, "dt", &self.date_of_vaccination);
        put_text(&mut doc, "co", &self.country);
        put_text(&mut doc, "is", &self.issuer);
        put_text(&mut doc, "ci", &self.certificate_identifier);
        Value::Object(doc)
    }
}

impl TestEntry {
    fn from_cbor(value: &CborValue) -> Result<Self, String> {
        let map = value
            .as_map()
            .ok_or_else(|| "test entry is not a CBOR map".to_string())?;
        Ok(Self {
            target_disease: optional_text(map, "tg"),
            test_type: optional_text(map, "tt"),
            test_name: optional_text(map, "nm"),
            test_device: optional_text(map, "ma"),
            sample_collected_at: optional_text(map, "sc"),
            result: optional_text(map, "tr"),
            testing_centre: optional_text(map, "tc"),
            country: optional_text(map, "co"),
            issuer: optional_text(map, "is"),
            certificate_identifier: optional_text(map, "ci"),
        })
    }

    fn to_json(&self) -> Value {
        let mut doc = Map::new();
        put_text(&mut doc, "tg", &self.target_disease);
        put_text(&mut doc, "tt", &self.test_type);
        put_text(&mut doc, "nm", &self.test_name);
        put_text(&mut doc, "ma", &self.test_device);
        put_text(&mut doc, "sc", &self.sample_collected_at);
        put_text(&mut doc, "tr", &self.result);
        put_text(&mut doc, "tc", &self.testing_centre);
        put_text(&mut doc, "co", &self.country);
        put_text(&mut doc, "is", &self.issuer);
        put_text(&mut doc, "ci", &self.certificate_identifier);
        Value::Object(doc)
    }
}

impl RecoveryEntry {
    fn from_cbor(value: &CborValue) -> Result<Self, String> {
        let map = value
            .as_map()
            .ok_or_else(|| "recovery entry is not a CBOR map".to_string())?;
        Ok(Self {
            target_disease: optional_text(map, "tg"),
            first_positive_result: optional_text(map, "fr"),
            valid_from: optional_text(map, "df"),
            valid_until: optional_text(map, "du"),
            country: optional_text(map, "co"),
            issuer: optional_text(map, "is"),
            certificate_identifier: optional_text(map, "ci"),
        })
    }

    fn to_json(&self) -> Value {
        let mut doc = Map::new();
        put_text(&mut doc, "tg", &self.target_disease);
        put_text(&mut doc, "fr", &self.first_positive_result);
        put_text(&mut doc, "df", &self.valid_from);
        put_text(&mut doc, "du", &self.valid_until);
        put_text(&mut doc, "co", &self.country);
        put_text(&mut doc, "is", &self.issuer);
        put_text(&mut doc, "ci", &self.certificate_identifier);
        Value::Object(doc)
    }
}

fn put_text(doc: &mut Map<String, Value>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        doc.insert(key.to_string(), Value::String(value.clone()));
    }
}

fn put_int(doc: &mut Map<String, Value>, key: &str, value: Option<i64>) {
    if let Some(value) = value {
        doc.insert(key.to_string(), Value::from(value));
    }
}

fn required_text(map: &hcert_common::CborMap, key: &str) -> Result<String, String> {
    map.text_key(key)
        .and_then(CborValue::as_text)
        .map(str::to_string)
        .ok_or_else(|| format!("missing required text field {key}"))
}

fn optional_text(map: &hcert_common::CborMap, key: &str) -> Option<String> {
    map.text_key(key)
        .and_then(CborValue::as_text)
        .map(str::to_string)
}

fn non_empty_array(value: Option<&CborValue>) -> Option<&[CborValue]> {
    value.and_then(CborValue::as_array).filter(|a| !a.is_empty())
}
