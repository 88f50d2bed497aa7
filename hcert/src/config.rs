// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Configuration for the verification core.

use std::path::PathBuf;
use std::time::Duration;

/// Trust anchor compiled in as the default for all three stores.
///
/// A self-signed P-256 certificate whose key signs the development trust-list,
/// business-rules and value-sets bundles. Operators override this per store
/// with the certificate of their national backend.
pub const DEFAULT_TRUST_ANCHOR_B64: &str = "\
MIICADCCAaegAwIBAgIUP+o0ThvHPAvf0hw2fAZWj2LR9JEwCgYIKoZIzj0EAwIw\
VjELMAkGA1UEBhMCQVQxJjAkBgNVBAoMHURpZ2l0YWwgR3JlZW4gQ2VydGlmaWNh\
dGUgRGV2MR8wHQYDVQQDDBZUcnVzdExpc3QgQW5jaG9yIChEZXYpMB4XDTI2MDgw\
MjAxMzYzNloXDTM2MDczMDAxMzYzNlowVjELMAkGA1UEBhMCQVQxJjAkBgNVBAoM\
HURpZ2l0YWwgR3JlZW4gQ2VydGlmaWNhdGUgRGV2MR8wHQYDVQQDDBZUcnVzdExp\
c3QgQW5jaG9yIChEZXYpMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEi/Zju4Zf\
iG1tP9HJfVmP0EuclqiTDjbkz1fZWMBtkJqfBdwCuCBYcI6oUEjXaZs9+9D/00aO\
RrOZTdu6MhR/ZaNTMFEwHQYDVR0OBBYEFDhJA8rqroWXWAnUsnGnAqaDAlh8MB8G\
A1UdIwQYMBaAFDhJA8rqroWXWAnUsnGnAqaDAlh8MA8GA1UdEwEB/wQFMAMBAf8w\
CgYIKoZIzj0EAwIDRwAwRAIgBTz87KKD1BRlOSwvcRQYzAD3sCPb8E19x8dKJVq8\
FMQCIE8uaiawXaoyifTgprdxrcWda4BRnd3XPzboxV8EmVNv";

/// Endpoint triple for one signed-bundle store.
#[derive(Debug, Clone)]
pub struct StoreEndpoints {
    /// URL of the bundle content.
    pub url: String,
    /// URL of the companion signature object.
    pub signature_url: String,
    /// Base64 DER certificate (or SPKI) of the anchor that signs the bundle.
    pub anchor: String,
}

/// Policy for trust lookups when a refresh failed and nothing usable is
/// cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableTrustListPolicy {
    /// Run the lookup against whatever is cached (possibly nothing); a
    /// missing key then reports `KEY_NOT_IN_TRUST_LIST`.
    LookupAgainstCached,
    /// Report `TRUST_SERVICE_ERROR` instead of a lookup miss.
    ReportTrustServiceError,
}

/// Construction-time options. Every field has a documented default.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub trust_list: StoreEndpoints,
    pub business_rules: StoreEndpoints,
    pub value_sets: StoreEndpoints,

    /// HTTP timeout for bundle fetches.
    pub http_timeout: Duration,

    /// Directory holding the three protected store files.
    pub storage_dir: PathBuf,

    /// Per-install keystore alias the storage key is derived from.
    pub storage_alias: String,

    /// If true, `is_valid` also requires `now >= issued-at`.
    pub enforce_issued_at: bool,

    pub unavailable_trust_list_policy: UnavailableTrustListPolicy,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            trust_list: StoreEndpoints {
                url: "https://dgc-trust.qr.gv.at/trustlist".into(),
                signature_url: "https://dgc-trust.qr.gv.at/trustlistsig".into(),
                anchor: DEFAULT_TRUST_ANCHOR_B64.into(),
            },
            business_rules: StoreEndpoints {
                url: "https://dgc-trust.qr.gv.at/rules".into(),
                signature_url: "https://dgc-trust.qr.gv.at/rulessig".into(),
                anchor: DEFAULT_TRUST_ANCHOR_B64.into(),
            },
            value_sets: StoreEndpoints {
                url: "https://dgc-trust.qr.gv.at/valuesets".into(),
                signature_url: "https://dgc-trust.qr.gv.at/valuesetssig".into(),
                anchor: DEFAULT_TRUST_ANCHOR_B64.into(),
            },
            http_timeout: Duration::from_secs(30),
            storage_dir: PathBuf::from("hcert-data"),
            storage_alias: "hcert_store_key".into(),
            enforce_issued_at: true,
            unavailable_trust_list_policy: UnavailableTrustListPolicy::LookupAgainstCached,
        }
    }
}
