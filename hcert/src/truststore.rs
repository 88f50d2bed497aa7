// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Issuer key lookup against the signed trust list.

use std::sync::Arc;

use hcert_validation::IssuerPublicKey;
use tracing::{debug, warn};

use crate::certificate::CertificationType;
use crate::clock::Clock;
use crate::config::{StoreEndpoints, UnavailableTrustListPolicy};
use crate::error::VerificationError;
use crate::fetch::HttpFetcher;
use crate::storage::ProtectedStorage;
use crate::store::SignedStore;
use crate::trustlist::TrustList;

/// Key-ids are routinely truncated to 8 bytes by issuers; lookups compare on
/// the truncated form.
const KID_COMPARE_LEN: usize = 8;

pub struct TrustStore {
    store: SignedStore<TrustList>,
    policy: UnavailableTrustListPolicy,
}

impl TrustStore {
    pub fn new(
        endpoints: StoreEndpoints,
        fetcher: Arc<dyn HttpFetcher>,
        storage: Arc<dyn ProtectedStorage>,
        clock: Arc<dyn Clock>,
        policy: UnavailableTrustListPolicy,
    ) -> Self {
        Self {
            store: SignedStore::new(endpoints, fetcher, storage, clock),
            policy,
        }
    }

    /// Explicitly refresh the trust list. Concurrent callers coalesce onto a
    /// single in-flight refresh.
    pub async fn update(&self) -> Result<(), VerificationError> {
        self.store
            .update()
            .await
            .map_err(VerificationError::TrustServiceError)
    }

    /// Resolve the issuer key for `(key-id, certificate type)`.
    ///
    /// A stale cache triggers one refresh attempt first. When the refresh
    /// fails, the lookup still runs against whatever is cached; with nothing
    /// cached the configured policy decides between an empty-list lookup
    /// (reporting `KEY_NOT_IN_TRUST_LIST`) and `TRUST_SERVICE_ERROR`.
    pub async fn key_for(
        &self,
        key_id: &[u8],
        certification_type: CertificationType,
    ) -> Result<IssuerPublicKey, VerificationError> {
        let list = match self.store.load().await {
            Ok(list) => list,
            Err(cause) => {
                warn!(error = %cause, "no trust list available for lookup");
                return match self.policy {
                    UnavailableTrustListPolicy::LookupAgainstCached => {
                        Err(VerificationError::KeyNotInTrustList)
                    }
                    UnavailableTrustListPolicy::ReportTrustServiceError => {
                        Err(VerificationError::TrustServiceError(cause))
                    }
                };
            }
        };

        let now = self.store.clock().now();
        let mut saw_id_match = false;
        let mut saw_in_window = false;

        for entry in &list.entries {
            if !kid_matches(&entry.key_id, key_id) {
                continue;
            }
            saw_id_match = true;

            if now < entry.not_before || now > entry.not_after {
                continue;
            }
            saw_in_window = true;

            if !entry.usage.allows(certification_type) {
                continue;
            }

            // First in-window, type-compatible entry in document order wins.
            debug!(
                kid = %hex::encode(key_id),
                certification_type = certification_type.as_str(),
                "resolved issuer key"
            );
            return IssuerPublicKey::from_der(&entry.public_key_der)
                .map_err(VerificationError::KeyCreationError);
        }

        if saw_in_window {
            Err(VerificationError::UnsuitablePublicKeyType)
        } else if saw_id_match {
            Err(VerificationError::PublicKeyExpired)
        } else {
            Err(VerificationError::KeyNotInTrustList)
        }
    }
}

fn kid_matches(entry_kid: &[u8], cose_kid: &[u8]) -> bool {
    let a = &entry_kid[..entry_kid.len().min(KID_COMPARE_LEN)];
    let b = &cose_kid[..cose_kid.len().min(KID_COMPARE_LEN)];
    a == b
}
