// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Generic fetch/verify/cache/persist store for COSE-signed bundles.
//!
//! The trust list, the business rules and the value sets all ship the same
//! way: a content object and a companion signature object behind two URLs,
//! anchored to a compiled-in certificate. This store implements the shared
//! discipline once:
//!
//! 1. GET content and signature objects (both must succeed).
//! 2. Verify the COSE_Sign1 signature against the anchor key. The signature
//!    object may carry the payload embedded, or sign the content file as a
//!    detached payload.
//! 3. Decode the payload and check its own validity window.
//! 4. Swap the cache atomically and persist the raw fetched bytes encrypted.
//!
//! A failed refresh never touches the previous cache. At most one refresh is
//! in flight at a time; concurrent callers coalesce onto it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use hcert_common::parse_cose_sign1;
use hcert_validation::{verify_signature, CoseAlgorithm, IssuerPublicKey};
use minicbor::data::Type;
use minicbor::{Decoder, Encoder};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::StoreEndpoints;
use crate::fetch::HttpFetcher;
use crate::storage::ProtectedStorage;

/// A bundle payload the store knows how to decode and judge for freshness.
pub trait SignedPayload: Send + Sync + Sized + 'static {
    /// Stable name of the protected file this bundle persists to.
    const STORAGE_FILE: &'static str;

    /// Short kind tag for logs.
    const KIND: &'static str;

    fn decode(payload: &[u8]) -> Result<Self, String>;

    fn valid_from(&self) -> i64;

    fn valid_until(&self) -> i64;

    fn is_fresh(&self, now: i64) -> bool {
        self.valid_from() <= now && now <= self.valid_until()
    }
}

pub struct SignedStore<P: SignedPayload> {
    endpoints: StoreEndpoints,
    fetcher: Arc<dyn HttpFetcher>,
    storage: Arc<dyn ProtectedStorage>,
    clock: Arc<dyn Clock>,

    cache: RwLock<Option<Arc<P>>>,
    disk_checked: AtomicBool,

    /// Guards the fetch/verify/swap sequence; see the coalescing notes on
    /// [`SignedStore::refresh_with`].
    refresh_lock: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

impl<P: SignedPayload> SignedStore<P> {
    pub fn new(
        endpoints: StoreEndpoints,
        fetcher: Arc<dyn HttpFetcher>,
        storage: Arc<dyn ProtectedStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            endpoints,
            fetcher,
            storage,
            clock,
            cache: RwLock::new(None),
            disk_checked: AtomicBool::new(false),
            refresh_lock: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// The cached bundle, if any. Returns an owned handle: a concurrent cache
    /// swap never invalidates what a caller already holds.
    pub fn snapshot(&self) -> Option<Arc<P>> {
        self.cache.read().unwrap().clone()
    }

    /// Best-available bundle: the fresh cache, else one refresh attempt, else
    /// whatever stale bundle is cached. `Err` only when nothing is available
    /// at all.
    pub async fn load(&self) -> Result<Arc<P>, String> {
        self.ensure_disk_loaded().await;

        let now = self.clock.now();
        if let Some(current) = self.snapshot() {
            if current.is_fresh(now) {
                return Ok(current);
            }
        }

        match self.refresh_with(false).await {
            Ok(()) => self
                .snapshot()
                .ok_or_else(|| format!("no {} bundle available after refresh", P::KIND)),
            Err(e) => {
                warn!(kind = P::KIND, error = %e, "refresh failed, falling back to cached bundle");
                self.snapshot().ok_or(e)
            }
        }
    }

    /// Explicit refresh request. Always fetches, even when the cache is still
    /// fresh; concurrent callers coalesce onto an in-flight refresh.
    pub async fn update(&self) -> Result<(), String> {
        self.ensure_disk_loaded().await;
        self.refresh_with(true).await
    }

    async fn refresh_with(&self, force: bool) -> Result<(), String> {
        let generation_before = self.generation.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        // A refresh completed while we waited for the lock: coalesce.
        if self.generation.load(Ordering::Acquire) != generation_before {
            return Ok(());
        }

        if !force {
            if let Some(current) = self.snapshot() {
                if current.is_fresh(self.clock.now()) {
                    return Ok(());
                }
            }
        }

        let content = self.fetch_ok(&self.endpoints.url).await?;
        let signature_object = self.fetch_ok(&self.endpoints.signature_url).await?;

        let payload = self.verify_and_decode(&signature_object, &content)?;

        let now = self.clock.now();
        if !payload.is_fresh(now) {
            return Err(format!("{} bundle is outside its validity window", P::KIND));
        }

        *self.cache.write().unwrap() = Some(Arc::new(payload));
        self.generation.fetch_add(1, Ordering::AcqRel);
        info!(kind = P::KIND, "bundle refreshed");

        if let Err(e) = self
            .storage
            .write(P::STORAGE_FILE, &encode_persisted(&signature_object, &content))
            .await
        {
            // Persistence is best-effort; the in-memory cache is authoritative.
            warn!(kind = P::KIND, error = %e, "failed to persist refreshed bundle");
        }

        Ok(())
    }

    async fn fetch_ok(&self, url: &str) -> Result<Vec<u8>, String> {
        let resp = self
            .fetcher
            .get(url)
            .await
            .map_err(|e| format!("fetching {url}: {e}"))?;
        if !resp.is_success() {
            return Err(format!("fetching {url}: http status {}", resp.status));
        }
        Ok(resp.body)
    }

    /// Verify the bundle signature against the anchor and decode the payload.
    ///
    /// The window check happens at the call sites that need it: a persisted
    /// bundle may legitimately be stale.
    fn verify_and_decode(&self, signature_object: &[u8], content: &[u8]) -> Result<P, String> {
        let anchor = IssuerPublicKey::from_base64_der(&self.endpoints.anchor)
            .map_err(|e| format!("trust anchor: {e}"))?;

        // Two deployments exist: a detached COSE signature next to a raw
        // content file, or a single self-contained COSE bundle.
        let parsed = match parse_cose_sign1(signature_object) {
            Ok(parsed) => parsed,
            Err(_) => parse_cose_sign1(content)
                .map_err(|e| format!("{} bundle is not COSE_Sign1: {e}", P::KIND))?,
        };

        let alg = parsed
            .algorithm()
            .and_then(CoseAlgorithm::from_label)
            .ok_or_else(|| "bundle uses an unsupported signature algorithm".to_string())?;

        let (sig_structure, payload_bytes) = match parsed.payload.as_deref() {
            None => (
                parsed.sig_structure(Some(content))?,
                content,
            ),
            Some(embedded) => (parsed.sig_structure(None)?, embedded),
        };

        verify_signature(alg, &anchor, &sig_structure, &parsed.signature)
            .map_err(|e| format!("bundle signature rejected: {e}"))?;

        P::decode(payload_bytes)
    }

    async fn ensure_disk_loaded(&self) {
        if self.disk_checked.swap(true, Ordering::AcqRel) {
            return;
        }

        let stored = match self.storage.read(P::STORAGE_FILE).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return,
            Err(e) => {
                warn!(kind = P::KIND, error = %e, "failed to read persisted bundle");
                return;
            }
        };

        let (signature_object, content) = match decode_persisted(&stored) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(kind = P::KIND, error = %e, "ignoring corrupt persisted bundle");
                return;
            }
        };

        match self.verify_and_decode(&signature_object, &content) {
            Ok(payload) => {
                debug!(kind = P::KIND, "loaded persisted bundle");
                *self.cache.write().unwrap() = Some(Arc::new(payload));
            }
            Err(e) => {
                warn!(kind = P::KIND, error = %e, "ignoring persisted bundle that fails verification");
            }
        }
    }
}

/// Persisted form: `[signature-object bstr, content bstr]`. Storing the raw
/// fetched bytes means load re-runs the same verification as refresh, and the
/// on-disk format round-trips by construction.
fn encode_persisted(signature_object: &[u8], content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + signature_object.len() + content.len());
    {
        // Writes to a Vec cannot fail.
        let mut enc = Encoder::new(&mut out);
        let _ = enc.array(2).and_then(|e| e.bytes(signature_object)).and_then(|e| e.bytes(content));
    }
    out
}

fn decode_persisted(stored: &[u8]) -> Result<(Vec<u8>, Vec<u8>), String> {
    let mut dec = Decoder::new(stored);
    let len = dec
        .array()
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "indefinite-length arrays are not supported".to_string())?;
    if len != 2 {
        return Err("persisted bundle array length was not 2".to_string());
    }
    if !matches!(dec.datatype().map_err(|e| e.to_string())?, Type::Bytes) {
        return Err("persisted signature object is not a bstr".to_string());
    }
    let signature_object = dec.bytes().map_err(|e| e.to_string())?.to_vec();
    let content = dec.bytes().map_err(|e| e.to_string())?.to_vec();
    Ok((signature_object, content))
}
