// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Encrypted persistence for the signed-bundle stores.
//!
//! Each store owns one protected file with a stable name. Content is
//! AES-256-GCM encrypted under a key derived from a per-install keystore
//! alias; the random nonce is prepended to the ciphertext. The cipher handle
//! is function-local, so it is released on every exit path.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("storage read failed: {0}")]
    Read(String),
    #[error("storage write failed: {0}")]
    Write(String),
    #[error("stored data could not be decrypted")]
    Decrypt,
}

/// Byte-oriented protected read/write capability.
///
/// `read` returns `Ok(None)` when nothing has been persisted under `name`.
#[async_trait]
pub trait ProtectedStorage: Send + Sync {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Production storage: encrypted files in an application data directory.
pub struct EncryptedFileStorage {
    dir: PathBuf,
    key: [u8; 32],
}

impl EncryptedFileStorage {
    /// `alias` is the per-install keystore alias the symmetric key is bound to.
    pub fn new(dir: impl Into<PathBuf>, alias: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"hcert-storage-key:");
        hasher.update(alias.as_bytes());
        let key: [u8; 32] = hasher.finalize().into();

        Self {
            dir: dir.into(),
            key,
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| StorageError::Write("encryption failed".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&self, stored: &[u8]) -> Result<Vec<u8>, StorageError> {
        if stored.len() < NONCE_LEN {
            return Err(StorageError::Decrypt);
        }
        let (nonce, ciphertext) = stored.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StorageError::Decrypt)
    }
}

#[async_trait]
impl ProtectedStorage for EncryptedFileStorage {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let stored = match tokio::fs::read(self.path_for(name)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Read(e.to_string())),
        };

        self.decrypt(&stored).map(Some)
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))?;

        let encrypted = self.encrypt(data)?;
        tokio::fs::write(self.path_for(name), encrypted)
            .await
            .map_err(|e| StorageError::Write(e.to_string()))
    }
}

/// In-memory storage for tests.
#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProtectedStorage for MemoryStorage {
    async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.files.lock().unwrap().get(name).cloned())
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<(), StorageError> {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), data.to_vec());
        Ok(())
    }
}
