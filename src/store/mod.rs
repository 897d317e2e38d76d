//! Content-addressed storage for NFT metadata.

mod ipfs;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use ipfs::{IpfsConfig, IpfsStore};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(String),

    #[error("store rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid store response: {0}")]
    InvalidResponse(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode content: {0}")]
    Encoding(String),
}

/// Content identifier returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cid(pub String);

impl Cid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    async fn publish(&self, bytes: Vec<u8>) -> Result<Cid, StoreError>;
}

/// Process-local store keyed by the SHA-256 of the content.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<Cid, Vec<u8>>>,
    unavailable: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cid: &Cid) -> Option<Vec<u8>> {
        self.objects.lock().get(cid).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Make every publish fail with `reason` until [`recover`](Self::recover).
    pub fn set_unavailable(&self, reason: impl Into<String>) {
        *self.unavailable.lock() = Some(reason.into());
    }

    pub fn recover(&self) {
        *self.unavailable.lock() = None;
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn publish(&self, bytes: Vec<u8>) -> Result<Cid, StoreError> {
        if let Some(reason) = self.unavailable.lock().clone() {
            return Err(StoreError::Unavailable(reason));
        }
        let digest = Sha256::digest(&bytes);
        let cid = Cid(format!("sha256-{}", hex::encode(digest)));
        self.objects.lock().insert(cid.clone(), bytes);
        Ok(cid)
    }
}
