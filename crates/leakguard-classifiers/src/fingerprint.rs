//! Exact-match fingerprints of known sensitive documents

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::info;

/// Hex-encoded SHA-256 of the UTF-8 bytes of `content`
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Registry of document hashes
pub trait FingerprintRegistry: Send + Sync {
    /// Register a content hash
    fn add(&self, content_hash: &str);

    /// Whether a content hash is registered
    fn contains(&self, content_hash: &str) -> bool;

    /// Number of registered hashes
    fn len(&self) -> usize;

    /// True if nothing is registered
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local fingerprint set
#[derive(Debug, Default)]
pub struct InMemoryFingerprints {
    hashes: RwLock<HashSet<String>>,
}

impl InMemoryFingerprints {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with hex digests
    pub fn with_hashes<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let registry = Self::new();
        for hash in hashes {
            registry.add(hash.as_ref());
        }
        registry
    }
}

impl FingerprintRegistry for InMemoryFingerprints {
    fn add(&self, content_hash: &str) {
        let normalized = content_hash.trim().to_ascii_lowercase();
        let prefix = normalized.get(..16).unwrap_or(&normalized);
        info!(fingerprint = %prefix, "Added fingerprint");
        self.hashes.write().insert(normalized);
    }

    fn contains(&self, content_hash: &str) -> bool {
        self.hashes
            .read()
            .contains(&content_hash.trim().to_ascii_lowercase())
    }

    fn len(&self) -> usize {
        self.hashes.read().len()
    }
}
