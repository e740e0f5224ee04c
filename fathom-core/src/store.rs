//! Quality store - the only state shared between research runs
//!
//! Holds learned authority scores per domain and explicit verification flags
//! per (url, data-point set). Writes are per-key overwrites; no cross-key locking.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::{DataPoint, DEFAULT_AUTHORITY, KNOWN_SOURCES};

/// Key-value store backing the quality scorer
pub trait QualityStore: Send + Sync {
    /// Authority score recorded for an exact domain
    fn authority(&self, domain: &str) -> Option<f64>;

    /// Overwrite the authority score for a domain
    fn set_authority(&self, domain: &str, score: f64);

    /// Add `delta` to a domain's authority (starting from the default), clamped to [0, 1]
    fn adjust_authority(&self, domain: &str, delta: f64) -> f64 {
        let current = self.authority(domain).unwrap_or(DEFAULT_AUTHORITY);
        let updated = (current + delta).clamp(0.0, 1.0);
        self.set_authority(domain, updated);
        updated
    }

    /// Explicit verification flag for a key from [`verification_key`]
    fn verification(&self, key: &str) -> Option<bool>;

    fn set_verification(&self, key: &str, verified: bool);
}

/// Thread-safe reference to a quality store
pub type SharedQualityStore = Arc<dyn QualityStore>;

/// In-memory store backed by concurrent maps
#[derive(Debug, Default)]
pub struct MemoryQualityStore {
    authority: DashMap<String, f64>,
    verification: DashMap<String, bool>,
}

impl MemoryQualityStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the known-authority table
    pub fn with_known_sources() -> Self {
        let store = Self::new();
        for source in KNOWN_SOURCES {
            store
                .authority
                .insert(source.domain.to_string(), source.authority());
        }
        store
    }

    pub fn shared(self) -> SharedQualityStore {
        Arc::new(self)
    }

    pub fn authority_count(&self) -> usize {
        self.authority.len()
    }
}

impl QualityStore for MemoryQualityStore {
    fn authority(&self, domain: &str) -> Option<f64> {
        self.authority.get(domain).map(|v| *v)
    }

    fn set_authority(&self, domain: &str, score: f64) {
        self.authority
            .insert(domain.to_string(), score.clamp(0.0, 1.0));
    }

    fn adjust_authority(&self, domain: &str, delta: f64) -> f64 {
        let mut entry = self
            .authority
            .entry(domain.to_string())
            .or_insert(DEFAULT_AUTHORITY);
        *entry = (*entry + delta).clamp(0.0, 1.0);
        *entry
    }

    fn verification(&self, key: &str) -> Option<bool> {
        self.verification.get(key).map(|v| *v)
    }

    fn set_verification(&self, key: &str, verified: bool) {
        self.verification.insert(key.to_string(), verified);
    }
}

/// Stable key for a (url, data-point set) pair
pub fn verification_key(url: &str, data_points: &[DataPoint]) -> String {
    let values: Vec<&str> = data_points.iter().map(|dp| dp.value.as_str()).collect();

    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(values.join(",").as_bytes());
    let digest = hasher.finalize();

    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
