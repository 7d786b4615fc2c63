//! In-memory generation cache
//!
//! Each operation kind gets its own `TtlCache` with a TTL fixed at
//! construction. Entries are replaced whole, never mutated in place, so a
//! single `RwLock` per namespace is enough for readers to never see a half
//! written value.
//!
//! Expired entries are evicted lazily on read and periodically by the
//! background sweep started with [`spawn_sweeper`].

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use sdk::types::{Decomposition, GeneratedImage, Simulation};

/// Operation kinds that own a cache namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheNamespace {
    Decomposition,
    Simulation,
    Image,
    Transcription,
}

impl CacheNamespace {
    pub const ALL: [CacheNamespace; 4] = [
        CacheNamespace::Decomposition,
        CacheNamespace::Simulation,
        CacheNamespace::Image,
        CacheNamespace::Transcription,
    ];

    /// Key prefix for this namespace
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheNamespace::Decomposition => "decomposition",
            CacheNamespace::Simulation => "simulation",
            CacheNamespace::Image => "image",
            CacheNamespace::Transcription => "transcription",
        }
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Builds deterministic, namespace-prefixed cache keys.
///
/// Text parts are trimmed and lower-cased. Large or binary inputs go through
/// [`CacheKey::digest`], which appends the full SHA-256 hex digest.
///
/// ```
/// use uchronia_engine::cache::{CacheKey, CacheNamespace};
///
/// let key = CacheKey::new(CacheNamespace::Simulation)
///     .part("  Smartphone ")
///     .part("1800s")
///     .build();
/// assert_eq!(key, "simulation:smartphone|1800s");
/// ```
#[derive(Debug, Clone)]
pub struct CacheKey {
    namespace: CacheNamespace,
    parts: Vec<String>,
}

impl CacheKey {
    pub fn new(namespace: CacheNamespace) -> Self {
        Self {
            namespace,
            parts: Vec::new(),
        }
    }

    /// Append a normalized text part
    pub fn part(mut self, value: impl AsRef<str>) -> Self {
        let normalized = value
            .as_ref()
            .trim()
            .to_lowercase()
            .replace('\\', "\\\\")
            .replace('|', "\\|");
        self.parts.push(normalized);
        self
    }

    /// Append the SHA-256 digest of arbitrary bytes
    pub fn digest(mut self, bytes: impl AsRef<[u8]>) -> Self {
        let digest = Sha256::digest(bytes.as_ref());
        self.parts.push(hex::encode(digest));
        self
    }

    pub fn build(self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.parts.join("|"))
    }
}

/// Point-in-time statistics for one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Live (unexpired) entries
    pub count: usize,
    pub hits: u64,
    pub misses: u64,
    pub ttl_secs: u64,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Key-value store with a fixed per-entry TTL
pub struct TtlCache<V> {
    namespace: CacheNamespace,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(namespace: CacheNamespace, ttl: Duration) -> Self {
        Self {
            namespace,
            ttl,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a key. An expired entry counts as a miss and is evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let expired = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
            // Another writer may have refreshed the entry in between
            if entries
                .get(key)
                .is_some_and(|entry| entry.expires_at <= Instant::now())
            {
                entries.remove(key);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value under the namespace TTL, replacing any previous entry
    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.into(), entry);
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Remove all entries and reset counters
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        CacheStats {
            count: entries.values().filter(|e| e.expires_at > now).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// One cache per operation kind, injected into the generation service
pub struct GenerationCache {
    pub decompositions: TtlCache<Decomposition>,
    pub simulations: TtlCache<Simulation>,
    pub images: TtlCache<Vec<GeneratedImage>>,
    pub transcriptions: TtlCache<String>,
}

impl GenerationCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            decompositions: TtlCache::new(
                CacheNamespace::Decomposition,
                config.ttl(CacheNamespace::Decomposition),
            ),
            simulations: TtlCache::new(
                CacheNamespace::Simulation,
                config.ttl(CacheNamespace::Simulation),
            ),
            images: TtlCache::new(CacheNamespace::Image, config.ttl(CacheNamespace::Image)),
            transcriptions: TtlCache::new(
                CacheNamespace::Transcription,
                config.ttl(CacheNamespace::Transcription),
            ),
        }
    }

    pub fn stats(&self) -> BTreeMap<CacheNamespace, CacheStats> {
        BTreeMap::from([
            (CacheNamespace::Decomposition, self.decompositions.stats()),
            (CacheNamespace::Simulation, self.simulations.stats()),
            (CacheNamespace::Image, self.images.stats()),
            (CacheNamespace::Transcription, self.transcriptions.stats()),
        ])
    }

    pub fn purge_expired(&self) -> usize {
        self.decompositions.purge_expired()
            + self.simulations.purge_expired()
            + self.images.purge_expired()
            + self.transcriptions.purge_expired()
    }

    pub fn clear(&self) {
        self.decompositions.clear();
        self.simulations.clear();
        self.images.clear();
        self.transcriptions.clear();
    }
}

/// Periodically purge expired entries until the returned handle is aborted.
pub fn spawn_sweeper(
    cache: Arc<GenerationCache>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!("Cache sweep purged {} expired entries", purged);
            }
        }
    })
}
