//! Look-aside cache abstraction.
//!
//! The cache is never a source of truth: callers treat every error as a miss.
//! Values are stored as serialized JSON strings so any backend that can hold
//! bytes can implement [`Cache`].

use crate::error::CacheError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// TTL applied when the caller does not choose one.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a live entry.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store an entry that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Remove every entry whose key starts with `prefix`. Returns how many were removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Store an entry with [`DEFAULT_TTL`].
    async fn put(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.set(key, value, DEFAULT_TTL).await
    }

    /// Remove entries matching `pattern`, where a trailing `*` means prefix match.
    async fn delete(&self, pattern: &str) -> Result<usize, CacheError> {
        match pattern.strip_suffix('*') {
            Some(prefix) => self.delete_by_prefix(prefix).await,
            None => self.delete_exact(pattern).await,
        }
    }

    /// Remove a single entry. Returns how many were removed (0 or 1).
    async fn delete_exact(&self, key: &str) -> Result<usize, CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    /// `None` when the TTL is too large to represent
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process cache backed by a `HashMap` behind a tokio `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every expired entry.
    pub async fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(Instant::now()) => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
            }
        }

        // Expired: purge under the write lock, re-checking in case it was refreshed
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(Instant::now()))
        {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        if ttl.is_zero() {
            entries.remove(key);
            return Ok(());
        }
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    async fn delete_exact(&self, key: &str) -> Result<usize, CacheError> {
        Ok(usize::from(self.entries.write().await.remove(key).is_some()))
    }
}
