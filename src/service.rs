//! Translation service: look-aside caching over the store plus invalidation.
//!
//! Reads (search, export, reference listings) go through the cache first and
//! fall back to the database on a miss or on any cache failure. Every
//! committed translation write evicts the whole `search:` and `export:`
//! families before the call returns.

use crate::cache::Cache;
use crate::db::Database;
use crate::error::{CacheError, StoreError, ValidationErrors, WriteError};
use crate::filters::SearchParams;
use crate::fingerprint::{export_key, search_key, EXPORT_PREFIX, SEARCH_PREFIX};
use crate::models::{
    CreateTranslation, Language, NewTranslation, Page, Tag, Translation, TranslationChanges,
    UpdateTranslation,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const TAGS_KEY: &str = "tags:all";
pub const LANGUAGES_KEY: &str = "languages:all";

#[derive(Clone)]
pub struct TranslationService {
    db: Database,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl TranslationService {
    pub fn new(db: Database, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { db, cache, ttl }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // ==================== Reads ====================

    /// Paginated search, served from cache when possible
    pub async fn search(&self, params: &SearchParams) -> Result<Page<Translation>, StoreError> {
        let key = search_key(params);
        self.remember(&key, || self.db.search_translations(params))
            .await
    }

    /// Key -> content map for one locale, served from cache when possible
    pub async fn export(&self, locale: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let key = export_key(locale);
        self.remember(&key, || self.db.export_locale(locale)).await
    }

    /// Single translation lookup. Not cached.
    pub async fn get(&self, id: i64) -> Result<Option<Translation>, StoreError> {
        self.db.get_translation(id).await
    }

    pub async fn list_tags(&self) -> Result<Vec<Tag>, StoreError> {
        self.remember(TAGS_KEY, || self.db.list_tags()).await
    }

    pub async fn list_languages(&self) -> Result<Vec<Language>, StoreError> {
        self.remember(LANGUAGES_KEY, || self.db.list_languages())
            .await
    }

    // ==================== Writes ====================

    pub async fn create(&self, input: CreateTranslation) -> Result<Translation, WriteError> {
        let new = NewTranslation::new(input)?;
        self.check_references(new.fields.language_id, Some(&new.tag_ids))
            .await?;

        let translation = self.db.create_translation(&new).await?;
        info!(
            "Created translation {} ({}, {})",
            translation.id, translation.key, translation.locale
        );

        self.invalidate().await;
        Ok(translation)
    }

    /// Returns `None` when no translation has this id.
    pub async fn update(
        &self,
        id: i64,
        input: UpdateTranslation,
    ) -> Result<Option<Translation>, WriteError> {
        let changes = TranslationChanges::new(input)?;
        self.check_references(changes.language_id.flatten(), changes.tag_ids.as_deref())
            .await?;

        let updated = self.db.update_translation(id, &changes).await?;
        if let Some(translation) = &updated {
            info!("Updated translation {} ({})", translation.id, translation.key);
            self.invalidate().await;
        }
        Ok(updated)
    }

    /// Returns `false` when no translation has this id.
    pub async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let deleted = self.db.delete_translation(id).await?;
        if deleted {
            info!("Deleted translation {}", id);
            self.invalidate().await;
        }
        Ok(deleted)
    }

    /// Delete a language and, through the cascade, all of its translations
    pub async fn delete_language(&self, id: i64) -> Result<bool, StoreError> {
        let deleted = self.db.delete_language(id).await?;
        if deleted {
            info!("Deleted language {}", id);
            self.evict(LANGUAGES_KEY).await;
            self.invalidate().await;
        }
        Ok(deleted)
    }

    /// Evict every cached search result and every cached export.
    ///
    /// Returns the number of entries removed. Backend failures are logged
    /// and otherwise ignored; the TTL bounds how long a surviving entry can
    /// be served.
    pub async fn invalidate(&self) -> usize {
        let mut evicted = 0;
        for prefix in [SEARCH_PREFIX, EXPORT_PREFIX] {
            match self.cache.delete_by_prefix(prefix).await {
                Ok(count) => evicted += count,
                Err(e) => warn!("Failed to evict '{}' cache entries: {}", prefix, e),
            }
        }
        debug!("Invalidated {} cached search/export entries", evicted);
        evicted
    }

    async fn evict(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!("Failed to evict cache entry {}: {}", key, e);
        }
    }

    /// Reject writes that point at languages or tags that do not exist
    async fn check_references(
        &self,
        language_id: Option<i64>,
        tag_ids: Option<&[i64]>,
    ) -> Result<(), WriteError> {
        let mut errors = ValidationErrors::new();

        if let Some(id) = language_id {
            if !self.db.language_exists(id).await? {
                errors.add("language_id", "The selected language id is invalid.");
            }
        }

        if let Some(ids) = tag_ids {
            for id in self.db.missing_tag_ids(ids).await? {
                errors.add("tags", format!("The selected tag {} is invalid.", id));
            }
        }

        errors.into_result()?;
        Ok(())
    }

    /// Look-aside read: cached value if present and readable, else `load`
    async fn remember<T, F, Fut>(&self, key: &str, load: F) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match decode::<T>(&raw) {
                Ok(value) => {
                    debug!("Cache hit for {}", key);
                    return Ok(value);
                }
                Err(e) => warn!("Ignoring unreadable cache entry {}: {}", key, e),
            },
            Ok(None) => debug!("Cache miss for {}", key),
            Err(e) => warn!("Cache read failed for {}: {}", key, e),
        }

        let value = load().await?;

        let stored = match encode(&value) {
            Ok(raw) => self.cache.set(key, raw, self.ttl).await,
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            warn!("Cache write failed for {}: {}", key, e);
        }

        Ok(value)
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, CacheError> {
    Ok(serde_json::from_str(raw)?)
}

fn encode<T: Serialize>(value: &T) -> Result<String, CacheError> {
    Ok(serde_json::to_string(value)?)
}
