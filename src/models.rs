//! Domain records and write inputs.

use crate::error::ValidationErrors;
use crate::keys::resolve_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const MAX_LOCALE_LEN: usize = 10;
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_KEY_LEN: usize = 255;
pub const MAX_TAG_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Language {
    pub id: i64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// A stored translation with its language and tags resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: i64,
    pub key: String,
    pub content: String,
    pub locale: String,
    pub language_id: Option<i64>,
    /// Legacy free-text tag, unrelated to `tags`.
    pub tag: Option<String>,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub language: Option<Language>,
    pub tags: Vec<Tag>,
}

/// Column values written for a translation row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationFields {
    pub key: String,
    pub content: String,
    pub locale: String,
    pub language_id: Option<i64>,
    pub tag: Option<String>,
    pub name: String,
}

/// Request body for creating a translation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTranslation {
    pub key: Option<String>,
    pub content: Option<String>,
    pub locale: Option<String>,
    pub language_id: Option<i64>,
    pub tag: Option<String>,
    pub name: Option<String>,
    pub tags: Option<Vec<i64>>,
}

/// Request body for updating a translation. Absent fields are left as is.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTranslation {
    pub key: Option<String>,
    pub content: Option<String>,
    pub locale: Option<String>,
    /// `Some(None)` is an explicit `null` and detaches the language.
    #[serde(default, deserialize_with = "explicit_null")]
    pub language_id: Option<Option<i64>>,
    pub tag: Option<String>,
    pub name: Option<String>,
    pub tags: Option<Vec<i64>>,
}

/// A validated translation ready to insert, with its key already derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTranslation {
    pub fields: TranslationFields,
    pub tag_ids: Vec<i64>,
}

impl NewTranslation {
    pub fn new(input: CreateTranslation) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let content = required(&mut errors, "content", input.content);
        let locale = required(&mut errors, "locale", input.locale);
        let name = required(&mut errors, "name", input.name);

        if let Some(locale) = &locale {
            max_len(&mut errors, "locale", locale, MAX_LOCALE_LEN);
        }
        if let Some(name) = &name {
            max_len(&mut errors, "name", name, MAX_NAME_LEN);
        }
        if let Some(key) = &input.key {
            max_len(&mut errors, "key", key, MAX_KEY_LEN);
        }
        if let Some(tag) = &input.tag {
            max_len(&mut errors, "tag", tag, MAX_TAG_LEN);
        }
        let tag_ids = input.tags.map(dedup_ids).unwrap_or_default();
        check_ids(&mut errors, "language_id", input.language_id.as_slice());
        check_ids(&mut errors, "tags", &tag_ids);

        if !errors.is_empty() {
            return Err(errors);
        }
        let (Some(content), Some(locale), Some(name)) = (content, locale, name) else {
            return Err(errors);
        };

        let key = resolve_key(input.key.as_deref(), &locale, &name);
        Ok(Self {
            fields: TranslationFields {
                key,
                content,
                locale,
                language_id: input.language_id,
                tag: input.tag.filter(|t| !t.trim().is_empty()),
                name,
            },
            tag_ids,
        })
    }
}

/// A validated partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationChanges {
    pub key: Option<String>,
    pub content: Option<String>,
    pub locale: Option<String>,
    /// `Some(None)` clears the language.
    pub language_id: Option<Option<i64>>,
    pub tag: Option<String>,
    pub name: Option<String>,
    /// When present, replaces the whole tag set.
    pub tag_ids: Option<Vec<i64>>,
}

impl TranslationChanges {
    pub fn new(input: UpdateTranslation) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let content = present(&mut errors, "content", input.content);
        let locale = present(&mut errors, "locale", input.locale);
        let name = present(&mut errors, "name", input.name);

        if let Some(locale) = &locale {
            max_len(&mut errors, "locale", locale, MAX_LOCALE_LEN);
        }
        if let Some(name) = &name {
            max_len(&mut errors, "name", name, MAX_NAME_LEN);
        }
        if let Some(key) = &input.key {
            max_len(&mut errors, "key", key, MAX_KEY_LEN);
        }
        if let Some(tag) = &input.tag {
            max_len(&mut errors, "tag", tag, MAX_TAG_LEN);
        }
        let tag_ids = input.tags.map(dedup_ids);
        check_ids(&mut errors, "language_id", input.language_id.flatten().as_slice());
        if let Some(ids) = &tag_ids {
            check_ids(&mut errors, "tags", ids);
        }

        errors.into_result()?;

        Ok(Self {
            key: input.key.filter(|k| !k.trim().is_empty()),
            content,
            locale,
            language_id: input.language_id,
            tag: input.tag,
            name,
            tag_ids,
        })
    }

    /// Merge these changes over an existing translation.
    ///
    /// The key is re-derived when locale or name change, unless the
    /// changes carry an explicit key.
    pub fn apply_to(&self, existing: &Translation) -> TranslationFields {
        let locale = self.locale.clone().unwrap_or_else(|| existing.locale.clone());
        let name = self.name.clone().unwrap_or_else(|| existing.name.clone());

        let identity_changed = locale != existing.locale || name != existing.name;
        let key = match &self.key {
            Some(explicit) => resolve_key(Some(explicit), &locale, &name),
            None if identity_changed => resolve_key(None, &locale, &name),
            None => existing.key.clone(),
        };

        TranslationFields {
            key,
            content: self.content.clone().unwrap_or_else(|| existing.content.clone()),
            locale,
            language_id: match self.language_id {
                Some(language_id) => language_id,
                None => existing.language_id,
            },
            tag: match &self.tag {
                Some(tag) if tag.trim().is_empty() => None,
                Some(tag) => Some(tag.clone()),
                None => existing.tag.clone(),
            },
            name,
        }
    }
}

/// One page of results plus the metadata needed to walk the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: u64,
    pub last_page: u32,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, current_page: u32, per_page: u32, total: u64) -> Self {
        let per_page_u64 = u64::from(per_page.max(1));
        let last_page = total.div_ceil(per_page_u64).max(1);
        let offset = u64::from(current_page.saturating_sub(1)) * per_page_u64;

        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            (Some(offset + 1), Some(offset + data.len() as u64))
        };

        Self {
            data,
            current_page,
            per_page,
            total,
            last_page: u32::try_from(last_page).unwrap_or(u32::MAX),
            from,
            to,
        }
    }
}

/// Keep an explicit `null` distinct from an absent field.
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer).map(Some)
}

fn required(errors: &mut ValidationErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.add(field, format!("The {} field is required.", field));
            None
        }
    }
}

/// Like `required`, but only when the field was sent at all.
fn present(errors: &mut ValidationErrors, field: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(v) if v.trim().is_empty() => {
            errors.add(field, format!("The {} field must not be empty.", field));
            None
        }
        other => other,
    }
}

fn max_len(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("The {} may not be greater than {} characters.", field, max),
        );
    }
}

fn check_ids(errors: &mut ValidationErrors, field: &str, ids: &[i64]) {
    if ids.iter().any(|id| *id <= 0) {
        errors.add(field, format!("The selected {} is invalid.", field));
    }
}

fn dedup_ids(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}
