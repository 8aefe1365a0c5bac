//! Cache key derivation for search results and locale exports.
//!
//! Search keys are `search:<xxh3-128 hex>` over a canonical JSON encoding of
//! the filters, `per_page` and `page`. Export keys are `export:<locale>`.
//! The two prefixes are evicted independently.

use crate::filters::{SearchFilters, SearchParams};
use serde_json::{json, Map, Value};
use xxhash_rust::xxh3::xxh3_128;

pub const SEARCH_PREFIX: &str = "search:";
pub const EXPORT_PREFIX: &str = "export:";

/// Cache key for a search request.
pub fn search_key(params: &SearchParams) -> String {
    let encoded = canonical_encoding(params);
    format!("{}{:032x}", SEARCH_PREFIX, xxh3_128(encoded.as_bytes()))
}

/// Cache key for a locale export.
pub fn export_key(locale: &str) -> String {
    format!("{}{}", EXPORT_PREFIX, locale)
}

/// Deterministic byte form of the request.
///
/// Filters are canonicalized again here so that callers building
/// `SearchParams` by hand cannot produce two encodings for one query.
/// `serde_json::Map` is ordered by key, which fixes the field order.
fn canonical_encoding(params: &SearchParams) -> String {
    let SearchFilters {
        locale,
        key,
        content,
        tags,
        tag_names,
    } = params.filters.clone().canonicalize();

    let mut filters = Map::new();
    if let Some(v) = locale {
        filters.insert("locale".to_string(), json!(v));
    }
    if let Some(v) = key {
        filters.insert("key".to_string(), json!(v));
    }
    if let Some(v) = content {
        filters.insert("content".to_string(), json!(v));
    }
    if let Some(v) = tags {
        filters.insert("tags".to_string(), json!(v));
    }
    if let Some(v) = tag_names {
        filters.insert("tag_names".to_string(), json!(v));
    }

    json!([Value::Object(filters), params.per_page, params.page]).to_string()
}
