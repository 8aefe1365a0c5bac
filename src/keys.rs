//! Translation key derivation.
//!
//! A translation's `key` is computed from its locale and name as
//! `<locale>.<normalized name>` unless an explicit key is supplied.

/// Normalize a human label into the key segment form.
///
/// Lower-cases ASCII letters, turns spaces into underscores and drops
/// anything outside `[a-zA-Z0-9_]`.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Derive the key for a translation from its locale and name.
pub fn derive_key(locale: &str, name: &str) -> String {
    format!("{}.{}", locale, normalize_name(name))
}

/// Pick the explicit key when one is given, otherwise derive it.
pub fn resolve_key(explicit: Option<&str>, locale: &str, name: &str) -> String {
    match explicit.map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => derive_key(locale, name),
    }
}
