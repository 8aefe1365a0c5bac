//! Search filters and pagination parameters.
//!
//! Filters arrive as raw query pairs. Parsing accumulates repeated
//! `tags`/`tags[]` and `tag_names`/`tag_names[]` values (a value may also be
//! comma-separated) and canonicalizes empty strings and empty lists to
//! "absent", so that every spelling of the same logical query ends up as the
//! same `SearchFilters`.

use crate::error::ValidationErrors;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;

/// Canonical filter set for a translation search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub locale: Option<String>,
    pub key: Option<String>,
    pub content: Option<String>,
    /// Sorted, de-duplicated tag ids.
    pub tags: Option<Vec<i64>>,
    /// Sorted, de-duplicated tag names.
    pub tag_names: Option<Vec<String>>,
}

impl SearchFilters {
    /// Collapse empty values to `None` and sort/dedup the tag lists.
    pub fn canonicalize(self) -> Self {
        Self {
            locale: non_empty(self.locale),
            key: non_empty(self.key),
            content: non_empty(self.content),
            tags: self.tags.and_then(|mut ids| {
                ids.sort_unstable();
                ids.dedup();
                (!ids.is_empty()).then_some(ids)
            }),
            tag_names: self.tag_names.and_then(|names| {
                let mut names: Vec<String> = names
                    .into_iter()
                    .filter(|n| !n.trim().is_empty())
                    .collect();
                names.sort();
                names.dedup();
                (!names.is_empty()).then_some(names)
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locale.is_none()
            && self.key.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.tag_names.is_none()
    }
}

/// Filters plus pagination, as accepted by the search endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub filters: SearchFilters,
    pub page: u32,
    pub per_page: u32,
}

impl SearchParams {
    pub fn new(filters: SearchFilters, page: u32, per_page: u32) -> Self {
        Self {
            filters: filters.canonicalize(),
            page,
            per_page,
        }
    }

    /// Build search parameters from decoded query pairs.
    ///
    /// Unknown parameters are ignored. Malformed numbers and out-of-range
    /// pagination are reported as validation errors.
    pub fn from_pairs<I, K, V>(
        pairs: I,
        default_per_page: u32,
        max_per_page: u32,
    ) -> Result<Self, ValidationErrors>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut errors = ValidationErrors::new();
        let mut filters = SearchFilters::default();
        let mut tags: Vec<i64> = Vec::new();
        let mut tag_names: Vec<String> = Vec::new();
        let mut page_value = DEFAULT_PAGE;
        let mut per_page_value = default_per_page;

        for (name, value) in pairs {
            let value = value.as_ref();
            match name.as_ref() {
                "locale" => filters.locale = Some(value.to_string()),
                "key" => filters.key = Some(value.to_string()),
                "content" => filters.content = Some(value.to_string()),
                "tags" | "tags[]" => {
                    for part in split_list(value) {
                        match part.parse::<i64>() {
                            Ok(id) => tags.push(id),
                            Err(_) => errors.add("tags", "Each tag must be an integer id."),
                        }
                    }
                }
                "tag_names" | "tag_names[]" => {
                    tag_names.extend(split_list(value).map(str::to_string));
                }
                "page" => match parse_positive(value) {
                    Some(n) => page_value = n,
                    None => errors.add("page", "The page must be a positive integer."),
                },
                "per_page" => match parse_positive(value) {
                    Some(n) if n <= max_per_page => per_page_value = n,
                    Some(_) => errors.add(
                        "per_page",
                        format!("The per page may not be greater than {}.", max_per_page),
                    ),
                    None => errors.add("per_page", "The per page must be a positive integer."),
                },
                _ => {}
            }
        }

        errors.into_result()?;

        filters.tags = Some(tags);
        filters.tag_names = Some(tag_names);
        Ok(Self::new(filters, page_value, per_page_value))
    }

    /// Zero-based row offset of the first item on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_positive(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pairs: &[(&str, &str)]) -> Result<SearchParams, ValidationErrors> {
        SearchParams::from_pairs(pairs.iter().copied(), 50, 500)
    }

    // ==================== Canonicalization Tests ====================

    #[test]
    fn test_empty_values_become_absent() {
        let filters = SearchFilters {
            locale: Some(String::new()),
            key: Some("  ".to_string()),
            content: None,
            tags: Some(vec![]),
            tag_names: Some(vec![String::new()]),
        }
        .canonicalize();

        assert!(filters.is_empty());
        assert_eq!(filters, SearchFilters::default());
    }

    #[test]
    fn test_tag_lists_sorted_and_deduped() {
        let filters = SearchFilters {
            tags: Some(vec![3, 1, 3]),
            tag_names: Some(vec!["web".to_string(), "mobile".to_string(), "web".to_string()]),
            ..Default::default()
        }
        .canonicalize();

        assert_eq!(filters.tags, Some(vec![1, 3]));
        assert_eq!(
            filters.tag_names,
            Some(vec!["mobile".to_string(), "web".to_string()])
        );
    }

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_defaults() {
        let params = parse(&[]).expect("Should parse");
        assert!(params.filters.is_empty());
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 50);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn test_parse_all_filters() {
        let params = parse(&[
            ("locale", "en"),
            ("key", "welcome"),
            ("content", "hello"),
            ("tags[]", "2"),
            ("tags[]", "1"),
            ("tag_names[]", "web"),
            ("page", "3"),
            ("per_page", "20"),
        ])
        .expect("Should parse");

        assert_eq!(params.filters.locale.as_deref(), Some("en"));
        assert_eq!(params.filters.key.as_deref(), Some("welcome"));
        assert_eq!(params.filters.content.as_deref(), Some("hello"));
        assert_eq!(params.filters.tags, Some(vec![1, 2]));
        assert_eq!(params.filters.tag_names, Some(vec!["web".to_string()]));
        assert_eq!(params.page, 3);
        assert_eq!(params.per_page, 20);
        assert_eq!(params.offset(), 40);
    }

    #[test]
    fn test_parse_comma_separated_lists() {
        let params = parse(&[("tags", "1,2, 3"), ("tag_names", "web,mobile")]).expect("Should parse");
        assert_eq!(params.filters.tags, Some(vec![1, 2, 3]));
        assert_eq!(
            params.filters.tag_names,
            Some(vec!["mobile".to_string(), "web".to_string()])
        );
    }

    #[test]
    fn test_parse_ignores_unknown_params() {
        let params = parse(&[("sort", "desc"), ("locale", "en")]).expect("Should parse");
        assert_eq!(params.filters.locale.as_deref(), Some("en"));
    }

    #[test]
    fn test_parse_rejects_non_integer_tags() {
        let errors = parse(&[("tags[]", "web")]).unwrap_err();
        assert!(errors.contains("tags"));
    }

    #[test]
    fn test_parse_rejects_bad_pagination() {
        let errors = parse(&[("page", "0"), ("per_page", "abc")]).unwrap_err();
        assert!(errors.contains("page"));
        assert!(errors.contains("per_page"));

        let errors = parse(&[("per_page", "501")]).unwrap_err();
        assert!(errors.contains("per_page"));
    }

    #[test]
    fn test_parse_empty_filter_values_are_absent() {
        let params = parse(&[("locale", ""), ("key", ""), ("tags", "")]).expect("Should parse");
        assert!(params.filters.is_empty());
    }
}
