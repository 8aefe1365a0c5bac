//! Error types shared by the store, cache, service and HTTP layers.
//!
//! Store errors propagate unmodified up to the HTTP layer, where they are
//! mapped to status codes. Cache errors never leave the service: they are
//! logged and treated as a miss.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

/// Errors raised by the relational store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write collided with the unique (key, locale) constraint.
    #[error("duplicate translation key '{key}' for locale '{locale}'")]
    DuplicateKey { key: String, locale: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Map a failed write of `(key, locale)` to `DuplicateKey` when the
    /// database reports a unique violation, otherwise keep it generic.
    pub fn from_write(err: sqlx::Error, key: &str, locale: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateKey {
                    key: key.to_string(),
                    locale: locale.to_string(),
                }
            }
            _ => StoreError::Database(err),
        }
    }
}

/// Errors raised by a cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by a translation write: bad input or a store failure.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("validation failed")]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationErrors> for WriteError {
    fn from(errors: ValidationErrors) -> Self {
        WriteError::Invalid(errors)
    }
}

/// Field-level validation messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(())` when no messages were collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }
}

/// Errors returned from HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(ValidationErrors),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("duplicate entry for key '{key}' and locale '{locale}'")]
    DuplicateKey { key: String, locale: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { key, locale } => ApiError::DuplicateKey { key, locale },
            StoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<WriteError> for ApiError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Invalid(errors) => ApiError::Validation(errors),
            WriteError::Store(e) => e.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a ValidationErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match &self {
            ApiError::Validation(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "The given data was invalid",
                None,
            ),
            ApiError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                match *what {
                    "translation" => "Translation not found",
                    _ => "Resource not found",
                },
                Some("Not found".to_string()),
            ),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthenticated", None),
            ApiError::DuplicateKey { .. } => (
                StatusCode::CONFLICT,
                "Duplicate entry for key and locale, try changing the name",
                Some(self.to_string()),
            ),
            ApiError::Internal(detail) => {
                error!("Request failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
        };

        let errors = match &self {
            ApiError::Validation(errors) => Some(errors),
            _ => None,
        };

        let body = ErrorBody {
            status: false,
            message,
            error: detail,
            errors,
        };

        (status, Json(body)).into_response()
    }
}
