//! HTTP surface: axum router, handlers and bearer-token middleware.
//!
//! Routes:
//! - `GET /health` - liveness, unauthenticated
//! - `GET /api/v1/translations` and `GET /api/v1/translations/search` - search
//! - `GET /api/v1/translations/export?locale=xx` - flat key/content map
//! - `POST /api/v1/translations` - create
//! - `GET|PUT|PATCH|DELETE /api/v1/translations/:id`
//! - `GET /api/v1/tags`, `GET /api/v1/languages`
//!
//! Successful responses use the `{status, message, data}` envelope.

use crate::config::Config;
use crate::error::{ApiError, ValidationErrors};
use crate::filters::SearchParams;
use crate::models::{CreateTranslation, UpdateTranslation};
use crate::security::is_authorized;
use crate::service::TranslationService;
use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

const MAX_EXPORT_LOCALE_LEN: usize = 80;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    service: TranslationService,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(service: TranslationService, config: Config) -> Self {
        Self {
            service,
            config: Arc::new(config),
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<T> {
    status: bool,
    message: &'static str,
    data: T,
}

fn success<T: Serialize>(message: &'static str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        status: true,
        message,
        data,
    })
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/translations",
            get(search_translations).post(create_translation),
        )
        .route("/translations/search", get(search_translations))
        .route("/translations/export", get(export_translations))
        .route(
            "/translations/:id",
            get(show_translation)
                .put(update_translation)
                .patch(update_translation)
                .delete(delete_translation),
        )
        .route("/tags", get(list_tags))
        .route("/languages", get(list_languages))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ==================== Middleware ====================

async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if !is_authorized(state.config.api_token.as_deref(), header_value) {
        warn!("Rejected unauthenticated request to {}", request.uri().path());
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

// ==================== Handlers ====================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn search_translations(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let params = SearchParams::from_pairs(
        query_pairs(query.as_deref()),
        state.config.default_per_page,
        state.config.max_per_page,
    )?;
    debug!("Searching translations: {:?}", params);

    let page = state.service.search(&params).await?;
    Ok(success("Translations searched successfully", page).into_response())
}

async fn export_translations(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let locale = query_pairs(query.as_deref())
        .find(|(name, _)| name == "locale")
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_default();

    if locale.is_empty() {
        return Err(ValidationErrors::single("locale", "The locale field is required.").into());
    }
    if locale.chars().count() > MAX_EXPORT_LOCALE_LEN {
        return Err(ValidationErrors::single(
            "locale",
            format!(
                "The locale may not be greater than {} characters.",
                MAX_EXPORT_LOCALE_LEN
            ),
        )
        .into());
    }

    let export = state.service.export(&locale).await?;
    Ok(success("Translations exported successfully", export).into_response())
}

async fn create_translation(
    State(state): State<AppState>,
    payload: Result<Json<CreateTranslation>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = payload.map_err(body_error)?;
    let translation = state.service.create(input).await?;

    Ok((
        StatusCode::CREATED,
        success("Translation created successfully", translation),
    )
        .into_response())
}

async fn show_translation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let translation = state
        .service
        .get(id)
        .await?
        .ok_or(ApiError::NotFound("translation"))?;

    Ok(success("Translation fetched successfully", translation).into_response())
}

async fn update_translation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTranslation>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let Json(input) = payload.map_err(body_error)?;
    let translation = state
        .service
        .update(id, input)
        .await?
        .ok_or(ApiError::NotFound("translation"))?;

    Ok(success("Translation updated successfully", translation).into_response())
}

async fn delete_translation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    if !state.service.delete(id).await? {
        return Err(ApiError::NotFound("translation"));
    }

    Ok(success(
        "Translation deleted successfully",
        serde_json::json!({ "deleted": true }),
    )
    .into_response())
}

async fn list_tags(State(state): State<AppState>) -> Result<Response, ApiError> {
    let tags = state.service.list_tags().await?;
    Ok(success("Tags fetched successfully", tags).into_response())
}

async fn list_languages(State(state): State<AppState>) -> Result<Response, ApiError> {
    let languages = state.service.list_languages().await?;
    Ok(success("Languages fetched successfully", languages).into_response())
}

// ==================== Helpers ====================

fn query_pairs(query: Option<&str>) -> impl Iterator<Item = (Cow<'_, str>, Cow<'_, str>)> {
    url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
}

/// Ids that are not integers cannot name a translation
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::NotFound("translation"))
}

fn body_error(rejection: JsonRejection) -> ApiError {
    ApiError::Validation(ValidationErrors::single("body", rejection.body_text()))
}
