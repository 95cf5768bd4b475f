// src/api.rs
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::config::{self, DetectorConfig};
use crate::detect::{strategy_for, DetectionMethod, DetectionMode};
use crate::error::SourceError;
use crate::logging::anon_hash;
use crate::metrics::{self as m, Metrics};
use crate::notify::{DetectionEvent, DetectionNotifier, NoopNotifier, WebhookNotifier};
use crate::prompt::{generate_prompt, PromptPackage};
use crate::source::{CategoryRef, Source, SourceDraft, TagRef};
use crate::store::{SourceStore, DEFAULT_HISTORY_LIMIT};
use crate::text::Haystack;
use crate::validate::{validate_content, Validation};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SourceStore>,
    pub config: Arc<DetectorConfig>,
    pub notifier: Arc<dyn DetectionNotifier>,
}

impl AppState {
    pub fn new(
        store: SourceStore,
        config: DetectorConfig,
        notifier: Arc<dyn DetectionNotifier>,
    ) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
            notifier,
        }
    }

    /// Empty store sized from `config`, seeded from `[sources].seed_path` when that file
    /// exists, with the webhook notifier the config asks for.
    pub fn from_config(config: DetectorConfig) -> Result<Self> {
        let store = SourceStore::new(config.sources.max_tags, config.sources.history_capacity);
        if let Some(path) = config.sources.seed_path.as_deref() {
            if let Some(raw) = config::load_seed(path)? {
                let n = store.import(&raw)?;
                info!(seeded = n, path = %path.display(), "sources seeded");
            }
        }

        let notifier: Arc<dyn DetectionNotifier> = if config.webhook.enabled {
            Arc::new(
                WebhookNotifier::new()
                    .with_timeout(config.webhook.timeout_secs)
                    .with_retries(config.webhook.max_retries),
            )
        } else {
            Arc::new(NoopNotifier)
        };

        Ok(Self::new(store, config, notifier))
    }
}

/// Full application router: every route, the API-key gate (all but `/health`), CORS.
pub fn router(state: AppState) -> Result<Router> {
    let metrics = Metrics::init()?;
    m::set_source_count(state.store.len());

    let router = Router::new()
        .route("/sources", get(list_sources).post(create_source))
        .route(
            "/sources/{id}",
            get(get_source).put(update_source).delete(delete_source),
        )
        .route("/mapping", get(mapping))
        .route("/detect", post(detect))
        .route("/validate", post(validate))
        .route("/prompt", post(prompt))
        .route("/history", get(history))
        .route("/stats", get(stats))
        .route("/export", get(export))
        .route("/import", post(import))
        .route("/webhook/{source_id}", post(inbound_webhook))
        .merge(metrics.router::<AppState>())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .route("/health", get(|| async { "ok" }))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    Ok(router)
}

// ---------- errors ----------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        let status = match &e {
            SourceError::NotFound(_) => StatusCode::NOT_FOUND,
            SourceError::DuplicateSlug(_) => StatusCode::CONFLICT,
            e if e.is_validation() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ---------- auth ----------

async fn require_api_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: Request,
    next: Next,
) -> Response {
    let api = &state.config.api;
    if api.require_api_key {
        let given = headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        // An unset key locks the API rather than opening it.
        if api.api_key.is_empty() || given != api.api_key {
            return ApiError::new(StatusCode::UNAUTHORIZED, "missing or invalid API key")
                .into_response();
        }
    }
    next.run(req).await
}

// ---------- sources ----------

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    search: Option<String>,
}

async fn list_sources(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Json<Vec<Source>> {
    match q.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(needle) => Json(state.store.search_by_name(needle)),
        None => Json(state.store.list()),
    }
}

async fn get_source(State(state): State<AppState>, Path(id): Path<u64>) -> ApiResult<Json<Source>> {
    state
        .store
        .get(id)
        .map(Json)
        .ok_or_else(|| SourceError::NotFound(id).into())
}

async fn create_source(
    State(state): State<AppState>,
    Json(draft): Json<SourceDraft>,
) -> ApiResult<(StatusCode, Json<Source>)> {
    let source = state.store.insert(draft)?;
    m::set_source_count(state.store.len());
    Ok((StatusCode::CREATED, Json(source)))
}

async fn update_source(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(draft): Json<SourceDraft>,
) -> ApiResult<Json<Source>> {
    Ok(Json(state.store.update(id, draft)?))
}

async fn delete_source(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = state.store.delete(id)?;
    m::set_source_count(state.store.len());
    Ok(Json(json!({ "deleted": removed.id, "slug": removed.slug })))
}

async fn mapping(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.mapping())
}

// ---------- detect ----------

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub use_ai: Option<bool>,
    #[serde(default)]
    pub post_id: Option<u64>,
}

impl DetectRequest {
    /// `title + "\n\n" + content` when a title is given.
    fn text(&self) -> String {
        match self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            Some(t) => format!("{t}\n\n{}", self.content),
            None => self.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetectedSource {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub category: Option<CategoryRef>,
    pub tags: Vec<TagRef>,
    pub auto_publish: bool,
    pub requires_review: bool,
}

#[derive(Debug, Serialize)]
pub struct Instructions {
    pub category_id: Option<u64>,
    pub tag_ids: Vec<u64>,
    pub auto_publish: bool,
    pub post_status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub detected: bool,
    pub confidence: f64,
    pub method: Option<DetectionMethod>,
    pub mode: DetectionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DetectedSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<Instructions>,
    /// `type:value` of the detection rules that matched the winner.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_rules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

async fn detect(
    State(state): State<AppState>,
    Json(req): Json<DetectRequest>,
) -> ApiResult<Json<DetectResponse>> {
    let mode = if req.use_ai == Some(true) {
        DetectionMode::Intelligent
    } else {
        state.config.detection.default_mode
    };
    m::record_request(mode);

    let text = req.text();
    let sources = state.store.snapshot();
    let strategy = strategy_for(mode, state.config.detection.min_confidence);

    let Some(found) = strategy.detect(&text, &sources) else {
        m::record_miss();
        debug!(mode = mode.as_str(), content = %anon_hash(&text), "no source detected");
        return Ok(Json(DetectResponse {
            detected: false,
            confidence: 0.0,
            method: None,
            mode,
            source: None,
            instructions: None,
            matched_rules: Vec::new(),
            message: Some("No matching source found".into()),
            suggestion: Some(
                "Review manually, or add keywords or rules to the source that published this"
                    .into(),
            ),
        }));
    };

    let source = found.source;
    state
        .store
        .record_detection(source.id, req.post_id, found.confidence, found.method, &text)?;
    m::record_hit(found.method, found.confidence);
    debug!(
        mode = mode.as_str(),
        source = %source.slug,
        confidence = found.confidence,
        method = %found.method,
        content = %anon_hash(&text),
        "source detected"
    );

    if let Some(url) = source.webhook_url.clone().filter(|u| !u.trim().is_empty()) {
        let event = DetectionEvent::source_detected(source, found.confidence, Utc::now());
        let notifier = state.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&url, &event).await {
                warn!(error = %e, source = %event.source.slug, "webhook delivery failed");
            }
        });
    }

    Ok(Json(DetectResponse {
        detected: true,
        confidence: found.confidence,
        method: Some(found.method),
        mode,
        source: Some(DetectedSource {
            id: source.id,
            name: source.name.clone(),
            slug: source.slug.clone(),
            source_type: source.source_type.clone(),
            category: source.category.clone(),
            tags: source.tags.clone(),
            auto_publish: source.auto_publish,
            requires_review: source.requires_review,
        }),
        instructions: Some(Instructions {
            category_id: source.category.as_ref().map(|c| c.id),
            tag_ids: source.tag_ids(),
            auto_publish: source.auto_publish,
            post_status: source.post_status(),
        }),
        matched_rules: source.detection_rules.matched(&Haystack::new(&text)),
        message: None,
        suggestion: None,
    }))
}

// ---------- validate / prompt ----------

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub source_id: u64,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ValidatedSource {
    pub name: String,
    pub auto_publish: bool,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    #[serde(flatten)]
    pub validation: Validation,
    pub source: ValidatedSource,
}

async fn validate(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<Json<ValidateResponse>> {
    let source = state
        .store
        .get(req.source_id)
        .ok_or(SourceError::NotFound(req.source_id))?;
    let validation = validate_content(&source, &req.content, state.config.validation.min_words);
    Ok(Json(ValidateResponse {
        validation,
        source: ValidatedSource {
            name: source.name,
            auto_publish: source.auto_publish,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source_id: Option<u64>,
}

async fn prompt(
    State(state): State<AppState>,
    Json(req): Json<PromptRequest>,
) -> ApiResult<Json<PromptPackage>> {
    let sources = match req.source_id {
        Some(id) => vec![state.store.get(id).ok_or(SourceError::NotFound(id))?],
        None => state.store.snapshot(),
    };
    Ok(Json(generate_prompt(&sources, &req.content)))
}

// ---------- history / stats / export / import ----------

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    source_id: Option<u64>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn history(State(state): State<AppState>, Query(q): Query<HistoryQuery>) -> impl IntoResponse {
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.store.history(q.source_id, limit))
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.stats())
}

async fn export(State(state): State<AppState>) -> ApiResult<Response> {
    let body = state
        .store
        .export()
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn import(State(state): State<AppState>, body: String) -> ApiResult<Json<serde_json::Value>> {
    let imported = state.store.import(&body)?;
    m::set_source_count(state.store.len());
    Ok(Json(json!({ "imported": imported })))
}

// ---------- inbound webhook ----------

/// Source systems ping `/webhook/{source_id}` when they publish. The call is logged and
/// counted; when `[webhook].inbound_secret` is set the caller must echo it in
/// `X-Webhook-Secret`.
async fn inbound_webhook(
    State(state): State<AppState>,
    Path(source_id): Path<u64>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<serde_json::Value>> {
    let source = state
        .store
        .get(source_id)
        .ok_or(SourceError::NotFound(source_id))?;

    let secret = &state.config.webhook.inbound_secret;
    if !secret.is_empty() {
        let given = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if given != secret {
            warn!(source = %source.slug, "inbound webhook with bad secret");
            return Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "invalid webhook secret",
            ));
        }
    }

    info!(source = %source.slug, bytes = body.len(), "inbound webhook");
    m::record_webhook_received();
    Ok(Json(json!({ "success": true, "message": "Webhook processed" })))
}
