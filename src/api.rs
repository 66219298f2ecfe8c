//! HTTP API for the ohmytasks gateway
//!
//! Thin authenticated proxy in front of the upstream task API: clients
//! authenticate with a Bearer token, name the owner email explicitly (there
//! is no session layer here), and get normalized payloads back whatever the
//! upstream responded with.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::client::{UpstreamClient, UpstreamError};
use crate::config::Config;
use crate::models::{Task, TaskDraft, TaskId};
use crate::settings::{UserSettings, normalize_settings};

/// Application state shared across handlers
pub struct AppState {
    pub client: UpstreamClient,
    pub config: Config,
}

impl AppState {
    pub fn new(client: UpstreamClient, config: Config) -> Arc<Self> {
        Arc::new(Self { client, config })
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/tasks",
            get(list_tasks)
                .post(create_task)
                .put(update_task)
                .delete(delete_task),
        )
        .route("/api/settings", get(get_settings).post(save_settings))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint (no auth required)
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "ohmytasks",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Auth middleware - validates Bearer token
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    // Skip auth for health check
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(h) if h.starts_with("Bearer ") => &h[7..],
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Missing or invalid Authorization header" })),
            )
                .into_response();
        }
    };

    // Validate token
    if !state.config.validate_token(token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid API token" })),
        )
            .into_response();
    }

    next.run(request).await
}

#[derive(Deserialize)]
struct ListQuery {
    email: Option<String>,
    /// Opt out of the freshness window with `?cache=false`.
    cache: Option<bool>,
}

#[derive(Deserialize)]
struct IdQuery {
    id: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct EmailQuery {
    email: Option<String>,
}

fn required<'a>(value: &'a Option<String>, message: &'static str) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(message)),
    }
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let email = required(&query.email, "Missing email")?;
    let fetched = state
        .client
        .fetch_tasks(Some(email), query.cache.unwrap_or(true))
        .await?;
    Ok(Json(fetched.tasks))
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let email = body
        .get("email")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .ok_or(ApiError::BadRequest("Missing email"))?
        .to_string();
    let draft: TaskDraft = serde_json::from_value(body)
        .map_err(|_| ApiError::BadRequest("Invalid task payload"))?;

    let created = state.client.create_task(&email, &draft).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
    Json(body): Json<Value>,
) -> Result<Json<Task>, ApiError> {
    let id = required(&query.id, "Missing id")?;
    let email = required(&query.email, "Missing email")?;
    if !body.is_object() {
        return Err(ApiError::BadRequest("Invalid task payload"));
    }

    let updated = state
        .client
        .update_task(email, &TaskId::from(id), body)
        .await?;
    Ok(Json(updated))
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, ApiError> {
    let id = required(&query.id, "Missing id")?;
    let email = required(&query.email, "Missing email")?;

    state.client.delete_task(email, &TaskId::from(id)).await?;
    Ok(Json(json!({ "success": true })))
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<UserSettings>, ApiError> {
    let email = required(&query.email, "Missing email")?;
    let settings = state.client.fetch_settings(email).await?;
    Ok(Json(settings))
}

async fn save_settings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
    Json(body): Json<Value>,
) -> Result<Json<UserSettings>, ApiError> {
    let email = required(&query.email, "Missing email")?;
    let settings = normalize_settings(&body);
    let saved = state.client.save_settings(email, &settings).await?;
    Ok(Json(saved))
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Upstream(UpstreamError),
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        Self::Upstream(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ApiError::Upstream(err) => upstream_error_response(err),
        }
    }
}

/// Upstream statuses pass through so clients can tell a 404 from an outage.
fn upstream_error_response(error: UpstreamError) -> Response {
    match error {
        UpstreamError::Status { status, body } => {
            tracing::error!(status, "upstream error");
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            (
                code,
                Json(json!({ "error": "Upstream error", "details": body })),
            )
        }
        UpstreamError::Rejected { message } => {
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": message })))
        }
        UpstreamError::Http(err) => {
            tracing::error!(error = %err, "upstream unreachable");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Upstream unreachable" })),
            )
        }
        UpstreamError::MissingEmail => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Email is required" })),
        ),
        UpstreamError::SettingsNotConfigured => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Settings endpoint not configured" })),
        ),
    }
    .into_response()
}
