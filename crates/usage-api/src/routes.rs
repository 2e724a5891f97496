//! HTTP routes for the usage dashboard.
//!
//! Warehouse work runs on the blocking pool; handlers only parse input and
//! shape responses.

use crate::config::ApiConfig;
use crate::dashboard::{build_dashboard, DashboardRequest, DashboardView};
use crate::error::{ApiError, RequestId};
use crate::session::SessionStore;
use crate::usage_analytics::UsageService;
use axum::{
    extract::{Path, Query, Request, State},
    http::HeaderValue,
    middleware::{self, Next},
    response::{Html, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use dpusage_core::config::{
    DEFAULT_NAME_FILTER, DEFAULT_WINDOW_DAYS, SCHEMA_OPTIONS, TIME_WINDOW_OPTIONS,
};
use dpusage_core::validation::{parse_windows, validate_object_name, validate_session_id};
use dpusage_core::{SchemaChoice, UsageRow, UserUsageRow};
use dpusage_storage::WarehouseBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState<B: WarehouseBackend> {
    pub service: Arc<UsageService<B>>,
    pub sessions: SessionStore,
    pub top_n: usize,
}

impl<B: WarehouseBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            sessions: self.sessions.clone(),
            top_n: self.top_n,
        }
    }
}

impl<B: WarehouseBackend> AppState<B> {
    pub fn new(backend: B, config: &ApiConfig) -> Self {
        Self {
            service: Arc::new(UsageService::with_cache(
                Arc::new(backend),
                config.warehouse.database_name.clone(),
                config.cache_capacity,
                config.cache_ttl,
            )),
            sessions: SessionStore::new(config.max_sessions, config.session_ttl),
            top_n: config.top_n,
        }
    }
}

// ===== Request / Response Types =====

#[derive(Debug, Serialize, Deserialize)]
pub struct WindowOption {
    pub label: String,
    pub days: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub schemas: Vec<String>,
    pub windows: Vec<WindowOption>,
    pub default_schema: String,
    pub default_windows: Vec<u32>,
    pub default_filter: String,
    pub top_n: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsageParams {
    pub schema: Option<String>,
    /// Comma separated day counts; absent means the default window, empty
    /// means no window
    pub windows: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    pub schema: SchemaChoice,
    pub windows: Vec<u32>,
    pub rows: Vec<UsageRow>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserUsageResponse {
    pub full_object_name: String,
    pub users: Vec<UserUsageRow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub schema: Option<String>,
    pub windows: Option<String>,
    pub filter: Option<String>,
    pub multi_version: Option<String>,
    pub session: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub full_object_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectionResponse {
    pub session_id: String,
    pub selected: Option<String>,
}

// ===== Router =====

/// Build the application router
pub fn router<B: WarehouseBackend + 'static>(state: AppState<B>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/v1/options", get(options::<B>))
        .route("/api/v1/usage", get(usage::<B>))
        .route("/api/v1/products/{name}/users", get(product_users::<B>))
        .route("/api/v1/dashboard", get(dashboard::<B>))
        .route("/api/v1/sessions", post(create_session))
        .route(
            "/api/v1/sessions/{id}/selection",
            post(toggle_selection::<B>),
        )
        .fallback(not_found)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Tag every request with a fresh id, echoed in `x-request-id`
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Run warehouse work on the blocking pool
async fn run_blocking<T, F>(request_id: &RequestId, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> dpusage_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("Blocking task failed: {}", e), request_id))?
        .map_err(|e| ApiError::from_usage(e, request_id))
}

fn parse_schema(raw: Option<&str>, request_id: &RequestId) -> Result<SchemaChoice, ApiError> {
    raw.map(SchemaChoice::parse)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(|e| ApiError::from_usage(e, request_id))
}

fn parse_window_param(raw: Option<&str>, request_id: &RequestId) -> Result<Vec<u32>, ApiError> {
    match raw {
        None => Ok(vec![DEFAULT_WINDOW_DAYS]),
        Some(raw) => parse_windows(raw).map_err(|e| ApiError::from_usage(e, request_id)),
    }
}

fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "on" | "yes")
    )
}

// ===== Handlers =====

/// Embedded dashboard page
async fn index() -> Html<&'static str> {
    Html(include_str!("dashboard.html"))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Selector options and defaults
async fn options<B: WarehouseBackend + 'static>(
    State(state): State<AppState<B>>,
) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        schemas: SCHEMA_OPTIONS.iter().map(|s| s.to_string()).collect(),
        windows: TIME_WINDOW_OPTIONS
            .iter()
            .map(|(label, days)| WindowOption {
                label: label.to_string(),
                days: *days,
            })
            .collect(),
        default_schema: SchemaChoice::default().to_string(),
        default_windows: vec![DEFAULT_WINDOW_DAYS],
        default_filter: DEFAULT_NAME_FILTER.to_string(),
        top_n: state.top_n,
    })
}

/// Raw usage rows for a schema and window selection
async fn usage<B: WarehouseBackend + 'static>(
    State(state): State<AppState<B>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<UsageParams>,
) -> Result<Json<UsageResponse>, ApiError> {
    let schema = parse_schema(params.schema.as_deref(), &request_id)?;
    let windows = parse_window_param(params.windows.as_deref(), &request_id)?;

    let service = Arc::clone(&state.service);
    let query_windows = windows.clone();
    let rows = run_blocking(&request_id, move || {
        service.usage(&query_windows, schema)
    })
    .await?;

    Ok(Json(UsageResponse {
        schema,
        windows,
        rows: rows.to_vec(),
    }))
}

/// Per-user drill-down for one product
async fn product_users<B: WarehouseBackend + 'static>(
    State(state): State<AppState<B>>,
    Extension(request_id): Extension<RequestId>,
    Path(name): Path<String>,
) -> Result<Json<UserUsageResponse>, ApiError> {
    validate_object_name(&name).map_err(|e| ApiError::from_usage(e, &request_id))?;

    let service = Arc::clone(&state.service);
    let object_name = name.clone();
    let users = run_blocking(&request_id, move || service.users(&object_name)).await?;

    Ok(Json(UserUsageResponse {
        full_object_name: name,
        users: users.to_vec(),
    }))
}

/// Assembled dashboard state
async fn dashboard<B: WarehouseBackend + 'static>(
    State(state): State<AppState<B>>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<DashboardParams>,
) -> Result<Json<DashboardView>, ApiError> {
    let request = DashboardRequest {
        schema: parse_schema(params.schema.as_deref(), &request_id)?,
        windows: parse_window_param(params.windows.as_deref(), &request_id)?,
        filter: params
            .filter
            .unwrap_or_else(|| DEFAULT_NAME_FILTER.to_string()),
        multi_version: parse_flag(params.multi_version.as_deref()),
        top_n: state.top_n,
    };

    let selected = match params.session.as_deref() {
        Some(session_id) => {
            validate_session_id(session_id).map_err(|e| ApiError::from_usage(e, &request_id))?;
            state.sessions.selection(session_id)
        }
        None => None,
    };

    let service = Arc::clone(&state.service);
    let view = run_blocking(&request_id, move || {
        build_dashboard(&service, &request, selected.as_deref())
    })
    .await?;

    Ok(Json(view))
}

/// JSON 404 for unknown paths
async fn not_found(
    Extension(request_id): Extension<RequestId>,
    uri: axum::http::Uri,
) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()), &request_id)
}

/// Start a selection session
async fn create_session() -> Json<SessionResponse> {
    let session_id = SessionStore::new_session_id();
    info!(session_id = %session_id, "Created session");
    Json(SessionResponse { session_id })
}

/// Select a product, or clear the selection when it is already selected
async fn toggle_selection<B: WarehouseBackend + 'static>(
    State(state): State<AppState<B>>,
    Extension(request_id): Extension<RequestId>,
    Path(session_id): Path<String>,
    Json(body): Json<SelectionRequest>,
) -> Result<Json<SelectionResponse>, ApiError> {
    validate_object_name(&body.full_object_name)
        .map_err(|e| ApiError::from_usage(e, &request_id))?;

    let selected = state
        .sessions
        .toggle(&session_id, &body.full_object_name)
        .map_err(|e| ApiError::from_usage(e, &request_id))?;

    Ok(Json(SelectionResponse {
        session_id,
        selected,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("ON")));
        assert!(parse_flag(Some("1")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_parse_window_param() {
        let rid = RequestId::new();
        assert_eq!(parse_window_param(None, &rid).unwrap(), vec![90]);
        assert_eq!(parse_window_param(Some(""), &rid).unwrap(), Vec::<u32>::new());
        assert_eq!(parse_window_param(Some("7,30"), &rid).unwrap(), vec![7, 30]);
        assert!(parse_window_param(Some("x"), &rid).is_err());
    }

    #[test]
    fn test_parse_schema() {
        let rid = RequestId::new();
        assert_eq!(parse_schema(None, &rid).unwrap(), SchemaChoice::Both);
        assert_eq!(
            parse_schema(Some("interne"), &rid).unwrap(),
            SchemaChoice::Internal
        );
        assert!(parse_schema(Some("PUBLIC"), &rid).is_err());
    }
}
