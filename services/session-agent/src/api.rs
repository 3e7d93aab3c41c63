//! Session agent HTTP API
//!
//! Exposes the session manager to local callers. The bearer credential never
//! leaves the agent: responses carry the principal, the lifecycle flags and
//! the credential's expiry and fingerprint, nothing else.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::Secret;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use session_auth::{LoginRequest, Principal, ProfilePatch, RegisterRequest};
use session_lifecycle::{AuthStatus, Error, LifecycleFlags, SessionManager};
use tracing::warn;

use crate::metrics;

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the axum router with all routes and shared state.
///
/// `max_connections` caps concurrently served requests.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/session", get(session_handler))
        .route("/session/login", post(login_handler))
        .route("/session/register", post(register_handler))
        .route("/session/refresh", post(refresh_handler))
        .route("/session/logout", post(logout_handler))
        .route(
            "/session/profile",
            get(profile_handler).patch(update_profile_handler),
        )
        .route_layer(middleware::from_fn(track_requests))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// What callers see of the session.
#[derive(Debug, Serialize)]
struct SessionView {
    status: AuthStatus,
    flags: LifecycleFlags,
    principal: Option<Principal>,
    /// Credential expiry, unix seconds
    expires_at: Option<i64>,
    fingerprint: Option<String>,
}

impl SessionView {
    fn of(manager: &SessionManager) -> Self {
        let credential = manager.credential();
        let expires_at = credential
            .as_ref()
            .and_then(|c| session_auth::decode(c.expose()).ok())
            .map(|claims| claims.expiry);
        Self {
            status: manager.status(),
            flags: manager.flags(),
            principal: manager.principal(),
            expires_at,
            fingerprint: credential.map(|c| c.fingerprint()),
        }
    }
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RegisterBody {
    email: String,
    password: String,
    name: String,
}

/// Session error rendered as `{"error":{"type","message","request_id"}}`.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl ApiError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            Error::Validation { status, .. } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST),
                "validation_error",
            ),
            Error::TerminalAuth(_) => (StatusCode::UNAUTHORIZED, "authentication_error"),
            Error::TerminalLogout => (StatusCode::UNAUTHORIZED, "logged_out"),
            Error::NotAuthenticated => (StatusCode::UNAUTHORIZED, "not_authenticated"),
            Error::Transient(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            Error::RefreshTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "refresh_timeout"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_type();
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        // Validation messages come from the server and go back verbatim.
        let message = match &self.0 {
            Error::Validation { message, .. } => message.clone(),
            other => other.to_string(),
        };
        warn!(
            request_id = %request_id,
            status = status.as_u16(),
            error = %self.0,
            "session request failed"
        );

        let body = serde_json::json!({
            "error": {
                "type": kind,
                "message": message,
                "request_id": request_id,
            }
        });
        (status, Json(body)).into_response()
    }
}

async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let response = next.run(request).await;
    metrics::record_request(&route, response.status().as_u16());
    response
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "session": state.manager.status().label(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// Prometheus metrics endpoint, text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}

async fn session_handler(State(state): State<AppState>) -> Json<SessionView> {
    Json(SessionView::of(&state.manager))
}

async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<SessionView>, ApiError> {
    let request = LoginRequest {
        email: body.email,
        password: Secret::from(body.password),
    };
    state.manager.login(request).await?;
    Ok(Json(SessionView::of(&state.manager)))
}

async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Json<SessionView>, ApiError> {
    let request = RegisterRequest {
        email: body.email,
        password: Secret::from(body.password),
        name: body.name,
    };
    state.manager.register(request).await?;
    Ok(Json(SessionView::of(&state.manager)))
}

async fn refresh_handler(State(state): State<AppState>) -> Result<Json<SessionView>, ApiError> {
    state.manager.refresh().await?;
    Ok(Json(SessionView::of(&state.manager)))
}

async fn logout_handler(State(state): State<AppState>) -> StatusCode {
    state.manager.logout().await;
    StatusCode::NO_CONTENT
}

async fn profile_handler(State(state): State<AppState>) -> Result<Json<Principal>, ApiError> {
    Ok(Json(state.manager.fetch_profile().await?))
}

async fn update_profile_handler(
    State(state): State<AppState>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Principal>, ApiError> {
    if patch.is_empty() {
        return Err(Error::Validation {
            status: 400,
            message: "profile patch has no fields".into(),
        }
        .into());
    }
    Ok(Json(state.manager.update_profile(patch).await?))
}
