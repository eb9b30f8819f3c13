/**
 * DASHBOARD API - HTTP surface of the kernel
 *
 * ROLE:
 * Serves the aggregator's read-only view to the dashboard frontend, the login
 * gate in front of it, and the natural-language query endpoint.
 *
 * ROUTES:
 * - public: /health, /system/health, /api/login, /api/check-auth
 * - session required: /api/logout, /api/dashboard*, /api/events, /api/query
 *
 * SECURITY:
 * - `Authorization: Bearer <token>` checked by middleware before the handler
 * - rejected attempts are logged, errors are JSON `{ "message": ... }`
 */

use crate::aggregator::LiveAggregator;
use crate::auth::{bearer_token, AuthError, SessionStore, UserInfo};
use crate::health::{HealthTracker, KernelHealth};
use crate::models::{DashboardView, DetectionLog, WeatherState};
use crate::query::{QueryError, QueryRequest, QueryResponse, QueryService};
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<LiveAggregator>,
    pub sessions: SessionStore,
    pub query: Arc<QueryService>,
    pub health_tracker: HealthTracker,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("unknown camera: {0}")]
    UnknownCamera(String),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::UnknownCamera(_) => StatusCode::NOT_FOUND,
            ApiError::Query(QueryError::EmptyQuery) => StatusCode::BAD_REQUEST,
            ApiError::Query(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "message": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    message: &'static str,
    user: UserInfo,
}

#[derive(Debug, Serialize)]
struct CameraView {
    id: String,
    url: String,
    connected: bool,
}

pub fn build_router(app_state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/logout", post(logout))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/dashboard/cameras", get(get_cameras))
        .route("/api/dashboard/logs/{camera_id}", get(get_camera_logs))
        .route("/api/dashboard/weather", get(get_weather))
        .route("/api/events", get(stream_events))
        .route("/api/query", post(run_query))
        .route_layer(middleware::from_fn_with_state(app_state.clone(), require_session));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/api/login", post(login))
        .route("/api/check-auth", get(check_auth))
        .merge(protected)
        .with_state(app_state)
}

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok())
}

async fn require_session(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    let checked = bearer_token(authorization(req.headers())).and_then(|token| app.sessions.check(token));
    if let Err(e) = &checked {
        warn!(path = %req.uri().path(), error = %e, "unauthorized request");
    }
    checked?;
    Ok(next.run(req).await)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.aggregator, &app.sessions))
}

// POST /api/login
async fn login(
    State(app): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let session = app.sessions.login(&body.username, &body.password)?;
    Ok(Json(LoginResponse { token: session.token, message: "Login successful", user: session.user }))
}

// GET /api/check-auth
async fn check_auth(State(app): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    let token = bearer_token(authorization(&headers))?;
    let session = app.sessions.check(token)?;
    Ok(Json(serde_json::json!({ "message": "Authenticated", "user": session.user })))
}

// POST /api/logout
async fn logout(State(app): State<AppState>, headers: HeaderMap) -> Json<serde_json::Value> {
    if let Ok(token) = bearer_token(authorization(&headers)) {
        app.sessions.logout(token);
    }
    Json(serde_json::json!({ "message": "Logged out" }))
}

// GET /api/dashboard
async fn get_dashboard(State(app): State<AppState>) -> Json<DashboardView> {
    Json(app.aggregator.snapshot())
}

// GET /api/dashboard/cameras
async fn get_cameras(State(app): State<AppState>) -> Json<Vec<CameraView>> {
    let status = app.aggregator.connectivity();
    let cameras = app
        .aggregator
        .cameras()
        .iter()
        .map(|c| CameraView {
            id: c.id.clone(),
            url: c.url.clone(),
            connected: status.get(&c.id).copied().unwrap_or(false),
        })
        .collect();
    Json(cameras)
}

// GET /api/dashboard/logs/{camera_id}
async fn get_camera_logs(
    State(app): State<AppState>,
    Path(camera_id): Path<String>,
) -> Result<Json<Vec<DetectionLog>>, ApiError> {
    app.aggregator
        .camera_logs(&camera_id)
        .map(Json)
        .ok_or(ApiError::UnknownCamera(camera_id))
}

// GET /api/dashboard/weather
async fn get_weather(State(app): State<AppState>) -> Json<WeatherState> {
    Json(app.aggregator.weather())
}

// GET /api/events
async fn stream_events(State(app): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = app.aggregator.subscribe();
    info!("event stream opened");
    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let sse = Event::default().event(event.kind()).json_data(&event);
                    match sse {
                        Ok(sse) => return Some((Ok::<_, Infallible>(sse), rx)),
                        Err(e) => warn!(error = %e, "event not serializable"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagging"),
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

// POST /api/query
async fn run_query(
    State(app): State<AppState>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    Ok(Json(app.query.run(&body.query).await?))
}
