//! Inbound HTTP API
//!
//! Every endpoint sits behind a shared-secret bearer check, and nothing
//! reaches a handler before that check passes. Handlers only delegate to the
//! sync engine, registry and runtime; they never mutate state themselves.
//!
//! | Method | Path                     | Handler          |
//! |--------|--------------------------|------------------|
//! | GET    | `/api/player/{username}` | [`player_exists`]|
//! | GET    | `/api/players`           | [`list_players`] |
//! | POST   | `/api/apply-rank`        | [`apply_rank`]   |
//! | GET    | `/api/status`            | [`status`]       |
//! | POST   | `/api/resync`            | [`resync`]       |
//!
//! `OPTIONS` on any path answers 204 with CORS headers.

use crate::context::AppContext;
use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use shared::{
    normalize_username, ApplyRankRequest, ApplyRankResponse, ErrorBody, PlayerEntry,
    PlayerExistsResponse, PlayerList, ResyncRequest, ResyncResponse, StatusResponse,
    BEARER_PREFIX, METHOD_NOT_ALLOWED, MISSING_FIELDS, UNAUTHORIZED,
};
use std::sync::Arc;
use tokio::net::TcpListener;

pub type SharedContext = Arc<AppContext>;

/// Errors surfaced to API callers.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    BadRequest(String),
    NotFound(String),
    MethodNotAllowed,
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, UNAUTHORIZED.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED.to_string())
            }
            ApiError::Internal(message) => {
                error!("Internal error while handling request: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Internal server error: {}", message),
                )
            }
        };

        (status, Json(ErrorBody::new(message))).into_response()
    }
}

pub fn router(context: SharedContext) -> Router {
    Router::new()
        .route(
            "/api/player/{username}",
            get(player_exists).fallback(method_not_allowed),
        )
        .route("/api/players", get(list_players).fallback(method_not_allowed))
        .route("/api/apply-rank", post(apply_rank).fallback(method_not_allowed))
        .route("/api/status", get(status).fallback(method_not_allowed))
        .route("/api/resync", post(resync).fallback(method_not_allowed))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&context),
            require_bearer,
        ))
        .layer(middleware::from_fn(cors))
        .with_state(context)
}

/// Serves the API on `listener` until the future is dropped.
pub async fn serve(listener: TcpListener, context: SharedContext) -> std::io::Result<()> {
    info!("API Server started on {}", listener.local_addr()?);
    axum::serve(listener, router(context)).await
}

async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

async fn require_bearer(
    State(context): State<SharedContext>,
    request: Request,
    next: Next,
) -> Response {
    debug!("Received {} {}", request.method(), request.uri().path());

    if !is_authorized(request.headers(), context.api_key()) {
        warn!(
            "Invalid or missing Authorization header on {}",
            request.uri().path()
        );
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

fn is_authorized(headers: &HeaderMap, api_key: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .is_some_and(|provided| provided == api_key)
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Parses a JSON body regardless of its content type. An empty body yields
/// the type's default.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

pub async fn player_exists(
    State(context): State<SharedContext>,
    Path(username): Path<String>,
) -> Json<PlayerExistsResponse> {
    let username = normalize_username(&username);
    let exists = context.registry.contains(&username) || context.runtime.is_online(&username);
    debug!("Player {} exists: {}", username, exists);

    Json(PlayerExistsResponse { exists, username })
}

pub async fn list_players(State(context): State<SharedContext>) -> Json<PlayerList> {
    let players: Vec<PlayerEntry> = context
        .registry
        .all()
        .into_iter()
        .map(|username| PlayerEntry { username })
        .collect();
    debug!("Found {} known players", players.len());

    Json(PlayerList { players })
}

pub async fn apply_rank(
    State(context): State<SharedContext>,
    body: Bytes,
) -> Result<Json<ApplyRankResponse>, ApiError> {
    let request: ApplyRankRequest = parse_body(&body)?;
    let (username, rank) = request.validate().ok_or_else(|| {
        warn!("Invalid apply-rank request: {}", MISSING_FIELDS);
        ApiError::BadRequest(MISSING_FIELDS.to_string())
    })?;

    debug!("Applying rank. Username: {}, Rank: {}", username, rank);
    let success = context
        .engine
        .apply_globally(&username, &rank)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(ApplyRankResponse { success }))
}

pub async fn status(State(context): State<SharedContext>) -> Json<StatusResponse> {
    let runtime = &context.runtime;
    Json(StatusResponse {
        online: true,
        version: runtime.version(),
        players: runtime.online_count(),
        max_players: runtime.max_players(),
    })
}

pub async fn resync(
    State(context): State<SharedContext>,
    body: Bytes,
) -> Result<Json<ResyncResponse>, ApiError> {
    let request: ResyncRequest = parse_body(&body)?;

    let report = match request.server.as_deref() {
        Some(name) => {
            let backend = context
                .topology
                .require_backend(name)
                .map_err(|e| ApiError::NotFound(e.to_string()))?;
            context.engine.resync_backend(backend).await
        }
        None => context.engine.resync_all().await,
    };

    Ok(Json(ResyncResponse {
        success: report.is_success(),
        attempted: report.attempted,
        failed: report.failed,
    }))
}
