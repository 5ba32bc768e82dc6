//! Stand-in for a backend server's rank listener.
//!
//! Accepts rank pushes on `/api/apply-rank`, checks the shared secret and
//! logs every grant. Useful for trying the proxy without a game server.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use clap::Parser;
use log::{info, warn};
use shared::{ApplyRankResponse, ErrorBody, RankPush, APPLY_RANK_PATH, BEARER_PREFIX};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// API port to listen on
    #[arg(short, long, default_value = "8114")]
    port: u16,

    /// Shared secret expected in the Authorization header
    #[arg(short, long, default_value = "your_secure_api_key_here")]
    key: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let app = Router::new()
        .route(APPLY_RANK_PATH, post(apply_rank))
        .with_state(Arc::new(args.key));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Mock backend listening on http://{}{}", address, APPLY_RANK_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

async fn apply_rank(
    State(key): State<Arc<String>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .is_some_and(|provided| provided == key.as_str());

    if !authorized {
        warn!("Rejected push with invalid credentials");
        return (StatusCode::UNAUTHORIZED, Json(ErrorBody::new("Unauthorized"))).into_response();
    }

    match serde_json::from_slice::<RankPush>(&body) {
        Ok(push) => {
            info!("Activating rank {} for player {}", push.rank, push.username);
            Json(ApplyRankResponse { success: true }).into_response()
        }
        Err(e) => {
            warn!("Rejected malformed push: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("Missing username or rank")),
            )
                .into_response()
        }
    }
}
