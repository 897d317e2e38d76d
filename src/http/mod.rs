use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::dispatch::RequestDispatcher;
use crate::error::RelayError;
use crate::ledger::Address;
use crate::params::ModifierKind;
use crate::pool::PoolStats;
use crate::queue::{JobRecord, QueueStats};

#[derive(Clone)]
pub struct HttpState {
    pub requests: Arc<RequestDispatcher>,
}

#[derive(Deserialize)]
struct BuyModifierRequest {
    address: String,
}

#[derive(Serialize)]
struct BuyModifierResponse {
    #[serde(rename = "type")]
    kind: ModifierKind,
    value: u8,
}

#[derive(Deserialize)]
struct ParticipateRequest {
    address: String,
    auction: u64,
    password: String,
}

#[derive(Serialize)]
struct ParticipateResponse {
    number: u32,
}

#[derive(Serialize)]
struct PoolStatusResponse {
    pool: PoolStats,
    queue: QueueStats,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the relayer's routes. Exposed so tests can drive the router
/// directly with `tower::ServiceExt::oneshot`.
pub fn router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/buyModifier", post(buy_modifier_handler))
        .route("/participateRandomAuction", post(participate_handler))
        .route("/participateRandom", post(participate_handler))
        .route("/api/pool", get(pool_status_handler))
        .route("/api/jobs", get(list_jobs_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_http(
    addr: SocketAddr,
    state: HttpState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

fn failure_response(error: RelayError) -> Response {
    match error {
        RelayError::MalformedRequest(message) => bad_request(message),
        other => {
            tracing::error!(error = %other, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn buy_modifier_handler(
    State(state): State<HttpState>,
    Json(payload): Json<BuyModifierRequest>,
) -> Response {
    let owner: Address = match payload.address.parse() {
        Ok(addr) => addr,
        Err(e) => return bad_request(format!("{}", e)),
    };

    match state.requests.buy_modifier(owner).await {
        Ok(purchase) => (
            StatusCode::OK,
            Json(BuyModifierResponse {
                kind: purchase.kind,
                value: purchase.value,
            }),
        )
            .into_response(),
        Err(e) => failure_response(e),
    }
}

async fn participate_handler(
    State(state): State<HttpState>,
    Json(payload): Json<ParticipateRequest>,
) -> Response {
    let participant: Address = match payload.address.parse() {
        Ok(addr) => addr,
        Err(e) => return bad_request(format!("{}", e)),
    };

    match state
        .requests
        .participate_random_auction(participant, payload.auction, payload.password)
        .await
    {
        Ok(participation) => (
            StatusCode::OK,
            Json(ParticipateResponse {
                number: participation.number,
            }),
        )
            .into_response(),
        Err(e) => failure_response(e),
    }
}

async fn pool_status_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let queue = state.requests.queue();
    Json(PoolStatusResponse {
        pool: queue.pool().stats(),
        queue: queue.stats(),
    })
}

async fn list_jobs_handler(State(state): State<HttpState>) -> impl IntoResponse {
    let jobs: Vec<JobRecord> = state.requests.queue().jobs().await;
    Json(jobs)
}
