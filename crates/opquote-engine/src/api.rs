//! REST API for the pricing engine
//!
//! JSON mirror of the gRPC surface plus health and Prometheus endpoints.
//! Byte fields travel as hex strings.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use opquote_common::{OpQuoteError, QuoteRequest, RejectionReason, SignedQuote, VERSION};
use prometheus::Registry;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::metrics::encode_text;
use crate::pow::ProofOfWorkChallenge;
use crate::quote::QuoteService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<QuoteService>,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(service: Arc<QuoteService>, registry: Arc<Registry>) -> Self {
        Self { service, registry }
    }
}

/// Error body returned for every rejected request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: RejectionReason,
    pub message: String,
}

/// Rejection rendered as an HTTP response
pub struct ApiError(pub OpQuoteError);

impl From<OpQuoteError> for ApiError {
    fn from(err: OpQuoteError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let reason = self.0.rejection_reason();
        let status = status_for(reason);
        let body = ErrorBody {
            error: reason,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// HTTP status for a rejection reason
pub fn status_for(reason: RejectionReason) -> StatusCode {
    match reason {
        RejectionReason::InvalidProofOfWork => StatusCode::FORBIDDEN,
        RejectionReason::UnknownWorkload => StatusCode::NOT_FOUND,
        RejectionReason::UnknownResourceKind
        | RejectionReason::InvalidSecurityRange
        | RejectionReason::InvalidRequest => StatusCode::BAD_REQUEST,
        RejectionReason::InsufficientCapacity => StatusCode::TOO_MANY_REQUESTS,
        RejectionReason::SigningFailure | RejectionReason::InternalComputationError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Operator identity and gate parameters
#[derive(Debug, Serialize, Deserialize)]
pub struct OperatorInfo {
    pub operator_id: String,
    pub operator_did: String,
    pub version: String,
    pub difficulty_bits: u8,
    pub window_secs: u64,
    pub quote_validity_secs: u64,
    pub max_ttl_blocks: u64,
    pub cached_benchmarks: usize,
}

/// Challenge plus the window length a client needs to plan ahead
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeBody {
    #[serde(flatten)]
    pub challenge: ProofOfWorkChallenge,
    pub window_secs: u64,
}

/// Build the REST router
pub fn router(state: AppState) -> Router {
    // CORS layer to allow browser clients from any origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health))
        .route("/v1/operator", get(operator_info))
        .route("/v1/challenge/:workload_id", get(challenge))
        .route("/v1/price", post(get_price))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "opquote",
        "version": VERSION,
    }))
}

async fn operator_info(State(state): State<AppState>) -> Json<OperatorInfo> {
    let service = &state.service;
    Json(OperatorInfo {
        operator_id: hex::encode(service.signer().operator_id()),
        operator_did: service.signer().operator_did(),
        version: VERSION.to_string(),
        difficulty_bits: service.pow_settings().difficulty_bits,
        window_secs: service.pow_settings().window_secs,
        quote_validity_secs: service.settings().validity_secs,
        max_ttl_blocks: service.settings().max_ttl_blocks,
        cached_benchmarks: service.benchmarks().len(),
    })
}

async fn challenge(
    State(state): State<AppState>,
    Path(workload_id): Path<u64>,
) -> Json<ChallengeBody> {
    Json(ChallengeBody {
        challenge: state.service.challenge(workload_id),
        window_secs: state.service.pow_settings().window_secs,
    })
}

async fn get_price(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<SignedQuote>, ApiError> {
    let quote = state.service.get_price(&request)?;
    Ok(Json(quote))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match encode_text(&state.registry) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
