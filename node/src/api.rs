//! # REST API
//!
//! Builds the axum router that exposes the gateway. All endpoints share
//! application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path             | Description                                  |
//! |--------|------------------|----------------------------------------------|
//! | POST   | `/agreement`     | Register an agreement and fund the counterparty |
//! | GET    | `/health`        | Liveness probe                               |
//! | GET    | `/status`        | Identity, nonce, and gap ledger summary      |
//! | POST   | `/admin/resync`  | Re-seed the nonce counter from the node      |
//!
//! ## Status codes for `/agreement`
//!
//! | Outcome                                | Status |
//! |----------------------------------------|--------|
//! | Both transactions accepted             | 200    |
//! | Malformed body, missing/invalid fields | 400    |
//! | Signing failure                        | 500    |
//! | Node rejected a transaction            | 502    |
//! | Dispatcher halted on burned nonces     | 503    |
//! | Node did not answer in time            | 504    |

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use accord_protocol::agreement::AgreementRequest;
use accord_protocol::dispatch::{
    DispatchError, DispatchReport, DispatchResult, DispatchStage, Dispatcher, DispatcherStatus,
    Outcome,
};
use accord_protocol::ledger::RejectReason;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone; everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The gateway's reported version string.
    pub version: String,
    /// The dispatch core, shared by every request.
    pub dispatcher: Arc<Dispatcher>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
    /// Bearer token for `/admin/*`. `None` leaves admin routes open.
    pub admin_token: Option<Arc<str>>,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .max_age(Duration::from_secs(300));

    Router::new()
        .route("/agreement", post(agreement_handler))
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/admin/resync", post(resync_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Body of every `/agreement` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgreementResponse {
    /// `"ok"` or `"error"`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<DispatchStage>,
    /// Machine-readable failure label, e.g. `insufficient-funds`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Per-transaction results in submission order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<DispatchResult>,
}

impl AgreementResponse {
    fn refused(reason: &str, detail: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            request_id: None,
            stage: None,
            reason: Some(reason.into()),
            detail: Some(detail.into()),
            results: Vec::new(),
        }
    }

    fn from_report(report: DispatchReport) -> (StatusCode, Self) {
        let request_id = Some(report.request_id.to_string());
        let stage = Some(report.stage);

        if report.is_complete() {
            return (
                StatusCode::OK,
                Self {
                    status: "ok".into(),
                    request_id,
                    stage,
                    reason: None,
                    detail: None,
                    results: report.results,
                },
            );
        }

        let (reason, detail) = match report.failure().map(|r| &r.outcome) {
            Some(Outcome::Rejected { reason, detail }) => (*reason, detail.clone()),
            _ => (RejectReason::RejectedByNode, String::new()),
        };
        let code = match reason {
            RejectReason::Timeout => StatusCode::GATEWAY_TIMEOUT,
            RejectReason::SigningFailed => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };

        (
            code,
            Self {
                status: "error".into(),
                request_id,
                stage,
                reason: Some(reason.as_str().into()),
                detail: Some(detail),
                results: report.results,
            },
        )
    }
}

/// Response for `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub protocol_version: String,
    #[serde(flatten)]
    pub dispatcher: DispatcherStatus,
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /agreement`: validate, dispatch, translate the outcome.
async fn agreement_handler(
    State(state): State<AppState>,
    payload: Result<Json<AgreementRequest>, JsonRejection>,
) -> Response {
    state.metrics.agreements_received_total.inc();

    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "unparseable agreement request");
            return (
                StatusCode::BAD_REQUEST,
                Json(AgreementResponse::refused(
                    "invalid-request",
                    "account and agreement need to be set",
                )),
            )
                .into_response();
        }
    };

    let outcome = state.dispatcher.dispatch(&request).await;
    state.metrics.observe_sequencer(&state.dispatcher.status());

    let (code, body) = match outcome {
        Ok(report) => {
            state.metrics.observe_report(&report);
            AgreementResponse::from_report(report)
        }
        Err(err @ DispatchError::InvalidRequest(_)) => (
            StatusCode::BAD_REQUEST,
            AgreementResponse::refused("invalid-request", err.to_string()),
        ),
        Err(err @ DispatchError::SequencerHalted { .. }) => (
            StatusCode::SERVICE_UNAVAILABLE,
            AgreementResponse::refused("sequencer-halted", err.to_string()),
        ),
        Err(err @ DispatchError::Signing(_)) => {
            tracing::error!(error = %err, "signing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                AgreementResponse::refused("signing-failed", err.to_string()),
            )
        }
    };

    (code, Json(body)).into_response()
}

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let dispatcher = state.dispatcher.status();
    state.metrics.observe_sequencer(&dispatcher);

    Json(StatusResponse {
        version: state.version.clone(),
        protocol_version: accord_protocol::config::PROTOCOL_VERSION.to_string(),
        dispatcher,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /admin/resync`: re-read the pending nonce and reset the sequencer.
async fn resync_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(expected) = state.admin_token.as_deref() {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "status": "error", "reason": "unauthorized" })),
            )
                .into_response();
        }
    }

    match state.dispatcher.resync().await {
        Ok(report) => {
            state.metrics.observe_sequencer(&state.dispatcher.status());
            tracing::info!(
                previous = report.previous,
                current = report.current,
                cleared = report.cleared.len(),
                "operator resync"
            );
            (StatusCode::OK, Json(serde_json::json!({ "status": "ok", "resync": report })))
                .into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "resync failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "status": "error",
                    "reason": err.reason().as_str(),
                    "detail": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
