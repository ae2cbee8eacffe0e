//! HTTP request handlers.
//!
//! RPC handlers answer with the [`RpcResult`] contract; the HTTP status is
//! derived from the failure kind so clients can branch on either.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use secrecy::ExposeSecret;
use tracing::{error, info};
use validator::Validate;

use crate::app::AppState;
use crate::domain::{
    AppError, ChainConfig, ChainId, ErrorDetail, ErrorResponse, HealthResponse, HealthStatus,
    RpcErrorKind, RpcResult, SessionResponse, SwitchChainRequest, VerifySignatureRequest,
};

/// Current chain id as a decimal string
pub async fn chain_id_handler(State(state): State<Arc<AppState>>) -> RpcResult {
    state.service.get_chain_id().await
}

/// Accounts exposed by the provider
pub async fn accounts_handler(State(state): State<Arc<AppState>>) -> RpcResult {
    state.service.get_accounts().await
}

/// Ether balance of the first account
pub async fn balance_handler(State(state): State<Arc<AppState>>) -> RpcResult {
    state.service.get_balance().await
}

/// Sign the demo message with the first account
pub async fn sign_message_handler(State(state): State<Arc<AppState>>) -> RpcResult {
    state.service.sign_message().await
}

/// Send the demo self-transfer and wait for its receipt
pub async fn send_transaction_handler(State(state): State<Arc<AppState>>) -> RpcResult {
    state.service.send_transaction().await
}

/// Export the provider's private key
pub async fn private_key_handler(State(state): State<Arc<AppState>>) -> RpcResult {
    state
        .service
        .get_private_key()
        .await
        .map(|key| key.expose_secret().to_string())
        .into()
}

/// Recover the signer of a personal message
pub async fn verify_signature_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifySignatureRequest>,
) -> RpcResult {
    state
        .service
        .recover_signer(&payload.message, &payload.signature)
        .await
}

/// Register a chain with the provider
pub async fn add_chain_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChainConfig>,
) -> Result<RpcResult, AppError> {
    payload.validate()?;
    Ok(state.service.add_chain(&payload).await)
}

/// Switch the provider to a registered chain
pub async fn switch_chain_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SwitchChainRequest>,
) -> Result<RpcResult, AppError> {
    let chain_id: ChainId = payload.chain_id.parse()?;
    Ok(state.service.switch_chain(chain_id).await)
}

/// Reconnect the configured provider
pub async fn login_handler(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    state.service.connect(Arc::clone(&state.wallet_provider));
    Json(SessionResponse {
        connected: state.service.is_connected(),
    })
}

/// Drop the session's provider
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    state.service.disconnect();
    info!("Session logged out");
    Json(SessionResponse {
        connected: state.service.is_connected(),
    })
}

/// Detailed health check
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let health = state.service.health_check().await;
    Json(health)
}

/// Kubernetes liveness probe
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    let health = state.service.health_check().await;
    match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded | HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Prometheus scrape endpoint
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// HTTP status for a failed facade operation.
#[must_use]
pub fn status_for_kind(kind: RpcErrorKind) -> StatusCode {
    match kind {
        RpcErrorKind::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
        RpcErrorKind::ProviderRejected => StatusCode::BAD_GATEWAY,
        RpcErrorKind::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
        RpcErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for RpcResult {
    fn into_response(self) -> axum::response::Response {
        let status = match self.failure() {
            Some(failure) => status_for_kind(failure.kind),
            None => StatusCode::OK,
        };
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type, message) = match self {
            AppError::Rpc(err) => return RpcResult::from(err).into_response(),
            AppError::Config(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "configuration_error",
                e.to_string(),
            ),
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
            AppError::Authentication(msg) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                format!("Authentication failed: {}", msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                format!("Internal error: {}", msg),
            ),
        };

        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                r#type: error_type.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
