//! HTTP routing configuration with authentication and rate limiting.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::app::AppState;

use super::handlers::{
    accounts_handler, add_chain_handler, balance_handler, chain_id_handler, health_check_handler,
    liveness_handler, login_handler, logout_handler, metrics_handler, private_key_handler,
    readiness_handler, send_transaction_handler, sign_message_handler, switch_chain_handler,
    verify_signature_handler,
};
use super::middleware::{
    RateLimitConfig, RateLimitState, auth_middleware, rate_limit_health_middleware,
    rate_limit_rpc_middleware, spawn_pruning,
};

/// Sending a transaction waits for inclusion, so requests may run long.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const MAX_BODY_BYTES: usize = 64 * 1024;
const RATE_LIMIT_PRUNE_PERIOD: Duration = Duration::from_secs(60);

fn rpc_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chain-id", get(chain_id_handler))
        .route("/accounts", get(accounts_handler))
        .route("/balance", get(balance_handler))
        .route("/sign-message", post(sign_message_handler))
        .route("/send-transaction", post(send_transaction_handler))
        .route("/private-key", post(private_key_handler))
        .route("/verify-signature", post(verify_signature_handler))
}

fn chain_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(add_chain_handler))
        .route("/switch", post(switch_chain_handler))
}

fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check_handler))
        .route("/live", get(liveness_handler))
        .route("/ready", get(readiness_handler))
}

fn common_layers(router: Router<Arc<AppState>>, app_state: Arc<AppState>) -> Router {
    let layers = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Timeout needs a `Default` response body, so it sits inside the body limit.
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ));

    router
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&app_state),
            auth_middleware,
        ))
        .layer(layers)
        .with_state(app_state)
}

/// Create router without rate limiting
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let router = Router::new()
        .nest("/rpc", rpc_routes())
        .nest("/chains", chain_routes())
        .nest("/session", session_routes())
        .nest("/health", health_routes());

    common_layers(router, app_state)
}

/// Create router with per-IP rate limiting enabled
pub fn create_router_with_rate_limit(app_state: Arc<AppState>, config: RateLimitConfig) -> Router {
    let rate_limit_state = Arc::new(RateLimitState::new(config));
    spawn_pruning(&rate_limit_state, RATE_LIMIT_PRUNE_PERIOD);
    let rpc_limit = || {
        middleware::from_fn_with_state(Arc::clone(&rate_limit_state), rate_limit_rpc_middleware)
    };

    let router = Router::new()
        .nest("/rpc", rpc_routes().layer(rpc_limit()))
        .nest("/chains", chain_routes().layer(rpc_limit()))
        .nest("/session", session_routes().layer(rpc_limit()))
        .nest(
            "/health",
            health_routes().layer(middleware::from_fn_with_state(
                Arc::clone(&rate_limit_state),
                rate_limit_health_middleware,
            )),
        );

    common_layers(router, app_state)
}
