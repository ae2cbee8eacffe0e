//! HTTP middleware: API key authentication and per-client rate limiting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Method, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::app::AppState;
use crate::domain::{AppError, ErrorDetail, RateLimitResponse};

type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Constant-time comparison of two byte slices.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// API key authentication middleware.
///
/// POST requests must carry an `x-api-key` header matching the configured
/// key; the two are compared as SHA-256 digests in constant time. Other
/// methods pass through.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let Some(provided) = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
    else {
        warn!(path = %request.uri().path(), "API auth failed: missing x-api-key header");
        return AppError::Authentication("missing x-api-key header".to_string()).into_response();
    };

    let expected_hash = Sha256::digest(state.api_auth_key.expose_secret().as_bytes());
    let provided_hash = Sha256::digest(provided.as_bytes());

    if !constant_time_eq(expected_hash.as_slice(), provided_hash.as_slice()) {
        warn!(path = %request.uri().path(), "API auth failed: invalid x-api-key");
        return AppError::Authentication("invalid x-api-key".to_string()).into_response();
    }

    next.run(request).await
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for RPC endpoints
    pub rpc_rps: u32,
    /// Burst size for RPC endpoints
    pub rpc_burst: u32,
    /// Requests per second for health endpoints
    pub health_rps: u32,
    /// Burst size for health endpoints
    pub health_burst: u32,
    /// Key clients on `X-Forwarded-For` / `X-Real-IP`. Only safe behind a
    /// proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rpc_rps: 10,
            rpc_burst: 20,
            health_rps: 100,
            health_burst: 100,
            trust_proxy_headers: false,
        }
    }
}

fn quota(rps: u32, burst: u32) -> Quota {
    let rps = NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(rps);
    Quota::per_second(rps).allow_burst(burst)
}

/// Per-IP limiters shared by the rate limit middleware.
pub struct RateLimitState {
    rpc_limiter: KeyedLimiter,
    health_limiter: KeyedLimiter,
    config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            rpc_limiter: RateLimiter::dashmap(quota(config.rpc_rps, config.rpc_burst)),
            health_limiter: RateLimiter::dashmap(quota(config.health_rps, config.health_burst)),
            config,
        }
    }

    /// Drop limiter entries for clients that have been idle long enough to
    /// be indistinguishable from new ones.
    pub fn prune(&self) {
        self.rpc_limiter.retain_recent();
        self.rpc_limiter.shrink_to_fit();
        self.health_limiter.retain_recent();
        self.health_limiter.shrink_to_fit();
    }

    /// Number of clients currently tracked by the RPC bucket.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.rpc_limiter.len()
    }

    fn client_ip<B>(&self, request: &Request<B>) -> IpAddr {
        client_ip_from_request(request, self.config.trust_proxy_headers)
    }
}

/// Prune `state` every `period` until it is dropped.
///
/// Does nothing outside a tokio runtime.
pub fn spawn_pruning(state: &Arc<RateLimitState>, period: Duration) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        return;
    };
    let state: Weak<RateLimitState> = Arc::downgrade(state);
    runtime.spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match state.upgrade() {
                Some(state) => state.prune(),
                None => break,
            }
        }
    });
}

/// Client IP from the socket address, or from `X-Forwarded-For` /
/// `X-Real-IP` when `trust_proxy_headers` is set.
/// Unknown clients share the `0.0.0.0` bucket.
fn client_ip_from_request<B>(request: &Request<B>, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request) {
            return ip;
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn forwarded_ip<B>(request: &Request<B>) -> Option<IpAddr> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());
    forwarded.or_else(|| {
        request
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    })
}

fn rate_limited_response(limit: u32, retry_after: u64, message: &str) -> Response<Body> {
    let body = RateLimitResponse {
        error: ErrorDetail {
            r#type: "rate_limited".to_string(),
            message: message.to_string(),
        },
        retry_after,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(0u32));
    headers.insert("Retry-After", HeaderValue::from(retry_after));
    response
}

/// Rate limit middleware for RPC, chain and session endpoints
pub async fn rate_limit_rpc_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = rate_limit.client_ip(&request);
    let limit = rate_limit.config.rpc_rps;

    match rate_limit.rpc_limiter.check_key(&client_ip) {
        Ok(_) => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert("X-RateLimit-Limit", HeaderValue::from(limit));
            response
        }
        Err(not_until) => {
            let retry_after = not_until.wait_time_from(DefaultClock::default().now()).as_secs();
            warn!(client_ip = %client_ip, "RPC rate limit exceeded");
            rate_limited_response(
                limit,
                retry_after,
                "Rate limit exceeded. Please slow down your requests.",
            )
        }
    }
}

/// Rate limit middleware for health endpoints
pub async fn rate_limit_health_middleware(
    State(rate_limit): State<Arc<RateLimitState>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let client_ip = rate_limit.client_ip(&request);
    match rate_limit.health_limiter.check_key(&client_ip) {
        Ok(_) => next.run(request).await,
        Err(not_until) => {
            let retry_after = not_until.wait_time_from(DefaultClock::default().now()).as_secs();
            rate_limited_response(rate_limit.config.health_rps, retry_after, "Rate limit exceeded")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, middleware, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn dummy_handler() -> impl IntoResponse {
        StatusCode::OK
    }

    fn limited_app(config: RateLimitConfig) -> Router {
        limited_app_with_state(Arc::new(RateLimitState::new(config)))
    }

    fn limited_app_with_state(state: Arc<RateLimitState>) -> Router {
        Router::new()
            .route("/", get(dummy_handler))
            .layer(middleware::from_fn_with_state(
                state,
                rate_limit_rpc_middleware,
            ))
    }

    fn get_from(ip: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/");
        if let Some(ip) = ip {
            builder = builder.header("X-Forwarded-For", ip);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn from_peer(peer: &str, forwarded: &str) -> Request<Body> {
        let mut request = get_from(Some(forwarded));
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn test_rate_limit_config_default() {
        let config = RateLimitConfig::default();
        assert_eq!(config.rpc_rps, 10);
        assert_eq!(config.rpc_burst, 20);
        assert_eq!(config.health_rps, 100);
        assert_eq!(config.health_burst, 100);
    }

    #[test]
    fn test_zero_quota_does_not_panic() {
        let _state = RateLimitState::new(RateLimitConfig {
            rpc_rps: 0,
            rpc_burst: 0,
            health_rps: 0,
            health_burst: 0,
            trust_proxy_headers: false,
        });
    }

    #[test]
    fn test_client_ip_resolution_with_trusted_proxy() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(
            client_ip_from_request(&req, true),
            "203.0.113.7".parse::<IpAddr>().unwrap()
        );

        let req = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(
            client_ip_from_request(&req, true),
            "198.51.100.2".parse::<IpAddr>().unwrap()
        );

        let req = Request::builder().body(()).unwrap();
        assert_eq!(
            client_ip_from_request(&req, true),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );
    }

    #[test]
    fn test_client_ip_ignores_forwarding_headers_by_default() {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .header("x-real-ip", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(
            client_ip_from_request(&req, false),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        );

        let peer: SocketAddr = "192.0.2.10:5555".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_ip_from_request(&req, false), peer.ip());
    }

    #[tokio::test]
    async fn test_rate_limit_success_includes_limit_header() {
        let app = limited_app(RateLimitConfig {
            rpc_rps: 100,
            rpc_burst: 100,
            ..Default::default()
        });

        let response = app.oneshot(get_from(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "100");
    }

    #[tokio::test]
    async fn test_rate_limit_exceeded_response() {
        let app = limited_app(RateLimitConfig {
            rpc_rps: 1,
            rpc_burst: 1,
            ..Default::default()
        });

        app.clone().oneshot(get_from(None)).await.unwrap();
        let response = app.oneshot(get_from(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));
        assert_eq!(
            response.headers().get("X-RateLimit-Remaining").unwrap(),
            "0"
        );

        let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body_str = String::from_utf8_lossy(&body_bytes);
        assert!(body_str.contains("rate_limited"));
        assert!(body_str.contains("slow down"));
    }

    #[tokio::test]
    async fn test_rotating_forwarded_header_does_not_bypass_limit() {
        let state = Arc::new(RateLimitState::new(RateLimitConfig {
            rpc_rps: 1,
            rpc_burst: 1,
            ..Default::default()
        }));
        let app = limited_app_with_state(Arc::clone(&state));

        let mut allowed = 0;
        for i in 0..20 {
            let spoofed = format!("10.1.0.{}", i);
            let response = app
                .clone()
                .oneshot(from_peer("192.0.2.10:40000", &spoofed))
                .await
                .unwrap();
            if response.status() == StatusCode::OK {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 1);
        assert_eq!(state.tracked_clients(), 1);
    }

    #[tokio::test]
    async fn test_distinct_peers_get_distinct_buckets() {
        let app = limited_app(RateLimitConfig {
            rpc_rps: 1,
            rpc_burst: 1,
            ..Default::default()
        });

        app.clone()
            .oneshot(from_peer("192.0.2.10:40000", "10.0.0.1"))
            .await
            .unwrap();
        let blocked = app
            .clone()
            .oneshot(from_peer("192.0.2.10:40001", "10.0.0.2"))
            .await
            .unwrap();
        assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app
            .oneshot(from_peer("192.0.2.11:40000", "10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[test]
    fn test_prune_keeps_active_clients() {
        let state = RateLimitState::new(RateLimitConfig {
            rpc_rps: 1,
            rpc_burst: 1,
            ..Default::default()
        });
        let ip: IpAddr = "192.0.2.10".parse().unwrap();
        assert!(state.rpc_limiter.check_key(&ip).is_ok());
        assert_eq!(state.tracked_clients(), 1);

        state.prune();
        assert_eq!(state.tracked_clients(), 1);
        assert!(state.rpc_limiter.check_key(&ip).is_err());
    }

    #[tokio::test]
    async fn test_rate_limit_per_forwarded_ip_behind_trusted_proxy() {
        let app = limited_app(RateLimitConfig {
            rpc_rps: 1,
            rpc_burst: 1,
            trust_proxy_headers: true,
            ..Default::default()
        });

        app.clone().oneshot(get_from(Some("192.168.1.1"))).await.unwrap();
        let blocked = app.clone().oneshot(get_from(Some("192.168.1.1"))).await.unwrap();
        assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.oneshot(get_from(Some("10.0.0.1"))).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_rate_limit_eventually_blocks() {
        let state = Arc::new(RateLimitState::new(RateLimitConfig {
            health_rps: 1,
            health_burst: 1,
            ..Default::default()
        }));
        let app = Router::new()
            .route("/", get(dummy_handler))
            .layer(middleware::from_fn_with_state(
                state,
                rate_limit_health_middleware,
            ));

        let first = app.clone().oneshot(get_from(None)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(get_from(None)).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
