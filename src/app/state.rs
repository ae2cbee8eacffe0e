//! Application state management.
//!
//! This module provides the shared application state that is
//! accessible to all request handlers via Axum's State extractor.

use std::sync::Arc;

use secrecy::SecretString;

use crate::domain::WalletProvider;
use crate::infra::PrometheusHandle;

use super::service::AppService;

/// Shared application state for the Axum web server.
///
/// # Thread Safety
///
/// All contained types are wrapped in `Arc` and implement `Send + Sync`,
/// making `AppState` safe to share across async tasks.
///
/// # Example
///
/// ```ignore
/// let provider = Arc::new(PrivateKeyProvider::with_defaults(chain, signer)?);
/// let state = AppState::new(provider, api_key);
///
/// let router = create_router(Arc::new(state));
/// ```
#[derive(Clone)]
pub struct AppState {
    /// The session service; holds the provider while logged in.
    pub service: Arc<AppService>,

    /// Provider reconnected by `POST /session/login`.
    pub wallet_provider: Arc<dyn WalletProvider>,

    /// Key required on mutating routes.
    pub api_auth_key: SecretString,

    /// Prometheus handle for GET /metrics, when a recorder is installed.
    pub metrics_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates a state whose session starts connected to `wallet_provider`.
    #[must_use]
    pub fn new(wallet_provider: Arc<dyn WalletProvider>, api_auth_key: SecretString) -> Self {
        let service = Arc::new(AppService::with_provider(Arc::clone(&wallet_provider)));

        Self {
            service,
            wallet_provider,
            api_auth_key,
            metrics_handle: None,
        }
    }

    /// Creates a new `AppState` with a custom service.
    ///
    /// This is useful for testing when you want to inject a pre-configured service.
    #[must_use]
    pub fn with_service(
        service: Arc<AppService>,
        wallet_provider: Arc<dyn WalletProvider>,
        api_auth_key: SecretString,
    ) -> Self {
        Self {
            service,
            wallet_provider,
            api_auth_key,
            metrics_handle: None,
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: Option<Arc<PrometheusHandle>>) -> Self {
        self.metrics_handle = handle;
        self
    }
}
