//! Application service layer.
//!
//! The service owns the session: which provider, if any, is currently
//! connected. Every operation takes a snapshot of that provider, runs one
//! facade call against it and normalizes the outcome into an [`RpcResult`].

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use secrecy::SecretString;
use tracing::{info, instrument, warn};

use super::facade::RpcFacade;
use crate::domain::{
    ChainConfig, ChainId, HealthResponse, HealthStatus, RpcError, RpcResult, WalletProvider,
};
use crate::infra::observability::record_rpc_request;

/// Application service wrapping the RPC facade.
///
/// # Example
///
/// ```ignore
/// let provider = Arc::new(PrivateKeyProvider::with_defaults(chain, signer)?);
/// let service = AppService::new(Some(provider));
///
/// let result = service.get_balance().await;
/// ```
pub struct AppService {
    provider: RwLock<Option<Arc<dyn WalletProvider>>>,
}

impl AppService {
    /// Creates a service, optionally with a connected provider.
    #[must_use]
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        Self {
            provider: RwLock::new(provider),
        }
    }

    #[must_use]
    pub fn with_provider(provider: Arc<dyn WalletProvider>) -> Self {
        Self::new(Some(provider))
    }

    /// Replace the session's provider.
    pub fn connect(&self, provider: Arc<dyn WalletProvider>) {
        *self.provider.write().unwrap_or_else(PoisonError::into_inner) = Some(provider);
        info!("Provider connected");
    }

    /// Drop the session's provider (logout).
    pub fn disconnect(&self) {
        let previous = self
            .provider
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            info!("Provider disconnected");
        }
    }

    /// Whether a provider is held and reports itself connected.
    pub fn is_connected(&self) -> bool {
        self.snapshot().is_some_and(|p| p.is_connected())
    }

    fn snapshot(&self) -> Option<Arc<dyn WalletProvider>> {
        self.provider
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run `op` against a facade over the current provider.
    ///
    /// The lock is released before the operation is awaited.
    async fn run<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, RpcError>
    where
        F: FnOnce(Arc<dyn WalletProvider>) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let result = match self.snapshot() {
            Some(provider) if provider.is_connected() => op(provider).await,
            _ => Err(RpcError::NotConnected),
        };

        record_rpc_request(operation, result.is_ok());
        match &result {
            Ok(_) => info!(operation, "RPC operation succeeded"),
            Err(e) => warn!(
                operation,
                kind = e.kind().as_str(),
                error = %e,
                cause = e.cause().unwrap_or_default(),
                "RPC operation failed"
            ),
        }
        result
    }

    #[instrument(skip(self))]
    pub async fn get_chain_id(&self) -> RpcResult {
        self.run("get_chain_id", |p| async move {
            RpcFacade::new(p.as_ref())?.get_chain_id().await
        })
        .await
        .into()
    }

    #[instrument(skip(self))]
    pub async fn get_accounts(&self) -> RpcResult {
        self.run("get_accounts", |p| async move {
            RpcFacade::new(p.as_ref())?.get_accounts().await
        })
        .await
        .into()
    }

    #[instrument(skip(self))]
    pub async fn get_balance(&self) -> RpcResult {
        self.run("get_balance", |p| async move {
            RpcFacade::new(p.as_ref())?.get_balance().await
        })
        .await
        .into()
    }

    /// Submit the demo transfer and wait for inclusion.
    #[instrument(skip(self))]
    pub async fn send_transaction(&self) -> RpcResult {
        self.run("send_transaction", |p| async move {
            RpcFacade::new(p.as_ref())?.send_transaction().await
        })
        .await
        .into()
    }

    #[instrument(skip(self))]
    pub async fn sign_message(&self) -> RpcResult {
        self.run("sign_message", |p| async move {
            RpcFacade::new(p.as_ref())?.sign_message().await
        })
        .await
        .into()
    }

    /// Export the private key. The key is wrapped so it cannot be logged by accident.
    #[instrument(skip(self))]
    pub async fn get_private_key(&self) -> Result<SecretString, RpcError> {
        self.run("get_private_key", |p| async move {
            RpcFacade::new(p.as_ref())?.get_private_key().await
        })
        .await
        .map(SecretString::from)
    }

    #[instrument(skip(self, config), fields(chain_id = %config.chain_id))]
    pub async fn add_chain(&self, config: &ChainConfig) -> RpcResult {
        self.run("add_chain", |p| async move {
            RpcFacade::new(p.as_ref())?.add_chain(config).await
        })
        .await
        .into()
    }

    #[instrument(skip(self))]
    pub async fn switch_chain(&self, chain_id: ChainId) -> RpcResult {
        self.run("switch_chain", |p| async move {
            RpcFacade::new(p.as_ref())?.switch_chain(chain_id).await
        })
        .await
        .into()
    }

    #[instrument(skip(self, message, signature))]
    pub async fn recover_signer(&self, message: &str, signature: &str) -> RpcResult {
        self.run("recover_signer", |p| async move {
            RpcFacade::new(p.as_ref())?
                .recover_signer(message, signature)
                .await
        })
        .await
        .into()
    }

    /// Reports whether a provider is connected and its chain answers.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> HealthResponse {
        let Some(provider) = self.snapshot().filter(|p| p.is_connected()) else {
            return HealthResponse::new(HealthStatus::Degraded, HealthStatus::Degraded);
        };

        let chain = match RpcFacade::new(provider.as_ref()) {
            Ok(facade) => match facade.get_chain_id().await {
                Ok(_) => HealthStatus::Healthy,
                Err(e) => {
                    warn!(error = %e, "Chain health check failed");
                    HealthStatus::Unhealthy
                }
            },
            Err(_) => HealthStatus::Degraded,
        };

        HealthResponse::new(HealthStatus::Healthy, chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RpcErrorKind, RpcPayload};
    use crate::test_utils::MockProvider;
    use crate::test_utils::mocks::{MockConfig, TEST_PRIVATE_KEY};
    use secrecy::ExposeSecret;

    fn service_with(mock: Arc<MockProvider>) -> AppService {
        AppService::with_provider(mock)
    }

    #[tokio::test]
    async fn test_operations_without_provider_are_not_connected() {
        let service = AppService::new(None);
        assert!(!service.is_connected());

        for result in [
            service.get_chain_id().await,
            service.get_accounts().await,
            service.get_balance().await,
            service.send_transaction().await,
            service.sign_message().await,
        ] {
            assert_eq!(result.failure().unwrap().kind, RpcErrorKind::NotConnected);
        }
        assert!(matches!(
            service.get_private_key().await,
            Err(RpcError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnected_provider_is_never_called() {
        let mock = Arc::new(MockProvider::new());
        mock.set_connected(false);
        let service = service_with(mock.clone());

        let result = service.get_balance().await;
        assert_eq!(result.failure().unwrap().kind, RpcErrorKind::NotConnected);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_get_chain_id_success() {
        let mock = Arc::new(MockProvider::new().with_chain_id(11155111));
        let service = service_with(mock);

        let result = service.get_chain_id().await;
        assert_eq!(
            result.payload(),
            Some(&RpcPayload::Text("11155111".to_string()))
        );
    }

    #[tokio::test]
    async fn test_send_transaction_payload_is_receipt() {
        let mock = Arc::new(MockProvider::new());
        let service = service_with(mock.clone());

        let result = service.send_transaction().await;
        match result.payload() {
            Some(RpcPayload::Receipt(receipt)) => assert!(!receipt.transaction_hash.is_empty()),
            other => panic!("unexpected payload: {:?}", other),
        }
        assert_eq!(mock.sent_transactions().len(), 1);
    }

    #[tokio::test]
    async fn test_rejection_is_normalized() {
        let mock = Arc::new(MockProvider::with_config(MockConfig::failure(
            "User rejected the request",
        )));
        let service = service_with(mock);

        let result = service.sign_message().await;
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, RpcErrorKind::ProviderRejected);
        assert_eq!(failure.message, "User rejected the request");
        assert_eq!(failure.cause.as_deref(), Some("mock provider"));
    }

    #[tokio::test]
    async fn test_private_key_is_wrapped() {
        let service = service_with(Arc::new(MockProvider::new()));
        let key = service.get_private_key().await.unwrap();
        assert_eq!(key.expose_secret(), TEST_PRIVATE_KEY);
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let service = AppService::new(None);
        service.connect(Arc::new(MockProvider::new()));
        assert!(service.is_connected());
        assert!(service.get_accounts().await.is_success());

        service.disconnect();
        assert!(!service.is_connected());
        assert!(!service.get_accounts().await.is_success());
    }

    #[tokio::test]
    async fn test_switch_then_read_chain() {
        let service = service_with(Arc::new(MockProvider::new()));

        assert!(service.switch_chain(ChainId(11155111)).await.is_success());
        assert_eq!(
            service.get_chain_id().await.payload(),
            Some(&RpcPayload::Text("11155111".to_string()))
        );
    }

    #[tokio::test]
    async fn test_add_chain_is_unit() {
        let service = service_with(Arc::new(MockProvider::new()));
        let result = service.add_chain(&ChainConfig::ethereum_sepolia()).await;
        assert_eq!(result.payload(), Some(&RpcPayload::Unit));
    }

    #[tokio::test]
    async fn test_health_check_connected() {
        let service = service_with(Arc::new(MockProvider::new()));
        let health = service.health_check().await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.provider, HealthStatus::Healthy);
        assert_eq!(health.chain, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_health_check_without_provider() {
        let service = AppService::new(None);
        let health = service.health_check().await;
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_health_check_chain_unreachable() {
        let service = service_with(Arc::new(MockProvider::failing("connection refused")));
        let health = service.health_check().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.provider, HealthStatus::Healthy);
        assert_eq!(health.chain, HealthStatus::Unhealthy);
    }
}
