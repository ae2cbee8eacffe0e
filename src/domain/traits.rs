//! Domain traits defining the contract of an injected wallet provider.

use async_trait::async_trait;
use serde_json::Value;

use super::error::RpcError;
use super::types::{TransactionReceipt, TransactionRequest};

/// Generic request dispatch against an authenticated provider.
#[async_trait]
pub trait RpcProvider: Send + Sync {
    /// Whether the provider is connected and may serve requests.
    fn is_connected(&self) -> bool;

    /// Dispatch a JSON-RPC style request and return the raw result.
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

/// Transaction signing and submission capability of a provider.
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// Sign and broadcast a transaction from the provider's account.
    ///
    /// Returns the transaction hash. May suspend for as long as the
    /// provider needs user approval.
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, RpcError>;

    /// Wait until the transaction is included and return its receipt.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, RpcError>;
}

/// A provider handle carrying both capabilities.
pub trait WalletProvider: RpcProvider + TransactionSender {}

impl<T: RpcProvider + TransactionSender> WalletProvider for T {}
