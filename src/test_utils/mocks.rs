//! Mock implementations for testing.
//!
//! The mock provider answers wallet requests in memory, signs with a fixed
//! development key, and can be configured to simulate failures, latency,
//! disconnection and user rejection.

use alloy::primitives::{Address, U256, hex, keccak256};
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::domain::{
    ChainId, ReceiptStatus, RpcError, RpcProvider, TransactionReceipt, TransactionRequest,
    TransactionSender,
};
use crate::infra::blockchain::signer::{LocalKeySigner, personal_ec_recover};

/// Well-known development key (Anvil's first account). Never fund it.
pub const TEST_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
    /// Simulated latency in milliseconds.
    pub latency_ms: Option<u64>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
            latency_ms: None,
        }
    }

    /// Adds simulated latency.
    #[must_use]
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency_ms = Some(ms);
        self
    }
}

/// In-memory wallet provider for testing.
///
/// # Example
///
/// ```
/// use evm_rpc_facade::test_utils::{MockProvider, mocks::MockConfig};
///
/// // A connected provider on Base Sepolia
/// let mock = MockProvider::new();
///
/// // A provider whose every request is rejected
/// let failing = MockProvider::with_config(MockConfig::failure("RPC error"));
/// ```
pub struct MockProvider {
    signer: LocalKeySigner,
    config: MockConfig,
    call_count: AtomicU64,
    connected: AtomicBool,
    approve_transactions: AtomicBool,
    chain_id: AtomicU64,
    block_number: AtomicU64,
    balance: Mutex<U256>,
    requests: Mutex<Vec<String>>,
    sent: Mutex<Vec<TransactionRequest>>,
}

impl MockProvider {
    /// Creates a new mock with default (success) configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MockConfig::success())
    }

    /// Creates a new mock with the given configuration.
    #[must_use]
    pub fn with_config(config: MockConfig) -> Self {
        let signer = LocalKeySigner::new(SecretString::from(TEST_PRIVATE_KEY))
            .expect("test key is valid");
        Self {
            signer,
            config,
            call_count: AtomicU64::new(0),
            connected: AtomicBool::new(true),
            approve_transactions: AtomicBool::new(true),
            chain_id: AtomicU64::new(84532),
            block_number: AtomicU64::new(1000),
            balance: Mutex::new(U256::from(1_500_000_000_000_000_000u128)),
            requests: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_config(MockConfig::failure(message))
    }

    #[must_use]
    pub fn with_chain_id(self, chain_id: u64) -> Self {
        self.chain_id.store(chain_id, Ordering::Relaxed);
        self
    }

    #[must_use]
    pub fn with_balance(self, balance: U256) -> Self {
        *self.balance.lock().unwrap() = balance;
        self
    }

    /// Address of the mock's single account.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Gets the number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// When false, `send_transaction` behaves as if the user declined.
    pub fn set_approve_transactions(&self, approve: bool) {
        self.approve_transactions.store(approve, Ordering::Relaxed);
    }

    /// Methods passed to `request`, in call order.
    pub fn requested_methods(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Transactions accepted by `send_transaction`.
    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    async fn begin_call(&self) -> Result<(), RpcError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Some(ms) = self.config.latency_ms {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.check_should_fail()
    }

    fn check_should_fail(&self) -> Result<(), RpcError> {
        if self.config.should_fail {
            let msg = self
                .config
                .error_message
                .clone()
                .unwrap_or_else(|| "Mock provider error".to_string());
            return Err(RpcError::rejected_with_cause(msg, "mock provider"));
        }
        Ok(())
    }

    fn switch_chain(&self, params: &[Value]) -> Result<Value, RpcError> {
        let id: ChainId = params
            .first()
            .and_then(|p| p.get("chainId"))
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::InvalidRequest("missing chainId".to_string()))?
            .parse()
            .map_err(|e: crate::domain::ValidationError| RpcError::InvalidRequest(e.to_string()))?;
        self.chain_id.store(id.0, Ordering::Relaxed);
        Ok(Value::Null)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RpcProvider for MockProvider {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.requests.lock().unwrap().push(method.to_string());
        self.begin_call().await?;

        match method {
            "eth_chainId" => Ok(json!(
                ChainId(self.chain_id.load(Ordering::Relaxed)).to_hex()
            )),
            "eth_accounts" | "eth_requestAccounts" => {
                Ok(json!([self.signer.address().to_string()]))
            }
            "eth_getBalance" => Ok(json!(format!("0x{:x}", *self.balance.lock().unwrap()))),
            "personal_sign" => self.signer.personal_sign(&params).await,
            "personal_ecRecover" => personal_ec_recover(&params),
            "eth_private_key" => Ok(json!(self.signer.export_hex())),
            "wallet_addEthereumChain" => Ok(Value::Null),
            "wallet_switchEthereumChain" => self.switch_chain(&params),
            other => Err(RpcError::InvalidRequest(format!(
                "method {} not supported by mock provider",
                other
            ))),
        }
    }
}

#[async_trait]
impl TransactionSender for MockProvider {
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, RpcError> {
        self.begin_call().await?;

        if !self.approve_transactions.load(Ordering::Relaxed) {
            return Err(RpcError::rejected_with_cause(
                "User denied transaction signature",
                "code 4001",
            ));
        }

        let mut sent = self.sent.lock().unwrap();
        let preimage = format!("{}:{}:{}", tx.to, tx.value, sent.len());
        sent.push(tx.clone());
        Ok(hex::encode_prefixed(keccak256(preimage.as_bytes())))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, RpcError> {
        self.begin_call().await?;

        let block = self.block_number.fetch_add(1, Ordering::Relaxed);
        let from = self.signer.address().to_string();
        Ok(TransactionReceipt::new(tx_hash.to_string(), ReceiptStatus::Success)
            .with_block_number(block)
            .with_parties(from.clone(), Some(from))
            .with_gas_used(21_000))
    }
}
