//! Private-key wallet provider for EVM chains.
//!
//! Account, signing and chain-selection requests are answered locally from
//! the held key and chain list. Everything else goes through an alloy
//! `RootProvider` connected over HTTP to the selected chain's RPC endpoint.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{Ethereum, TransactionBuilder};
use alloy::primitives::{Address, B256, hex};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{
    TransactionReceipt as NodeReceipt, TransactionRequest as EthTransactionRequest,
};
use alloy::transports::TransportError;
use alloy::transports::http::Http;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Value, json};
use tokio::time::{interval, timeout};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use super::signer::{LocalKeySigner, personal_ec_recover};
use crate::domain::{
    AppError, ChainConfig, ChainId, ConfigError, ReceiptStatus, RpcError, RpcProvider,
    TransactionReceipt, TransactionRequest, TransactionSender,
};

/// EIP-3326 error code for a chain the wallet does not know.
const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// Configuration for the provider's transport and confirmation polling
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub timeout: Duration,
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            confirmation_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_millis(1000),
        }
    }
}

impl ProviderConfig {
    /// Read overrides through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |key: &str| -> Result<Option<u64>, ConfigError> {
            lookup(key)
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                        key: key.to_string(),
                        message: e.to_string(),
                    })
                })
                .transpose()
        };

        Ok(Self {
            timeout: parse("RPC_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            confirmation_timeout: parse("CONFIRMATION_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.confirmation_timeout),
            receipt_poll_interval: parse("RECEIPT_POLL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.receipt_poll_interval),
        })
    }
}

/// Map a node error object to the facade's error kinds.
fn error_from_node(code: i64, message: String, data: Option<&str>) -> RpcError {
    if message.to_lowercase().contains("insufficient funds") {
        return RpcError::InsufficientFunds(message);
    }
    match code {
        -32600 | -32602 => RpcError::InvalidRequest(message),
        code => {
            let cause = match data {
                Some(data) => format!("code {}: {}", code, data),
                None => format!("code {}", code),
            };
            RpcError::ProviderRejected {
                message,
                cause: Some(cause),
            }
        }
    }
}

/// Map a transport-level failure of `method` into an [`RpcError`].
fn map_transport_error(method: &str, err: TransportError) -> RpcError {
    if let Some(payload) = err.as_error_resp() {
        debug!(code = payload.code, method = %method, "RPC returned error");
        return error_from_node(
            payload.code,
            payload.message.to_string(),
            payload.data.as_deref().map(|raw| raw.get()),
        );
    }

    if matches!(err, alloy::transports::RpcError::DeserError { .. }) {
        return RpcError::rejected_with_cause(format!("malformed {} response", method), err);
    }

    warn!(error = %err, method = %method, "RPC transport failure");
    RpcError::rejected_with_cause(format!("{} request failed", method), err)
}

impl From<NodeReceipt> for TransactionReceipt {
    fn from(receipt: NodeReceipt) -> Self {
        let status = if receipt.status() {
            ReceiptStatus::Success
        } else {
            ReceiptStatus::Reverted
        };
        let mut converted =
            TransactionReceipt::new(hex::encode_prefixed(receipt.transaction_hash), status)
                .with_parties(receipt.from.to_string(), receipt.to.map(|a| a.to_string()))
                .with_gas_used(receipt.gas_used);
        if let Some(block) = receipt.block_number {
            converted = converted.with_block_number(block);
        }
        converted
    }
}

/// Node client for `chain`, sharing the provider's HTTP client.
fn connect_node(http_client: &Client, chain: &ChainConfig) -> Result<RootProvider<Ethereum>, RpcError> {
    let url: Url = chain.rpc_target.parse().map_err(|e| {
        RpcError::InvalidRequest(format!("invalid RPC target '{}': {}", chain.rpc_target, e))
    })?;
    let transport = Http::with_client(http_client.clone(), url);
    Ok(RootProvider::new(RpcClient::new(transport, false)))
}

/// Wallet provider backed by a locally held key and an HTTP JSON-RPC node.
pub struct PrivateKeyProvider {
    http_client: Client,
    signer: LocalKeySigner,
    chains: RwLock<Vec<ChainConfig>>,
    current_chain: RwLock<ChainConfig>,
    node: RwLock<RootProvider<Ethereum>>,
    config: ProviderConfig,
}

impl PrivateKeyProvider {
    /// Create a provider connected to `chain`.
    pub fn new(
        chain: ChainConfig,
        signer: LocalKeySigner,
        config: ProviderConfig,
    ) -> Result<Self, AppError> {
        chain.validate()?;
        chain.id()?;

        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client: {}", e)))?;
        let node = connect_node(&http_client, &chain)?;

        info!(
            address = %signer.address(),
            chain = %chain.display_name,
            rpc_url = %chain.rpc_target,
            "Created private key provider"
        );

        Ok(Self {
            http_client,
            signer,
            chains: RwLock::new(vec![chain.clone()]),
            current_chain: RwLock::new(chain),
            node: RwLock::new(node),
            config,
        })
    }

    /// Create a provider with default transport configuration.
    pub fn with_defaults(chain: ChainConfig, signer: LocalKeySigner) -> Result<Self, AppError> {
        Self::new(chain, signer, ProviderConfig::default())
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Snapshot of the selected chain.
    #[must_use]
    pub fn current_chain(&self) -> ChainConfig {
        self.current_chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Chains registered with this provider.
    #[must_use]
    pub fn chains(&self) -> Vec<ChainConfig> {
        self.chains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Node client for the selected chain.
    fn node(&self) -> RootProvider<Ethereum> {
        self.node
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_chain_id(&self) -> Result<ChainId, RpcError> {
        self.current_chain()
            .id()
            .map_err(|e| RpcError::InvalidRequest(e.to_string()))
    }

    fn add_chain(&self, params: &[Value]) -> Result<Value, RpcError> {
        let raw = params.first().cloned().ok_or_else(|| {
            RpcError::InvalidRequest("wallet_addEthereumChain expects a chain config".to_string())
        })?;
        let config: ChainConfig = serde_json::from_value(raw)
            .map_err(|e| RpcError::InvalidRequest(format!("invalid chain config: {}", e)))?;
        config
            .validate()
            .map_err(|e| RpcError::InvalidRequest(format!("invalid chain config: {}", e)))?;
        let id = config
            .id()
            .map_err(|e| RpcError::InvalidRequest(e.to_string()))?;

        let mut chains = self.chains.write().unwrap_or_else(PoisonError::into_inner);
        let existing = chains
            .iter()
            .position(|c| c.id().is_ok_and(|known| known == id));
        match existing {
            Some(index) => chains[index] = config,
            None => chains.push(config),
        }
        info!(chain_id = %id, "Chain registered");
        Ok(Value::Null)
    }

    fn switch_chain(&self, params: &[Value]) -> Result<Value, RpcError> {
        let requested = params
            .first()
            .and_then(|p| p.get("chainId"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RpcError::InvalidRequest(
                    "wallet_switchEthereumChain expects {\"chainId\": \"0x..\"}".to_string(),
                )
            })?;
        let id: ChainId = requested
            .parse()
            .map_err(|e: crate::domain::ValidationError| RpcError::InvalidRequest(e.to_string()))?;

        let target = self
            .chains()
            .into_iter()
            .find(|c| c.id().is_ok_and(|known| known == id))
            .ok_or_else(|| {
                RpcError::InvalidRequest(format!(
                    "Unrecognized chain ID {} (code {}); add it first",
                    id.to_hex(),
                    UNRECOGNIZED_CHAIN_CODE
                ))
            })?;
        let node = connect_node(&self.http_client, &target)?;

        info!(chain_id = %id, chain = %target.display_name, "Switched chain");
        *self.node.write().unwrap_or_else(PoisonError::into_inner) = node;
        *self
            .current_chain
            .write()
            .unwrap_or_else(PoisonError::into_inner) = target;
        Ok(Value::Null)
    }

    /// Forward a method unchanged to the selected chain's node
    #[instrument(skip(self, params))]
    async fn forward(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        self.node()
            .raw_request::<_, Value>(method.to_string().into(), params)
            .await
            .map_err(|e| map_transport_error(method, e))
    }
}

#[async_trait]
impl RpcProvider for PrivateKeyProvider {
    /// The key is held for the provider's lifetime; session logout is
    /// handled by the service dropping its handle.
    fn is_connected(&self) -> bool {
        true
    }

    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        match method {
            "eth_accounts" | "eth_requestAccounts" => {
                Ok(json!([self.signer.address().to_string()]))
            }
            "eth_chainId" => Ok(json!(self.current_chain_id()?.to_hex())),
            "personal_sign" => self.signer.personal_sign(&params).await,
            "personal_ecRecover" => personal_ec_recover(&params),
            "eth_private_key" => Ok(json!(self.signer.export_hex())),
            "wallet_addEthereumChain" => self.add_chain(&params),
            "wallet_switchEthereumChain" => self.switch_chain(&params),
            _ => self.forward(method, params).await,
        }
    }
}

#[async_trait]
impl TransactionSender for PrivateKeyProvider {
    #[instrument(skip(self, tx), fields(to = %tx.to))]
    async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, RpcError> {
        let from = self.signer.address();
        let chain_id = self.current_chain_id()?;
        let node = self.node();

        let nonce = node
            .get_transaction_count(from)
            .pending()
            .await
            .map_err(|e| map_transport_error("eth_getTransactionCount", e))?;

        let mut call = EthTransactionRequest::default()
            .with_from(from)
            .with_to(tx.to)
            .with_value(tx.value);
        if let Some(data) = &tx.data {
            call = call.with_input(data.clone());
        }
        let gas_limit = node
            .estimate_gas(call.clone())
            .await
            .map_err(|e| map_transport_error("eth_estimateGas", e))?;
        let gas_price = node
            .get_gas_price()
            .await
            .map_err(|e| map_transport_error("eth_gasPrice", e))?;

        let request = call
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(gas_price)
            .with_chain_id(chain_id.0);

        let wallet = self.signer.wallet()?;
        let envelope = <EthTransactionRequest as TransactionBuilder<Ethereum>>::build(request, &wallet)
            .await
            .map_err(|e| RpcError::rejected_with_cause("failed to sign transaction", e))?;

        let pending = node
            .send_raw_transaction(&envelope.encoded_2718())
            .await
            .map_err(|e| map_transport_error("eth_sendRawTransaction", e))?;
        let hash = hex::encode_prefixed(pending.tx_hash());

        info!(tx_hash = %hash, nonce = nonce, chain_id = %chain_id, "Transaction broadcast");
        Ok(hash)
    }

    #[instrument(skip(self))]
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, RpcError> {
        let hash: B256 = tx_hash
            .parse()
            .map_err(|e| RpcError::InvalidRequest(format!("invalid transaction hash: {}", e)))?;
        let node = self.node();
        let poll_interval = self.config.receipt_poll_interval.max(Duration::from_millis(1));

        let poll = async {
            let mut ticker = interval(poll_interval);
            loop {
                ticker.tick().await;
                let receipt = node
                    .get_transaction_receipt(hash)
                    .await
                    .map_err(|e| map_transport_error("eth_getTransactionReceipt", e))?;
                match receipt {
                    Some(receipt) => return Ok::<_, RpcError>(receipt),
                    None => debug!(tx_hash = %tx_hash, "Receipt not available yet"),
                }
            }
        };

        match timeout(self.config.confirmation_timeout, poll).await {
            Ok(receipt) => receipt.map(TransactionReceipt::from),
            Err(_) => Err(RpcError::rejected(format!(
                "Transaction {} not confirmed within {}s",
                tx_hash,
                self.config.confirmation_timeout.as_secs()
            ))),
        }
    }
}
