use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, Bytes, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::error::{RpcError, RpcErrorKind, ValidationError};

/// Literal signed by the demo "sign message" action.
pub const DEMO_MESSAGE: &str = "YOUR_MESSAGE";

/// Value of the demo self-transfer: 0.0001 ether.
pub const DEMO_TRANSFER_WEI: u128 = 100_000_000_000_000;

/// Numeric identifier of an EVM network.
///
/// Displays as decimal; [`ChainId::to_hex`] gives the `0x` form used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = ValidationError;

    /// Accepts `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => trimmed.parse::<u64>(),
        };
        parsed.map(ChainId).map_err(|e| ValidationError::InvalidField {
            field: "chain_id".to_string(),
            message: format!("'{}' is not a chain id: {}", s, e),
        })
    }
}

/// Value transfer built per call and handed to the provider's sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub to: Address,
    pub value: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl TransactionRequest {
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            value,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = Some(data);
        self
    }
}

/// Execution outcome recorded in a receipt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

/// Confirmation record for an included transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub gas_used: Option<u64>,
}

impl TransactionReceipt {
    pub fn new(transaction_hash: String, status: ReceiptStatus) -> Self {
        Self {
            transaction_hash,
            status,
            block_number: None,
            from: None,
            to: None,
            gas_used: None,
        }
    }

    pub fn with_block_number(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }

    pub fn with_parties(mut self, from: String, to: Option<String>) -> Self {
        self.from = Some(from);
        self.to = to;
        self
    }

    pub fn with_gas_used(mut self, gas_used: u64) -> Self {
        self.gas_used = Some(gas_used);
        self
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Successful payload of a facade operation, ready for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RpcPayload {
    Text(String),
    Addresses(Vec<String>),
    Receipt(TransactionReceipt),
    Unit,
}

impl From<String> for RpcPayload {
    fn from(value: String) -> Self {
        RpcPayload::Text(value)
    }
}

impl From<Vec<String>> for RpcPayload {
    fn from(value: Vec<String>) -> Self {
        RpcPayload::Addresses(value)
    }
}

impl From<TransactionReceipt> for RpcPayload {
    fn from(value: TransactionReceipt) -> Self {
        RpcPayload::Receipt(value)
    }
}

impl From<()> for RpcPayload {
    fn from(_: ()) -> Self {
        RpcPayload::Unit
    }
}

/// Normalized failure descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcFailure {
    pub kind: RpcErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl From<&RpcError> for RpcFailure {
    fn from(err: &RpcError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            cause: err.cause().map(str::to_string),
        }
    }
}

/// Uniform result contract of every facade operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RpcResult {
    Success { payload: RpcPayload },
    Failure { error: RpcFailure },
}

impl RpcResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, RpcResult::Success { .. })
    }

    #[must_use]
    pub fn payload(&self) -> Option<&RpcPayload> {
        match self {
            RpcResult::Success { payload } => Some(payload),
            RpcResult::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&RpcFailure> {
        match self {
            RpcResult::Success { .. } => None,
            RpcResult::Failure { error } => Some(error),
        }
    }
}

impl From<RpcError> for RpcResult {
    fn from(err: RpcError) -> Self {
        RpcResult::Failure {
            error: RpcFailure::from(&err),
        }
    }
}

impl<T: Into<RpcPayload>> From<Result<T, RpcError>> for RpcResult {
    fn from(result: Result<T, RpcError>) -> Self {
        match result {
            Ok(value) => RpcResult::Success {
                payload: value.into(),
            },
            Err(err) => err.into(),
        }
    }
}

/// Chain namespace understood by the provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainNamespace {
    #[default]
    Eip155,
}

fn validate_hex_chain_id(value: &str) -> Result<(), validator::ValidationError> {
    let valid = value
        .strip_prefix("0x")
        .is_some_and(|hex| !hex.is_empty() && u64::from_str_radix(hex, 16).is_ok());
    if valid {
        Ok(())
    } else {
        Err(validator::ValidationError::new("hex_chain_id"))
    }
}

/// Network description a provider can be pointed at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    #[serde(default)]
    pub chain_namespace: ChainNamespace,
    #[validate(custom(function = "validate_hex_chain_id"))]
    pub chain_id: String,
    #[validate(url)]
    pub rpc_target: String,
    #[validate(length(min = 1, max = 64))]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub block_explorer_url: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub ticker: String,
    #[validate(length(min = 1, max = 64))]
    pub ticker_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub logo: Option<String>,
}

impl ChainConfig {
    /// Base Sepolia testnet (chain 84532).
    #[must_use]
    pub fn base_sepolia() -> Self {
        Self {
            chain_namespace: ChainNamespace::Eip155,
            chain_id: "0x14A34".to_string(),
            rpc_target: "https://sepolia.base.org".to_string(),
            display_name: "Base Sepolia".to_string(),
            block_explorer_url: Some("https://sepolia-explorer.base.org".to_string()),
            ticker: "ETH".to_string(),
            ticker_name: "ETH".to_string(),
            logo: Some(
                "https://github.com/base-org/brand-kit/blob/main/logo/symbol/Base_Symbol_Blue.svg"
                    .to_string(),
            ),
        }
    }

    /// Ethereum Sepolia testnet (chain 11155111).
    #[must_use]
    pub fn ethereum_sepolia() -> Self {
        Self {
            chain_namespace: ChainNamespace::Eip155,
            chain_id: "0xaa36a7".to_string(),
            rpc_target: "https://rpc.ankr.com/eth_sepolia".to_string(),
            display_name: "Ethereum Sepolia".to_string(),
            block_explorer_url: Some("https://sepolia.etherscan.io".to_string()),
            ticker: "ETH".to_string(),
            ticker_name: "Ethereum Sepolia".to_string(),
            logo: Some("https://cryptologos.cc/logos/ethereum-eth-logo.png".to_string()),
        }
    }

    pub fn with_rpc_target(mut self, rpc_target: impl Into<String>) -> Self {
        self.rpc_target = rpc_target.into();
        self
    }

    /// Parsed numeric chain id.
    pub fn id(&self) -> Result<ChainId, ValidationError> {
        self.chain_id.parse()
    }
}

/// Request body for `POST /chains/switch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchChainRequest {
    pub chain_id: String,
}

/// Request body for `POST /rpc/verify-signature`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifySignatureRequest {
    pub message: String,
    pub signature: String,
}

/// Session state reported after login/logout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionResponse {
    pub connected: bool,
}

/// Error detail for structured error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub r#type: String,
    pub message: String,
}

/// Error envelope for failures outside the RPC result contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

/// Body returned when a client exceeds its rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResponse {
    pub error: ErrorDetail,
    pub retry_after: u64,
}

/// Health check status for services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health check response for the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub provider: HealthStatus,
    pub chain: HealthStatus,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(provider: HealthStatus, chain: HealthStatus) -> Self {
        let status = match (&provider, &chain) {
            (HealthStatus::Healthy, HealthStatus::Healthy) => HealthStatus::Healthy,
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            _ => HealthStatus::Degraded,
        };

        Self {
            status,
            provider,
            chain,
            timestamp: Utc::now(),
        }
    }
}
