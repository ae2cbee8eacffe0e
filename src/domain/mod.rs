//! Domain layer containing core types, provider traits, and error definitions.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AppError, ConfigError, RpcError, RpcErrorKind, ValidationError};
pub use traits::{RpcProvider, TransactionSender, WalletProvider};
pub use types::{
    ChainConfig, ChainId, ChainNamespace, DEMO_MESSAGE, DEMO_TRANSFER_WEI, ErrorDetail,
    ErrorResponse, HealthResponse, HealthStatus, RateLimitResponse, ReceiptStatus, RpcFailure,
    RpcPayload, RpcResult, SessionResponse, SwitchChainRequest, TransactionReceipt,
    TransactionRequest, VerifySignatureRequest,
};
