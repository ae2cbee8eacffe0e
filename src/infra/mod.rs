//! Infrastructure layer implementations.

pub mod blockchain;
pub mod observability;

pub use blockchain::{LocalKeySigner, PrivateKeyProvider, ProviderConfig};
pub use observability::{PrometheusHandle, init_metrics_handle, init_tracing};
