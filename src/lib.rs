//! EVM RPC Facade
//!
//! A small service that turns high-level wallet intents (read the chain id,
//! list accounts, read a balance, sign a message, send a transfer, export
//! the key) into JSON-RPC requests against an injected wallet provider, and
//! returns a uniform success/failure result for every one of them.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                   API Layer                  │
//! │  HTTP handlers, routing, auth, rate limits   │
//! ├─────────────────────────────────────────────┤
//! │               Application Layer              │
//! │   RPC facade, session service, app state     │
//! ├─────────────────────────────────────────────┤
//! │                 Domain Layer                 │
//! │   Provider traits, value types, errors       │
//! ├─────────────────────────────────────────────┤
//! │             Infrastructure Layer             │
//! │  Private-key provider, signer, observability │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use evm_rpc_facade::api::create_router;
//! use evm_rpc_facade::app::AppState;
//! use evm_rpc_facade::domain::ChainConfig;
//! use evm_rpc_facade::infra::{LocalKeySigner, PrivateKeyProvider};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let signer = LocalKeySigner::new(private_key)?;
//!     let provider = Arc::new(PrivateKeyProvider::with_defaults(ChainConfig::base_sepolia(), signer)?);
//!
//!     let state = Arc::new(AppState::new(provider, api_key));
//!     let router = create_router(state);
//!     axum::serve(listener, router).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod domain;
pub mod infra;

// Test utilities are available in tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
