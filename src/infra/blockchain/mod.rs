//! EVM wallet provider implementation.

pub mod evm;
pub mod signer;

pub use evm::{PrivateKeyProvider, ProviderConfig};
pub use signer::{LocalKeySigner, recover_address};
