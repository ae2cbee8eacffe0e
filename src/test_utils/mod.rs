//! Test utilities and mock implementations.
//!
//! This module provides a reusable mock wallet provider and JSON-RPC node
//! fixtures for use in unit and integration tests.

pub mod mocks;
pub mod node;

pub use mocks::MockProvider;
