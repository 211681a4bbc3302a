//! Testing utilities and mock implementations
//!
//! This module provides test doubles for exercising the connection lifecycle
//! without a running broker or real OS signals.

pub mod mocks;

pub use mocks::*;
