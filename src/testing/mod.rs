//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the daemon without a
//! broker, real network interfaces, or the host's shutdown executable.

pub mod mocks;

pub use mocks::*;
