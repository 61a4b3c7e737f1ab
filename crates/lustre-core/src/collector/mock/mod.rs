//! Mock filesystem implementations for testing.
//!
//! This module provides `MockFs` and pre-built scenarios for testing
//! collectors without requiring a node running Lustre.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
