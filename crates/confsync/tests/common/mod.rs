//! Shared test utilities for confsync integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - Builders for writing settings files programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
