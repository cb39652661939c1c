//! Test utilities.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory repository implementations for mocking persistence
//! - A scriptable payment gateway mock

pub mod factories;
pub mod gateway_mocks;
pub mod repo_mocks;
