//! Integration test utilities for the presence crates
//!
//! This crate provides helpers for running end-to-end tests against the
//! lifecycle coordinator, the presence stores, and the agent HTTP surface.

pub mod helpers;
pub mod fixtures;

pub use helpers::*;
pub use fixtures::*;
