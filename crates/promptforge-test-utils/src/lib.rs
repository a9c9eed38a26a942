// ABOUTME: Shared testing fixtures and helpers for promptforge's test suites
//! This crate contains shared fixtures (sample templates, contexts, jobs,
//! and feedback records) and assertion helpers used across promptforge's
//! test suites.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
