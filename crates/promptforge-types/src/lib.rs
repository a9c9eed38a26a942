// ABOUTME: Core domain types and errors for the promptforge optimization service
//! This crate contains the shared types and error definitions used across
//! the promptforge template optimization service: the template data model,
//! the render context, the optimizer backend request/response contract, the
//! job/queue lifecycle, and user feedback and performance metric records.

pub mod context;
pub mod error;
pub mod feedback;
pub mod job;
pub mod optimization;
pub mod template;

pub use context::*;
pub use error::*;
pub use feedback::*;
pub use job::*;
pub use optimization::*;
pub use template::*;
