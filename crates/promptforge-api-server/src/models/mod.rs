// ABOUTME: HTTP-specific error types for the promptforge API server
pub mod errors;

pub use errors::ApiError;
