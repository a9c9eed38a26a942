// ABOUTME: HTTP middleware for the promptforge API server
// Provides CORS, request logging, and rate limiting

pub mod cors;
pub mod logging;
pub mod rate_limit;
