// ABOUTME: HTTP route handlers for the promptforge API server
pub mod cache;
pub mod health;
pub mod queue;
