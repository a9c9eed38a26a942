// ABOUTME: Thin axum HTTP front door exposing the cache and queue stats promptforge-core maintains
pub mod config;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use config::ApiServerConfig;
pub use server::{ApiServer, AppState};
