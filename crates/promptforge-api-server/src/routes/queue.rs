// ABOUTME: Read-only view onto the job queue's getStats() counters
use crate::server::AppState;
use axum::{extract::State, Json};
use promptforge_core::QueueStats;

pub async fn get_queue_stats(State(state): State<AppState>) -> Json<QueueStats> {
    Json(state.queue.get_stats().await)
}
