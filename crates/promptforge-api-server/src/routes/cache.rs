// ABOUTME: Read-only view onto the render cache's stats() counters
use crate::server::AppState;
use axum::{extract::State, Json};
use promptforge_core::CacheStats;

pub async fn get_cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.render_cache.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_state;

    #[tokio::test]
    async fn reports_empty_stats_for_a_fresh_cache() {
        let state = test_state();
        let Json(stats) = get_cache_stats(State(state)).await;
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }
}
