// ABOUTME: Global request-rate limiting layer backed by promptforge_core's RateLimitSettings
use promptforge_core::config::RateLimitSettings;
use std::time::Duration;
use tower::limit::RateLimitLayer;

/// Builds a fixed-window, process-wide rate limiter from the layered
/// `optimizer.rateLimiting.*` settings. Coarser than a per-IP governor
/// (see DESIGN.md) but needs no extra dependency beyond `tower`.
pub fn create_rate_limit_layer(settings: &RateLimitSettings) -> RateLimitLayer {
    RateLimitLayer::new(settings.max_requests as u64, Duration::from_millis(settings.window_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_builds_from_default_settings() {
        let _layer = create_rate_limit_layer(&RateLimitSettings::default());
    }
}
