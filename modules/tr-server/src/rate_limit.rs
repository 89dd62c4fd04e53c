//! Per-handler rate limiting (spec.md §6), config-driven RPS/burst.

use axum::body::Body;
use tower_governor::governor::GovernorConfigBuilder;
use governor::middleware::NoOpMiddleware;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::GovernorLayer;
use tr_core::file_config::RateLimitConfig;

pub fn layer(config: &RateLimitConfig) -> GovernorLayer<PeerIpKeyExtractor, NoOpMiddleware, Body> {
    let per_second = config.requests_per_second.max(1);
    let governor_config = GovernorConfigBuilder::default()
        .per_second(per_second)
        .burst_size(config.burst_size.max(1))
        .finish()
        .expect("rate limiter config is always valid for positive rps/burst");
    GovernorLayer::new(governor_config)
}
