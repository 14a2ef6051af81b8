// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Middleware module for HTTP request processing
//!
//! Per-client rate limiting for the URL check endpoint.

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::{config::RateLimitingConfig, error::ServerError};

const RATE_LIMIT_WINDOW_SECONDS: u64 = 60;
const MAX_RATE_LIMIT_ENTRIES: usize = 10_000;

/// Fixed-window request counter keyed by client IP
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitingConfig,
    window: Duration,
    requests: Arc<DashMap<IpAddr, RequestCounter>>,
}

#[derive(Debug, Clone)]
struct RequestCounter {
    count: u32,
    window_start: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration
    pub fn new(config: RateLimitingConfig) -> Self {
        Self::with_window(config, Duration::from_secs(RATE_LIMIT_WINDOW_SECONDS))
    }

    fn with_window(config: RateLimitingConfig, window: Duration) -> Self {
        Self {
            config,
            window,
            requests: Arc::new(DashMap::new()),
        }
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Count a request from `ip` and report whether it exceeds the budget
    pub fn is_rate_limited(&self, ip: IpAddr) -> bool {
        if !self.config.enabled {
            return false;
        }

        let now = Instant::now();

        if self.requests.len() > MAX_RATE_LIMIT_ENTRIES {
            self.cleanup_expired_entries(now);
        }

        let current_count = self
            .requests
            .entry(ip)
            .and_modify(|counter| {
                if now.duration_since(counter.window_start) > self.window {
                    counter.count = 1;
                    counter.window_start = now;
                } else {
                    counter.count = counter.count.saturating_add(1);
                }
            })
            .or_insert_with(|| RequestCounter {
                count: 1,
                window_start: now,
            })
            .count;

        if current_count > self.config.requests_per_minute {
            debug!(%ip, requests = current_count, "rate limiting client");
            true
        } else {
            false
        }
    }

    fn cleanup_expired_entries(&self, now: Instant) {
        let entries_before = self.requests.len();

        self.requests
            .retain(|_, counter| now.duration_since(counter.window_start) <= self.window);

        let entries_after = self.requests.len();
        let cleaned_up = entries_before.saturating_sub(entries_after);
        if cleaned_up > 0 {
            debug!(cleaned_up, "cleaned up expired rate limiter entries");
        }

        if entries_after > MAX_RATE_LIMIT_ENTRIES {
            warn!(
                entries = entries_after,
                "rate limiter still full after cleanup, removing oldest"
            );

            let mut oldest_entries: Vec<_> = self
                .requests
                .iter()
                .map(|entry| (*entry.key(), entry.value().window_start))
                .collect();
            oldest_entries.sort_by_key(|(_, window_start)| *window_start);

            let entries_to_remove = entries_after - MAX_RATE_LIMIT_ENTRIES / 2;
            for (ip, _) in oldest_entries.into_iter().take(entries_to_remove) {
                self.requests.remove(&ip);
            }
        }
    }
}

/// Rate limiting middleware function
///
/// Requires the router to be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub async fn rate_limiting_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(rate_limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let client_ip = addr.ip();

    if rate_limiter.is_rate_limited(client_ip) {
        warn!(%client_ip, "Rate limit exceeded");
        return Err(ServerError::RateLimited);
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(enabled: bool, requests_per_minute: u32) -> RateLimiter {
        RateLimiter::new(RateLimitingConfig {
            enabled,
            requests_per_minute,
        })
    }

    fn localhost() -> IpAddr {
        "127.0.0.1".parse().expect("ip")
    }

    #[test]
    fn rate_limiter_disabled() {
        let limiter = limiter(false, 1);
        assert!(!limiter.is_enabled());
        for _ in 0..10 {
            assert!(!limiter.is_rate_limited(localhost()));
        }
    }

    #[test]
    fn rate_limiter_exceeds_limits() {
        let limiter = limiter(true, 3);

        for _ in 0..3 {
            assert!(!limiter.is_rate_limited(localhost()));
        }
        assert!(limiter.is_rate_limited(localhost()));
        assert!(limiter.is_rate_limited(localhost()));
    }

    #[test]
    fn rate_limiter_different_ips() {
        let limiter = limiter(true, 2);
        let ip1 = localhost();
        let ip2: IpAddr = "192.168.1.1".parse().expect("ip");

        assert!(!limiter.is_rate_limited(ip1));
        assert!(!limiter.is_rate_limited(ip2));
        assert!(!limiter.is_rate_limited(ip1));
        assert!(!limiter.is_rate_limited(ip2));

        assert!(limiter.is_rate_limited(ip1));
        assert!(limiter.is_rate_limited(ip2));
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = RateLimiter::with_window(
            RateLimitingConfig {
                enabled: true,
                requests_per_minute: 1,
            },
            Duration::from_millis(20),
        );

        assert!(!limiter.is_rate_limited(localhost()));
        assert!(limiter.is_rate_limited(localhost()));

        std::thread::sleep(Duration::from_millis(40));
        assert!(!limiter.is_rate_limited(localhost()));
    }
}
