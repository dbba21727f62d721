use anyhow::Result;
use redis::AsyncCommands;

use crate::config::rate_limits::{current_window, RateAction};
use crate::infra::cache::RedisCache;

/// Outcome of one counted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: RedisCache,
}

impl RateLimiter {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }

    /// Counts one attempt against `subject` and reports whether the quota is
    /// exhausted. `subject` is `user:<id>` or `ip:<address>`.
    pub async fn hit(&self, subject: &str, action: RateAction) -> Result<RateLimitInfo> {
        let (limit, window) = action.quota();
        let window_seconds = window.seconds();
        let key = rate_key(subject, action, current_window(window_seconds));

        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;

        let count: u32 = conn.incr(&key, 1).await?;
        // Set expiration on first increment
        if count == 1 {
            let _: () = conn.expire(&key, window_seconds as i64).await?;
        }

        if count > limit {
            tracing::debug!(
                subject = subject,
                action = action.as_str(),
                window = ?window,
                count = count,
                limit = limit,
                "Rate limit exceeded"
            );
            return Ok(RateLimitInfo { limited: true, limit, remaining: 0 });
        }

        Ok(RateLimitInfo {
            limited: false,
            limit,
            remaining: limit.saturating_sub(count),
        })
    }
}

fn rate_key(subject: &str, action: RateAction, window_index: u64) -> String {
    format!("ratelimit:{}:{}:{}", subject, action.as_str(), window_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_by_subject_action_and_window() {
        assert_eq!(
            rate_key("ip:10.0.0.1", RateAction::Login, 42),
            "ratelimit:ip:10.0.0.1:login:42"
        );
        assert_ne!(
            rate_key("user:a", RateAction::Like, 1),
            rate_key("user:a", RateAction::Bookmark, 1)
        );
    }
}
