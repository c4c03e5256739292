//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Per-username limiter type alias
pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Chat messages accepted per user per second
pub const CHAT_RATE_LIMIT: u32 = 3;

/// Chat ingestion limiter keyed by username
#[derive(Clone)]
pub struct ChatRateLimiter {
    limiter: Arc<KeyedLimiter>,
}

impl ChatRateLimiter {
    pub fn new(messages_per_second: u32) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(messages_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Check if a chat message from this user is allowed (returns true if allowed)
    pub fn check(&self, username: &str) -> bool {
        self.limiter.check_key(&username.to_string()).is_ok()
    }
}

impl Default for ChatRateLimiter {
    fn default() -> Self {
        Self::new(CHAT_RATE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_each_user_independently() {
        let limiter = ChatRateLimiter::new(1);
        assert!(limiter.check("alice"));
        assert!(!limiter.check("alice"));
        assert!(limiter.check("bob"));
    }
}
