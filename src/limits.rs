use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

type KeyedLimiter = RateLimiter<u64, DefaultKeyedStateStore<u64>, DefaultClock>;

/// Per-user command quotas. Checks are non-blocking; a denied check makes
/// the command reply with an error instead of waiting.
pub struct RateLimits {
    creation: KeyedLimiter,
    admin_listing: KeyedLimiter,
}

impl RateLimits {
    /// 3 reminder creations per user per minute, 2 admin listings per user
    /// per 30 seconds.
    pub fn new() -> Self {
        let creation_quota = Quota::per_minute(NonZeroU32::new(3).unwrap());
        let listing_quota =
            Quota::with_period(std::time::Duration::from_secs(15))
                .unwrap()
                .allow_burst(NonZeroU32::new(2).unwrap());
        Self {
            creation: RateLimiter::keyed(creation_quota),
            admin_listing: RateLimiter::keyed(listing_quota),
        }
    }

    pub fn allow_creation(&self, user_id: u64) -> bool {
        self.creation.check_key(&user_id).is_ok()
    }

    pub fn allow_admin_listing(&self, user_id: u64) -> bool {
        self.admin_listing.check_key(&user_id).is_ok()
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new()
    }
}
