//! Per-key token-bucket rate limiting.
//!
//! DESIGN
//! ======
//! `RateLimiter` keeps one bucket per key behind a `Mutex<HashMap>`. A
//! bucket refills continuously from elapsed time and is clamped to its
//! capacity; new keys start full so an initial burst is allowed.
//! `MutingRateLimiter` layers a violation counter on top: keys that keep
//! hammering a drained bucket are muted outright for a fixed duration.
//!
//! All time-dependent operations have `*_at(now)` variants so tests can
//! drive the clock explicitly.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter keyed by string (user id).
pub struct RateLimiter {
    refill_rate: f64,
    capacity: f64,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(refill_rate: f64, capacity: f64) -> Self {
        Self { refill_rate, capacity, buckets: Mutex::new(HashMap::new()) }
    }

    /// Consume one token. Returns false if the key is out of tokens.
    pub fn try_consume(&self, key: &str) -> bool {
        self.try_consume_n_at(key, 1.0, Instant::now())
    }

    /// Consume `n` tokens atomically; either all are taken or none.
    pub fn try_consume_n(&self, key: &str, n: f64) -> bool {
        self.try_consume_n_at(key, n, Instant::now())
    }

    fn try_consume_n_at(&self, key: &str, n: f64, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = Self::bucket_entry(&mut buckets, key, self.capacity, now);
        Self::refill(bucket, self.refill_rate, self.capacity, now);
        if bucket.tokens >= n {
            bucket.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Check whether one token is available without consuming it.
    pub fn can_consume(&self, key: &str) -> bool {
        self.can_consume_at(key, Instant::now())
    }

    fn can_consume_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = Self::bucket_entry(&mut buckets, key, self.capacity, now);
        Self::refill(bucket, self.refill_rate, self.capacity, now);
        bucket.tokens >= 1.0
    }

    /// Current token count for `key`, or `None` if it has no bucket yet.
    pub fn tokens(&self, key: &str) -> Option<f64> {
        self.tokens_at(key, Instant::now())
    }

    fn tokens_at(&self, key: &str, now: Instant) -> Option<f64> {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.get_mut(key)?;
        Self::refill(bucket, self.refill_rate, self.capacity, now);
        Some(bucket.tokens)
    }

    /// Milliseconds until the next token is available; 0 if one already is.
    pub fn wait_time_ms(&self, key: &str) -> i64 {
        self.wait_time_ms_at(key, Instant::now())
    }

    fn wait_time_ms_at(&self, key: &str, now: Instant) -> i64 {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = Self::bucket_entry(&mut buckets, key, self.capacity, now);
        Self::refill(bucket, self.refill_rate, self.capacity, now);
        if bucket.tokens >= 1.0 {
            return 0;
        }
        let needed = 1.0 - bucket.tokens;
        (needed / self.refill_rate * 1000.0).ceil() as i64
    }

    /// Reset a key's bucket to full capacity.
    pub fn reset(&self, key: &str) {
        let mut buckets = self.buckets.lock().unwrap();
        if let Some(bucket) = buckets.get_mut(key) {
            bucket.tokens = self.capacity;
            bucket.last_refill = Instant::now();
        }
    }

    /// Drop a key's bucket entirely.
    pub fn remove(&self, key: &str) {
        self.buckets.lock().unwrap().remove(key);
    }

    /// Drop every bucket idle longer than `max_idle_seconds`. Returns the
    /// number removed.
    pub fn cleanup(&self, max_idle_seconds: u64) -> usize {
        self.cleanup_at(max_idle_seconds, Instant::now())
    }

    fn cleanup_at(&self, max_idle_seconds: u64, now: Instant) -> usize {
        let max_idle = Duration::from_secs(max_idle_seconds);
        let mut buckets = self.buckets.lock().unwrap();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) <= max_idle);
        before - buckets.len()
    }

    /// Number of tracked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.lock().unwrap().is_empty()
    }

    /// Drop all buckets.
    pub fn clear(&self) {
        self.buckets.lock().unwrap().clear();
    }

    #[must_use]
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn bucket_entry<'a>(
        buckets: &'a mut HashMap<String, TokenBucket>,
        key: &str,
        capacity: f64,
        now: Instant,
    ) -> &'a mut TokenBucket {
        // New keys start full, allowing an initial burst.
        buckets
            .entry(key.to_owned())
            .or_insert_with(|| TokenBucket { tokens: capacity, last_refill: now })
    }

    fn refill(bucket: &mut TokenBucket, rate: f64, capacity: f64, now: Instant) {
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(capacity);
        bucket.last_refill = now;
    }
}

// =============================================================================
// MUTING LIMITER
// =============================================================================

struct MuteState {
    violations: HashMap<String, u32>,
    muted_until: HashMap<String, Instant>,
}

/// Token-bucket limiter that escalates repeat offenders to a timed mute.
pub struct MutingRateLimiter {
    limiter: RateLimiter,
    mute_duration: Duration,
    violations_before_mute: u32,
    mutes: Mutex<MuteState>,
}

impl MutingRateLimiter {
    #[must_use]
    pub fn new(
        refill_rate: f64,
        capacity: f64,
        mute_duration_ms: u64,
        violations_before_mute: u32,
    ) -> Self {
        Self {
            limiter: RateLimiter::new(refill_rate, capacity),
            mute_duration: Duration::from_millis(mute_duration_ms),
            violations_before_mute,
            mutes: Mutex::new(MuteState { violations: HashMap::new(), muted_until: HashMap::new() }),
        }
    }

    /// Consume one token, tracking violations. Returns false while muted.
    pub fn try_consume(&self, key: &str) -> bool {
        self.try_consume_at(key, Instant::now())
    }

    fn try_consume_at(&self, key: &str, now: Instant) -> bool {
        let mut mutes = self.mutes.lock().unwrap();
        if let Some(&until) = mutes.muted_until.get(key) {
            if now < until {
                return false;
            }
            mutes.muted_until.remove(key);
            mutes.violations.remove(key);
        }

        if self.limiter.try_consume_n_at(key, 1.0, now) {
            return true;
        }

        let count = mutes.violations.entry(key.to_owned()).or_insert(0);
        *count += 1;
        if *count >= self.violations_before_mute {
            mutes.muted_until.insert(key.to_owned(), now + self.mute_duration);
        }
        false
    }

    /// Whether the key is currently muted. Clears an expired mute.
    pub fn is_muted(&self, key: &str) -> bool {
        self.is_muted_at(key, Instant::now())
    }

    fn is_muted_at(&self, key: &str, now: Instant) -> bool {
        let mut mutes = self.mutes.lock().unwrap();
        let Some(&until) = mutes.muted_until.get(key) else {
            return false;
        };
        if now >= until {
            mutes.muted_until.remove(key);
            mutes.violations.remove(key);
            return false;
        }
        true
    }

    /// Milliseconds of mute remaining; 0 if not muted.
    pub fn mute_time_remaining_ms(&self, key: &str) -> i64 {
        self.mute_time_remaining_ms_at(key, Instant::now())
    }

    fn mute_time_remaining_ms_at(&self, key: &str, now: Instant) -> i64 {
        let mut mutes = self.mutes.lock().unwrap();
        let Some(&until) = mutes.muted_until.get(key) else {
            return 0;
        };
        if now >= until {
            mutes.muted_until.remove(key);
            return 0;
        }
        i64::try_from(until.duration_since(now).as_millis()).unwrap_or(i64::MAX)
    }

    /// Drop all state for a key.
    pub fn remove(&self, key: &str) {
        self.limiter.remove(key);
        let mut mutes = self.mutes.lock().unwrap();
        mutes.violations.remove(key);
        mutes.muted_until.remove(key);
    }

    /// Drop all state.
    pub fn clear(&self) {
        self.limiter.clear();
        let mut mutes = self.mutes.lock().unwrap();
        mutes.violations.clear();
        mutes.muted_until.clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
