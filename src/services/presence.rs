//! Presence service — cursor updates, rate limiting, ghost detection.

use crate::protocol::codec;
use crate::protocol::constants::{CURSOR_UPDATES_PER_SECOND, RATE_LIMIT_BURST_SIZE};
use crate::rate_limit::RateLimiter;
use crate::room::Room;

/// Handles cursor position updates behind a per-user token bucket.
pub struct PresenceService {
    limiter: RateLimiter,
}

impl PresenceService {
    #[must_use]
    pub fn new() -> Self {
        Self { limiter: RateLimiter::new(CURSOR_UPDATES_PER_SECOND, RATE_LIMIT_BURST_SIZE) }
    }

    /// Process one cursor move. Returns false when the user is rate
    /// limited or unknown; a false result emits no broadcast.
    pub fn handle_cursor_move(&self, room: &Room, user_id: &str, x: f32, y: f32) -> bool {
        if !self.limiter.try_consume(user_id) {
            return false;
        }

        room.update_cursor(user_id, x, y);
        if room.participant(user_id).is_none() {
            return false;
        }

        let seq = room.next_sequence();
        room.broadcast(&codec::cursor_move(user_id, x, y, seq), Some(user_id));
        true
    }

    /// Refresh a user's activity timestamp without touching the cursor.
    pub fn update_last_seen(&self, room: &Room, user_id: &str) {
        room.touch_participant(user_id);
    }

    /// User ids whose last activity is older than `timeout_ms`.
    #[must_use]
    pub fn ghost_users(&self, room: &Room, timeout_ms: u64) -> Vec<String> {
        room.participants()
            .into_iter()
            .filter(|u| u.is_ghost(timeout_ms))
            .map(|u| u.user_id)
            .collect()
    }

    /// Flip `is_active = false` for every ghost. No broadcast.
    pub fn mark_ghosts_inactive(&self, room: &Room, timeout_ms: u64) {
        let ghosts = self.ghost_users(room, timeout_ms);
        if !ghosts.is_empty() {
            room.set_inactive(&ghosts);
        }
    }

    /// Drop the user's rate-limit bucket (call on leave).
    pub fn remove_user(&self, user_id: &str) {
        self.limiter.remove(user_id);
    }

    /// Whether the user's next cursor move would be rejected.
    #[must_use]
    pub fn is_rate_limited(&self, user_id: &str) -> bool {
        !self.limiter.can_consume(user_id)
    }

    /// Evict limiter buckets idle longer than `max_idle_seconds`.
    pub fn cleanup_buckets(&self, max_idle_seconds: u64) -> usize {
        self.limiter.cleanup(max_idle_seconds)
    }
}

impl Default for PresenceService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
