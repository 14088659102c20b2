//! Room state: participants, cursors, strokes, and the broadcast primitive.
//!
//! DESIGN
//! ======
//! A `Room` guards all of its mutable state (participants, cursors,
//! strokes) behind a single mutex; the sequence counter is a separate
//! atomic so broadcasts can be stamped without contending on the lock.
//! Accessors hand out independent snapshots. Fan-out collects the live
//! connection senders under the lock and performs the sends after release,
//! so a send can never re-enter the room.
//!
//! The connection capability is a bounded `mpsc::Sender<String>`: the core
//! never owns a connection's lifetime. A closed or full channel is skipped
//! silently during fan-out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::protocol::constants::{MAX_STROKES_PER_ROOM, MAX_USERS_PER_ROOM};

/// Outbound handle for one connection. The transport task owns the
/// receiving side; when it exits, sends fail and the peer is skipped.
pub type ConnectionTx = mpsc::Sender<String>;

// =============================================================================
// MODELS
// =============================================================================

/// A single point of a stroke polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// A drawing stroke on the whiteboard.
#[derive(Debug, Clone)]
pub struct Stroke {
    pub stroke_id: String,
    /// Only the author may mutate the stroke.
    pub author_id: String,
    pub color: String,
    pub width: f32,
    pub points: Vec<Point>,
    /// Monotonic: once true, the stroke only accepts whole translations.
    pub complete: bool,
    /// Room sequence number assigned when the stroke is registered.
    pub seq: u64,
}

impl Stroke {
    #[must_use]
    pub fn new(stroke_id: &str, author_id: &str, color: &str, width: f32) -> Self {
        Self {
            stroke_id: stroke_id.to_owned(),
            author_id: author_id.to_owned(),
            color: color.to_owned(),
            width,
            points: Vec::new(),
            complete: false,
            seq: 0,
        }
    }

    pub fn add_point(&mut self, x: f32, y: f32) {
        self.points.push(Point { x, y });
    }

    pub fn add_points(&mut self, points: &[Point]) {
        self.points.extend_from_slice(points);
    }

    pub fn finish(&mut self) {
        self.complete = true;
    }

    /// Translate every point by `(dx, dy)`.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        for p in &mut self.points {
            p.x += dx;
            p.y += dy;
        }
    }

    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Cursor position state for one participant.
#[derive(Debug, Clone)]
pub struct CursorState {
    pub user_id: String,
    pub x: f32,
    pub y: f32,
    pub last_update: Instant,
    pub visible: bool,
}

impl CursorState {
    #[must_use]
    pub fn new(user_id: &str, x: f32, y: f32) -> Self {
        Self { user_id: user_id.to_owned(), x, y, last_update: Instant::now(), visible: true }
    }

    pub fn update(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
        self.last_update = Instant::now();
        self.visible = true;
    }

    #[must_use]
    pub fn is_stale(&self, timeout_ms: u64) -> bool {
        self.last_update.elapsed().as_millis() > u128::from(timeout_ms)
    }
}

/// A participant's identity and liveness state within a room.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub user_id: String,
    pub name: String,
    pub color: String,
    /// Non-owning reference to the participant's connection.
    pub conn: ConnectionTx,
    pub last_activity: Instant,
    pub is_active: bool,
}

impl UserInfo {
    #[must_use]
    pub fn new(user_id: &str, name: &str, color: &str, conn: ConnectionTx) -> Self {
        Self {
            user_id: user_id.to_owned(),
            name: name.to_owned(),
            color: color.to_owned(),
            conn,
            last_activity: Instant::now(),
            is_active: true,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.is_active = true;
    }

    #[must_use]
    pub fn is_ghost(&self, timeout_ms: u64) -> bool {
        self.last_activity.elapsed().as_millis() > u128::from(timeout_ms)
    }

    #[must_use]
    pub fn idle_time_ms(&self) -> u128 {
        self.last_activity.elapsed().as_millis()
    }
}

// =============================================================================
// ROOM
// =============================================================================

struct RoomInner {
    participants: HashMap<String, UserInfo>,
    cursors: HashMap<String, CursorState>,
    strokes: Vec<Stroke>,
}

/// A collaborative room: participants plus a shared drawing surface.
pub struct Room {
    room_id: String,
    password: String,
    next_seq: AtomicU64,
    max_users: usize,
    max_strokes: usize,
    inner: Mutex<RoomInner>,
}

impl Room {
    #[must_use]
    pub fn new(room_id: &str, password: &str) -> Self {
        Self {
            room_id: room_id.to_owned(),
            password: password.to_owned(),
            next_seq: AtomicU64::new(1),
            max_users: MAX_USERS_PER_ROOM,
            max_strokes: MAX_STROKES_PER_ROOM,
            inner: Mutex::new(RoomInner {
                participants: HashMap::new(),
                cursors: HashMap::new(),
                strokes: Vec::new(),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.room_id
    }

    #[must_use]
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    /// An empty room password admits anyone.
    #[must_use]
    pub fn validate_password(&self, password: &str) -> bool {
        self.password.is_empty() || self.password == password
    }

    // -------------------------------------------------------------------------
    // Participants
    // -------------------------------------------------------------------------

    /// Add a participant with a zero-initialized cursor. Returns false iff
    /// the room is at capacity; both entries are inserted atomically.
    pub fn add_participant(&self, user_id: &str, info: UserInfo) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.participants.len() >= self.max_users {
            return false;
        }
        inner.participants.insert(user_id.to_owned(), info);
        inner.cursors.insert(user_id.to_owned(), CursorState::new(user_id, 0.0, 0.0));
        true
    }

    /// Remove a participant and its cursor together. Idempotent.
    pub fn remove_participant(&self, user_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.participants.remove(user_id);
        inner.cursors.remove(user_id);
    }

    #[must_use]
    pub fn participant(&self, user_id: &str) -> Option<UserInfo> {
        self.inner.lock().unwrap().participants.get(user_id).cloned()
    }

    /// Snapshot of all participants.
    #[must_use]
    pub fn participants(&self) -> Vec<UserInfo> {
        self.inner.lock().unwrap().participants.values().cloned().collect()
    }

    #[must_use]
    pub fn participant_ids(&self) -> Vec<String> {
        self.inner.lock().unwrap().participants.keys().cloned().collect()
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.inner.lock().unwrap().participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().participants.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.inner.lock().unwrap().participants.len() >= self.max_users
    }

    /// Refresh a participant's activity timestamp.
    pub fn touch_participant(&self, user_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(info) = inner.participants.get_mut(user_id) {
            info.touch();
        }
    }

    /// Flip `is_active = false` for the given participants.
    pub fn set_inactive(&self, user_ids: &[String]) {
        let mut inner = self.inner.lock().unwrap();
        for user_id in user_ids {
            if let Some(info) = inner.participants.get_mut(user_id) {
                info.is_active = false;
            }
        }
    }

    // -------------------------------------------------------------------------
    // Cursors
    // -------------------------------------------------------------------------

    /// Update a cursor and the owner's activity timestamp. No-op for
    /// unknown users.
    pub fn update_cursor(&self, user_id: &str, x: f32, y: f32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(cursor) = inner.cursors.get_mut(user_id) {
            cursor.update(x, y);
        }
        if let Some(info) = inner.participants.get_mut(user_id) {
            info.touch();
        }
    }

    #[must_use]
    pub fn cursor(&self, user_id: &str) -> Option<CursorState> {
        self.inner.lock().unwrap().cursors.get(user_id).cloned()
    }

    /// Snapshot of all cursors.
    #[must_use]
    pub fn cursors(&self) -> HashMap<String, CursorState> {
        self.inner.lock().unwrap().cursors.clone()
    }

    // -------------------------------------------------------------------------
    // Strokes
    // -------------------------------------------------------------------------

    /// Append a stroke, pruning the oldest entries once over the cap.
    pub fn add_stroke(&self, stroke: Stroke) {
        let mut inner = self.inner.lock().unwrap();
        inner.strokes.push(stroke);
        if inner.strokes.len() > self.max_strokes {
            let excess = inner.strokes.len() - self.max_strokes;
            inner.strokes.drain(..excess);
        }
    }

    #[must_use]
    pub fn stroke(&self, stroke_id: &str) -> Option<Stroke> {
        let inner = self.inner.lock().unwrap();
        inner.strokes.iter().find(|s| s.stroke_id == stroke_id).cloned()
    }

    /// Run `f` against a stroke under the room lock. Returns `None` when
    /// the stroke does not exist; lookup and mutation are one atomic step.
    pub fn update_stroke<T>(&self, stroke_id: &str, f: impl FnOnce(&mut Stroke) -> T) -> Option<T> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .strokes
            .iter_mut()
            .find(|s| s.stroke_id == stroke_id)
            .map(f)
    }

    /// Snapshot of all strokes in insertion (sequence) order.
    #[must_use]
    pub fn strokes(&self) -> Vec<Stroke> {
        self.inner.lock().unwrap().strokes.clone()
    }

    /// The most recent `limit` strokes, in insertion order.
    #[must_use]
    pub fn stroke_snapshot(&self, limit: usize) -> Vec<Stroke> {
        let inner = self.inner.lock().unwrap();
        let start = inner.strokes.len().saturating_sub(limit);
        inner.strokes[start..].to_vec()
    }

    #[must_use]
    pub fn stroke_count(&self) -> usize {
        self.inner.lock().unwrap().strokes.len()
    }

    // -------------------------------------------------------------------------
    // Sequencing
    // -------------------------------------------------------------------------

    /// Allocate the next room sequence number. Starts at 1.
    pub fn next_sequence(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Read the sequence counter without advancing it.
    #[must_use]
    pub fn current_sequence(&self) -> u64 {
        self.next_seq.load(Ordering::Relaxed)
    }

    // -------------------------------------------------------------------------
    // Fan-out
    // -------------------------------------------------------------------------

    /// Send `message` to every participant except `exclude`. Senders are
    /// collected under the lock; the sends happen after release. Dead or
    /// backed-up connections are skipped.
    pub fn broadcast(&self, message: &str, exclude: Option<&str>) {
        let targets: Vec<ConnectionTx> = {
            let inner = self.inner.lock().unwrap();
            inner
                .participants
                .iter()
                .filter(|(user_id, _)| exclude != Some(user_id.as_str()))
                .filter(|(_, info)| !info.conn.is_closed())
                .map(|(_, info)| info.conn.clone())
                .collect()
        };
        for tx in targets {
            let _ = tx.try_send(message.to_owned());
        }
    }

    /// Send `message` to a single participant, if present and live.
    pub fn send_to(&self, user_id: &str, message: &str) {
        let target = {
            let inner = self.inner.lock().unwrap();
            inner
                .participants
                .get(user_id)
                .filter(|info| !info.conn.is_closed())
                .map(|info| info.conn.clone())
        };
        if let Some(tx) = target {
            let _ = tx.try_send(message.to_owned());
        }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
