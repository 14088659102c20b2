//! Room registry — lookup, creation, reclamation, and join/leave
//! orchestration.
//!
//! DESIGN
//! ======
//! The registry mutex covers the room map and the pending-deletion
//! deadlines; it is always taken before any room lock and never while one
//! is held. Empty rooms are not deleted immediately: leaving the last
//! participant schedules a deadline, and any registry access first sweeps
//! expired deadlines. A join within the grace period cancels reclamation,
//! so a refreshing client keeps its board.
//!
//! ERROR HANDLING
//! ==============
//! Join failures are returned as protocol error codes for the dispatcher
//! to report. Routing wrappers translate a missing room to `RoomNotFound`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::info;

use crate::ids;
use crate::protocol::codec;
use crate::protocol::constants::EMPTY_ROOM_GRACE_SECONDS;
use crate::protocol::ErrorCode;
use crate::room::{ConnectionTx, Point, Room, UserInfo};
use crate::services::board::BoardService;
use crate::services::presence::PresenceService;

/// Participant colors, handed out in rotation across joins.
const COLOR_PALETTE: [&str; 15] = [
    "#FF5733", "#33FF57", "#3357FF", "#FF33F5", "#F5FF33", "#33FFF5", "#FF8C33", "#8C33FF",
    "#33FF8C", "#FF338C", "#338CFF", "#8CFF33", "#FF3333", "#33FF33", "#3333FF",
];

/// Successful join: the server-assigned identity.
#[derive(Debug, Clone)]
pub struct JoinSuccess {
    pub user_id: String,
    pub color: String,
}

struct Registry {
    rooms: HashMap<String, Arc<Room>>,
    /// Deadlines for empty rooms; a key here is always also in `rooms`.
    pending_deletion: HashMap<String, Instant>,
}

/// Central service managing all rooms and routing per-room operations.
pub struct RoomService {
    registry: Mutex<Registry>,
    next_color_index: AtomicUsize,
    grace: Duration,
    presence: PresenceService,
    board: BoardService,
}

impl RoomService {
    #[must_use]
    pub fn new() -> Self {
        Self::with_grace(Duration::from_secs(EMPTY_ROOM_GRACE_SECONDS))
    }

    /// Registry with a custom empty-room grace period.
    #[must_use]
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            registry: Mutex::new(Registry {
                rooms: HashMap::new(),
                pending_deletion: HashMap::new(),
            }),
            next_color_index: AtomicUsize::new(0),
            grace,
            presence: PresenceService::new(),
            board: BoardService::new(),
        }
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceService {
        &self.presence
    }

    #[must_use]
    pub fn board(&self) -> &BoardService {
        &self.board
    }

    // -------------------------------------------------------------------------
    // Room management
    // -------------------------------------------------------------------------

    /// Fetch an existing room or create one with the supplied password.
    /// Cancels any pending reclamation of `room_id`.
    pub fn get_or_create_room(&self, room_id: &str, password: &str) -> Arc<Room> {
        self.get_or_create_room_at(room_id, password, Instant::now())
    }

    fn get_or_create_room_at(&self, room_id: &str, password: &str, now: Instant) -> Arc<Room> {
        let mut registry = self.registry.lock().unwrap();
        Self::sweep_expired(&mut registry, now);
        registry.pending_deletion.remove(room_id);
        registry
            .rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| {
                info!(%room_id, "room created");
                Arc::new(Room::new(room_id, password))
            })
            .clone()
    }

    /// Look up a room, sweeping expired reclamation deadlines first.
    #[must_use]
    pub fn get_room(&self, room_id: &str) -> Option<Arc<Room>> {
        self.get_room_at(room_id, Instant::now())
    }

    fn get_room_at(&self, room_id: &str, now: Instant) -> Option<Arc<Room>> {
        let mut registry = self.registry.lock().unwrap();
        Self::sweep_expired(&mut registry, now);
        registry.rooms.get(room_id).cloned()
    }

    #[must_use]
    pub fn room_exists(&self, room_id: &str) -> bool {
        self.get_room(room_id).is_some()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.registry.lock().unwrap().rooms.len()
    }

    /// Drop a room unconditionally.
    pub fn delete_room(&self, room_id: &str) {
        let mut registry = self.registry.lock().unwrap();
        registry.rooms.remove(room_id);
        registry.pending_deletion.remove(room_id);
    }

    /// Snapshot of all live rooms (for maintenance sweeps).
    #[must_use]
    pub fn rooms(&self) -> Vec<Arc<Room>> {
        self.registry.lock().unwrap().rooms.values().cloned().collect()
    }

    fn sweep_expired(registry: &mut Registry, now: Instant) {
        let expired: Vec<String> = registry
            .pending_deletion
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for room_id in expired {
            registry.pending_deletion.remove(&room_id);
            registry.rooms.remove(&room_id);
            info!(%room_id, "empty room reclaimed");
        }
    }

    // -------------------------------------------------------------------------
    // Join / leave
    // -------------------------------------------------------------------------

    /// Join a user to a room, sending `welcome` and the board snapshot to
    /// the joiner and broadcasting `user_joined` to everyone else.
    ///
    /// # Errors
    ///
    /// `InvalidPassword` when the room's password does not match (the first
    /// caller of a new room sets its password), `RoomFull` at capacity.
    pub fn join_room(
        &self,
        room_id: &str,
        user_name: &str,
        password: &str,
        conn: ConnectionTx,
    ) -> Result<JoinSuccess, ErrorCode> {
        let room = self.get_or_create_room(room_id, password);

        if !room.validate_password(password) {
            return Err(ErrorCode::InvalidPassword);
        }
        if room.is_full() {
            return Err(ErrorCode::RoomFull);
        }

        let user_id = ids::new_user_id();
        let color = self.next_color();
        let info = UserInfo::new(&user_id, user_name, &color, conn.clone());
        if !room.add_participant(&user_id, info) {
            return Err(ErrorCode::RoomFull);
        }

        // Welcome carries the participant list including the joiner.
        let users = room.participants();
        let welcome_seq = room.next_sequence();
        let _ = conn.try_send(codec::welcome(&user_id, &color, &users, welcome_seq));
        let _ = conn.try_send(self.board.snapshot(&room));

        let join_seq = room.next_sequence();
        room.broadcast(&codec::user_joined(&user_id, user_name, &color, join_seq), Some(&user_id));

        info!(%room_id, %user_id, participants = room.participant_count(), "user joined room");
        Ok(JoinSuccess { user_id, color })
    }

    /// Remove a user from a room, broadcast `user_left`, and schedule the
    /// room for reclamation if it is now empty.
    pub fn leave_room(&self, room_id: &str, user_id: &str) {
        self.leave_room_at(room_id, user_id, Instant::now());
    }

    fn leave_room_at(&self, room_id: &str, user_id: &str, now: Instant) {
        let Some(room) = self.get_room_at(room_id, now) else {
            return;
        };

        room.remove_participant(user_id);
        self.presence.remove_user(user_id);

        let seq = room.next_sequence();
        room.broadcast(&codec::user_left(user_id, seq), None);

        if room.is_empty() {
            let mut registry = self.registry.lock().unwrap();
            registry
                .pending_deletion
                .insert(room_id.to_owned(), now + self.grace);
        }
        info!(%room_id, %user_id, remaining = room.participant_count(), "user left room");
    }

    fn next_color(&self) -> String {
        let idx = self.next_color_index.fetch_add(1, Ordering::Relaxed) % COLOR_PALETTE.len();
        COLOR_PALETTE[idx].to_owned()
    }

    // -------------------------------------------------------------------------
    // Message routing
    // -------------------------------------------------------------------------

    /// Route a cursor move to the presence service.
    ///
    /// # Errors
    ///
    /// `RoomNotFound` when the room is gone, `RateLimited` when the user's
    /// bucket is drained.
    pub fn handle_cursor_move(
        &self,
        room_id: &str,
        user_id: &str,
        x: f32,
        y: f32,
    ) -> Result<(), ErrorCode> {
        let room = self.get_room(room_id).ok_or(ErrorCode::RoomNotFound)?;
        if self.presence.handle_cursor_move(&room, user_id, x, y) {
            Ok(())
        } else {
            Err(ErrorCode::RateLimited)
        }
    }

    /// Route a `stroke_start`.
    ///
    /// # Errors
    ///
    /// `RoomNotFound` when the room is gone; otherwise per
    /// [`BoardService::handle_stroke_start`].
    pub fn handle_stroke_start(
        &self,
        room_id: &str,
        user_id: &str,
        stroke_id: &str,
        color: &str,
        width: f32,
    ) -> Result<(), ErrorCode> {
        let room = self.get_room(room_id).ok_or(ErrorCode::RoomNotFound)?;
        self.board.handle_stroke_start(&room, user_id, stroke_id, color, width)
    }

    /// Route a `stroke_add`. Also refreshes the author's activity.
    ///
    /// # Errors
    ///
    /// `RoomNotFound` when the room is gone; otherwise per
    /// [`BoardService::handle_stroke_add`].
    pub fn handle_stroke_add(
        &self,
        room_id: &str,
        user_id: &str,
        stroke_id: &str,
        points: &[Point],
    ) -> Result<(), ErrorCode> {
        let room = self.get_room(room_id).ok_or(ErrorCode::RoomNotFound)?;
        self.presence.update_last_seen(&room, user_id);
        self.board.handle_stroke_add(&room, user_id, stroke_id, points)
    }

    /// Route a `stroke_end`.
    ///
    /// # Errors
    ///
    /// `RoomNotFound` when the room is gone; otherwise per
    /// [`BoardService::handle_stroke_end`].
    pub fn handle_stroke_end(
        &self,
        room_id: &str,
        user_id: &str,
        stroke_id: &str,
    ) -> Result<(), ErrorCode> {
        let room = self.get_room(room_id).ok_or(ErrorCode::RoomNotFound)?;
        self.board.handle_stroke_end(&room, user_id, stroke_id)
    }

    /// Route a `stroke_move`.
    ///
    /// # Errors
    ///
    /// `RoomNotFound` when the room is gone; otherwise per
    /// [`BoardService::handle_stroke_move`].
    pub fn handle_stroke_move(
        &self,
        room_id: &str,
        user_id: &str,
        stroke_id: &str,
        dx: f32,
        dy: f32,
    ) -> Result<(), ErrorCode> {
        let room = self.get_room(room_id).ok_or(ErrorCode::RoomNotFound)?;
        self.board.handle_stroke_move(&room, user_id, stroke_id, dx, dy)
    }
}

impl Default for RoomService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "room_service_test.rs"]
mod tests;
