//! Board service — stroke lifecycle over a room.
//!
//! DESIGN
//! ======
//! Operations validate against the stroke's lifecycle rules (author-only
//! mutation, `complete` is one-way, completed strokes only translate),
//! apply the change under the room lock, then broadcast with a freshly
//! allocated sequence number. Errors are returned to the caller; the
//! dispatcher decides whether they are reported or swallowed.

use crate::protocol::codec;
use crate::protocol::constants::{MAX_POINTS_PER_STROKE, SNAPSHOT_STROKE_LIMIT};
use crate::protocol::ErrorCode;
use crate::room::{Point, Room, Stroke};

/// Handles drawing stroke events and board snapshots.
pub struct BoardService {
    snapshot_limit: usize,
}

impl BoardService {
    #[must_use]
    pub fn new() -> Self {
        Self { snapshot_limit: SNAPSHOT_STROKE_LIMIT }
    }

    /// Register a new stroke and broadcast `stroke_start` to the author's
    /// peers. The stroke and its broadcast each draw their own sequence.
    ///
    /// # Errors
    ///
    /// Infallible today; returns `Result` to match the other lifecycle ops.
    pub fn handle_stroke_start(
        &self,
        room: &Room,
        user_id: &str,
        stroke_id: &str,
        color: &str,
        width: f32,
    ) -> Result<(), ErrorCode> {
        let mut stroke = Stroke::new(stroke_id, user_id, color, width);
        stroke.seq = room.next_sequence();
        room.add_stroke(stroke);

        let seq = room.next_sequence();
        room.broadcast(&codec::stroke_start(stroke_id, user_id, color, width, seq), Some(user_id));
        Ok(())
    }

    /// Append points to an open stroke.
    ///
    /// # Errors
    ///
    /// `InvalidStroke` when the stroke is missing, owned by someone else,
    /// or already complete; `StrokeTooLarge` when the point cap would be
    /// exceeded (the stroke is left unchanged).
    pub fn handle_stroke_add(
        &self,
        room: &Room,
        user_id: &str,
        stroke_id: &str,
        points: &[Point],
    ) -> Result<(), ErrorCode> {
        let outcome = room.update_stroke(stroke_id, |stroke| {
            if stroke.author_id != user_id || stroke.complete {
                return Err(ErrorCode::InvalidStroke);
            }
            if stroke.point_count() + points.len() > MAX_POINTS_PER_STROKE {
                return Err(ErrorCode::StrokeTooLarge);
            }
            stroke.add_points(points);
            Ok(())
        });
        outcome.ok_or(ErrorCode::InvalidStroke)??;

        let seq = room.next_sequence();
        room.broadcast(&codec::stroke_add(stroke_id, user_id, points, seq), Some(user_id));
        Ok(())
    }

    /// Mark a stroke complete.
    ///
    /// # Errors
    ///
    /// `InvalidStroke` when the stroke is missing or owned by someone else.
    pub fn handle_stroke_end(
        &self,
        room: &Room,
        user_id: &str,
        stroke_id: &str,
    ) -> Result<(), ErrorCode> {
        let outcome = room.update_stroke(stroke_id, |stroke| {
            if stroke.author_id != user_id {
                return Err(ErrorCode::InvalidStroke);
            }
            stroke.finish();
            Ok(())
        });
        outcome.ok_or(ErrorCode::InvalidStroke)??;

        let seq = room.next_sequence();
        room.broadcast(&codec::stroke_end(stroke_id, user_id, seq), Some(user_id));
        Ok(())
    }

    /// Translate a completed stroke by `(dx, dy)`.
    ///
    /// # Errors
    ///
    /// `InvalidStroke` when the stroke is missing, owned by someone else,
    /// or not yet complete.
    pub fn handle_stroke_move(
        &self,
        room: &Room,
        user_id: &str,
        stroke_id: &str,
        dx: f32,
        dy: f32,
    ) -> Result<(), ErrorCode> {
        let outcome = room.update_stroke(stroke_id, |stroke| {
            if stroke.author_id != user_id || !stroke.complete {
                return Err(ErrorCode::InvalidStroke);
            }
            stroke.translate(dx, dy);
            Ok(())
        });
        outcome.ok_or(ErrorCode::InvalidStroke)??;

        let seq = room.next_sequence();
        room.broadcast(&codec::stroke_move(stroke_id, user_id, dx, dy, seq), Some(user_id));
        Ok(())
    }

    /// Build a `room_state` snapshot of the most recent strokes. The
    /// snapshot sequence is read without advancing the counter.
    #[must_use]
    pub fn snapshot(&self, room: &Room) -> String {
        let strokes = room.stroke_snapshot(self.snapshot_limit);
        codec::room_state(&strokes, room.current_sequence())
    }
}

impl Default for BoardService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
