//! Message dispatcher — routes parsed frames to the services.
//!
//! DESIGN
//! ======
//! The dispatcher is pure routing: parse, classify, validate, delegate.
//! Error policy per message class:
//! - protocol errors (malformed, unknown type, missing field) and
//!   join-time errors are reported to the offending connection;
//! - per-room operations from a connection that has not joined are
//!   silently dropped;
//! - stroke and cursor operation errors are swallowed (logged only).
//!
//! Errors never tear down a room or a connection.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::protocol::codec;
use crate::protocol::constants::MAX_MESSAGE_SIZE;
use crate::protocol::{ErrorCode, Incoming, MessageType};
use crate::room::ConnectionTx;
use crate::services::room::RoomService;

/// Per-connection membership state, stamped by a successful join.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    pub room_id: Option<String>,
    pub user_id: Option<String>,
}

impl SessionState {
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.room_id.is_some() && self.user_id.is_some()
    }
}

/// Dispatches incoming frames from one connection to the room services.
pub struct MessageHandler {
    rooms: Arc<RoomService>,
}

impl MessageHandler {
    #[must_use]
    pub fn new(rooms: Arc<RoomService>) -> Self {
        Self { rooms }
    }

    /// Process one raw text frame from `conn`. A successful join stamps
    /// `session` so later per-room operations can be routed.
    pub fn handle(&self, conn: &ConnectionTx, session: &mut SessionState, raw: &str) {
        if raw.len() > MAX_MESSAGE_SIZE {
            let _ = conn.try_send(codec::error(ErrorCode::MalformedMessage, 0));
            return;
        }

        let msg = match codec::parse(raw) {
            Ok(msg) => msg,
            Err(code) => {
                let _ = conn.try_send(codec::error(code, 0));
                return;
            }
        };

        match msg.kind {
            MessageType::JoinRoom => self.handle_join(conn, session, &msg),
            MessageType::CursorMove => self.handle_cursor(session, &msg),
            MessageType::StrokeStart => self.handle_stroke_start(session, &msg),
            MessageType::StrokeAdd => self.handle_stroke_add(session, &msg),
            MessageType::StrokeEnd => self.handle_stroke_end(session, &msg),
            MessageType::StrokeMove => self.handle_stroke_move(session, &msg),
            MessageType::Ping => {
                let _ = conn.try_send(codec::pong(msg.seq));
            }
            _ => {
                // Server-to-client tags and unknown tags are equally invalid
                // coming from a client.
                let _ = conn.try_send(codec::error(ErrorCode::InvalidMessageType, 0));
            }
        }
    }

    fn handle_join(&self, conn: &ConnectionTx, session: &mut SessionState, msg: &Incoming) {
        if !codec::validate_join_room(&msg.data) {
            let _ = conn.try_send(codec::error(ErrorCode::MissingField, 0));
            return;
        }
        if session.is_joined() {
            let _ = conn.try_send(codec::error(ErrorCode::AlreadyInRoom, 0));
            return;
        }

        let room_id = field_str(msg, "roomId");
        let user_name = field_str(msg, "userName");
        let password = msg
            .data
            .get("password")
            .and_then(Value::as_str)
            .unwrap_or("");

        match self.rooms.join_room(room_id, user_name, password, conn.clone()) {
            Ok(join) => {
                session.room_id = Some(room_id.to_owned());
                session.user_id = Some(join.user_id);
            }
            Err(code) => {
                let _ = conn.try_send(codec::error(code, 0));
            }
        }
    }

    fn handle_cursor(&self, session: &SessionState, msg: &Incoming) {
        let Some((room_id, user_id)) = joined(session) else {
            return;
        };
        if !codec::validate_cursor_move(&msg.data) {
            return;
        }
        let x = field_f32(msg, "x");
        let y = field_f32(msg, "y");
        // Rate-limited moves are dropped without a reply.
        let _ = self.rooms.handle_cursor_move(room_id, user_id, x, y);
    }

    fn handle_stroke_start(&self, session: &SessionState, msg: &Incoming) {
        let Some((room_id, user_id)) = joined(session) else {
            return;
        };
        if !codec::validate_stroke_start(&msg.data) {
            return;
        }
        let stroke_id = field_str(msg, "strokeId");
        let color = field_str(msg, "color");
        let width = field_f32(msg, "width");
        if let Err(code) = self
            .rooms
            .handle_stroke_start(room_id, user_id, stroke_id, color, width)
        {
            debug!(%room_id, %user_id, %stroke_id, code = code.code(), "stroke_start rejected");
        }
    }

    fn handle_stroke_add(&self, session: &SessionState, msg: &Incoming) {
        let Some((room_id, user_id)) = joined(session) else {
            return;
        };
        if !codec::validate_stroke_add(&msg.data) {
            return;
        }
        let stroke_id = field_str(msg, "strokeId");
        let points = codec::extract_points(&msg.data);
        if let Err(code) = self
            .rooms
            .handle_stroke_add(room_id, user_id, stroke_id, &points)
        {
            debug!(%room_id, %user_id, %stroke_id, code = code.code(), "stroke_add rejected");
        }
    }

    fn handle_stroke_end(&self, session: &SessionState, msg: &Incoming) {
        let Some((room_id, user_id)) = joined(session) else {
            return;
        };
        if !codec::validate_stroke_end(&msg.data) {
            return;
        }
        let stroke_id = field_str(msg, "strokeId");
        if let Err(code) = self.rooms.handle_stroke_end(room_id, user_id, stroke_id) {
            debug!(%room_id, %user_id, %stroke_id, code = code.code(), "stroke_end rejected");
        }
    }

    fn handle_stroke_move(&self, session: &SessionState, msg: &Incoming) {
        let Some((room_id, user_id)) = joined(session) else {
            return;
        };
        if !codec::validate_stroke_move(&msg.data) {
            return;
        }
        let stroke_id = field_str(msg, "strokeId");
        let dx = field_f32(msg, "dx");
        let dy = field_f32(msg, "dy");
        if let Err(code) = self
            .rooms
            .handle_stroke_move(room_id, user_id, stroke_id, dx, dy)
        {
            debug!(%room_id, %user_id, %stroke_id, code = code.code(), "stroke_move rejected");
        }
    }
}

fn joined(session: &SessionState) -> Option<(&str, &str)> {
    match (&session.room_id, &session.user_id) {
        (Some(room_id), Some(user_id)) => Some((room_id, user_id)),
        _ => None,
    }
}

fn field_str<'a>(msg: &'a Incoming, key: &str) -> &'a str {
    msg.data.get(key).and_then(Value::as_str).unwrap_or("")
}

fn field_f32(msg: &Incoming, key: &str) -> f32 {
    msg.data.get(key).and_then(Value::as_f64).unwrap_or(0.0) as f32
}

#[cfg(test)]
#[path = "handler_test.rs"]
mod tests;
