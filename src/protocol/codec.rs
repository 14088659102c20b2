//! JSON serialization and deserialization of protocol messages.
//!
//! DESIGN
//! ======
//! Every frame is `{ "type", "seq", "timestamp", "data" }`. Parsing is
//! tolerant about the envelope (missing `seq`/`timestamp`/`data` default to
//! zero values) but strict about JSON syntax; payload validation is a
//! separate step so the dispatcher can choose the right error code.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};

use crate::protocol::types::{ErrorCode, MessageType};
use crate::room::{Point, Stroke, UserInfo};

/// A parsed inbound frame.
#[derive(Debug, Clone)]
pub struct Incoming {
    pub kind: MessageType,
    pub seq: u64,
    pub timestamp: i64,
    pub data: Map<String, Value>,
}

/// Current time as milliseconds since Unix epoch.
fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse a raw text frame into an [`Incoming`].
///
/// # Errors
///
/// Returns [`ErrorCode::MalformedMessage`] when the text is not a JSON
/// object. An unrecognized or missing `type` tag is not an error here; it
/// surfaces as [`MessageType::Unknown`] for the dispatcher to reject.
pub fn parse(raw: &str) -> Result<Incoming, ErrorCode> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ErrorCode::MalformedMessage)?;
    let Value::Object(mut obj) = value else {
        return Err(ErrorCode::MalformedMessage);
    };

    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .map_or(MessageType::Unknown, MessageType::from_tag);
    let seq = obj.get("seq").and_then(Value::as_u64).unwrap_or(0);
    let timestamp = obj.get("timestamp").and_then(Value::as_i64).unwrap_or(0);
    let data = match obj.remove("data") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    Ok(Incoming { kind, seq, timestamp, data })
}

// =============================================================================
// PAYLOAD VALIDATION
// =============================================================================

pub fn validate_join_room(data: &Map<String, Value>) -> bool {
    data.get("roomId").is_some_and(Value::is_string)
        && data.get("userName").is_some_and(Value::is_string)
}

pub fn validate_cursor_move(data: &Map<String, Value>) -> bool {
    data.get("x").is_some_and(Value::is_number) && data.get("y").is_some_and(Value::is_number)
}

pub fn validate_stroke_start(data: &Map<String, Value>) -> bool {
    data.get("strokeId").is_some_and(Value::is_string)
        && data.get("color").is_some_and(Value::is_string)
        && data.get("width").is_some_and(Value::is_number)
}

pub fn validate_stroke_add(data: &Map<String, Value>) -> bool {
    data.get("strokeId").is_some_and(Value::is_string)
        && data.get("points").is_some_and(Value::is_array)
}

pub fn validate_stroke_end(data: &Map<String, Value>) -> bool {
    data.get("strokeId").is_some_and(Value::is_string)
}

pub fn validate_stroke_move(data: &Map<String, Value>) -> bool {
    data.get("strokeId").is_some_and(Value::is_string)
        && data.get("dx").is_some_and(Value::is_number)
        && data.get("dy").is_some_and(Value::is_number)
}

/// Extract a `points` array of `[x, y]` pairs. Entries that are not
/// two-element numeric arrays are skipped.
#[must_use]
pub fn extract_points(data: &Map<String, Value>) -> Vec<Point> {
    let Some(Value::Array(raw)) = data.get("points") else {
        return Vec::new();
    };
    raw.iter()
        .filter_map(|entry| {
            let pair = entry.as_array()?;
            if pair.len() < 2 {
                return None;
            }
            let x = pair[0].as_f64()? as f32;
            let y = pair[1].as_f64()? as f32;
            Some(Point { x, y })
        })
        .collect()
}

// =============================================================================
// MESSAGE CREATION
// =============================================================================

/// Build the common frame envelope around a data payload.
#[must_use]
pub fn message(kind: MessageType, seq: u64, data: Value) -> String {
    json!({
        "type": kind.as_tag(),
        "seq": seq,
        "timestamp": now_ms(),
        "data": data,
    })
    .to_string()
}

/// `welcome` frame sent to a user on successful join. `users` includes the
/// joiner itself.
#[must_use]
pub fn welcome(user_id: &str, color: &str, users: &[UserInfo], seq: u64) -> String {
    let user_array: Vec<Value> = users
        .iter()
        .map(|u| json!({ "userId": u.user_id, "name": u.name, "color": u.color }))
        .collect();
    message(
        MessageType::Welcome,
        seq,
        json!({ "userId": user_id, "color": color, "users": user_array }),
    )
}

#[must_use]
pub fn user_joined(user_id: &str, name: &str, color: &str, seq: u64) -> String {
    message(
        MessageType::UserJoined,
        seq,
        json!({ "userId": user_id, "name": name, "color": color }),
    )
}

#[must_use]
pub fn user_left(user_id: &str, seq: u64) -> String {
    message(MessageType::UserLeft, seq, json!({ "userId": user_id }))
}

#[must_use]
pub fn cursor_move(user_id: &str, x: f32, y: f32, seq: u64) -> String {
    message(MessageType::CursorMove, seq, json!({ "userId": user_id, "x": x, "y": y }))
}

#[must_use]
pub fn stroke_start(stroke_id: &str, user_id: &str, color: &str, width: f32, seq: u64) -> String {
    message(
        MessageType::StrokeStart,
        seq,
        json!({ "strokeId": stroke_id, "userId": user_id, "color": color, "width": width }),
    )
}

#[must_use]
pub fn stroke_add(stroke_id: &str, user_id: &str, points: &[Point], seq: u64) -> String {
    message(
        MessageType::StrokeAdd,
        seq,
        json!({ "strokeId": stroke_id, "userId": user_id, "points": points_array(points) }),
    )
}

#[must_use]
pub fn stroke_end(stroke_id: &str, user_id: &str, seq: u64) -> String {
    message(MessageType::StrokeEnd, seq, json!({ "strokeId": stroke_id, "userId": user_id }))
}

#[must_use]
pub fn stroke_move(stroke_id: &str, user_id: &str, dx: f32, dy: f32, seq: u64) -> String {
    message(
        MessageType::StrokeMove,
        seq,
        json!({ "strokeId": stroke_id, "userId": user_id, "dx": dx, "dy": dy }),
    )
}

/// `room_state` snapshot for late joiners.
#[must_use]
pub fn room_state(strokes: &[Stroke], snapshot_seq: u64) -> String {
    let stroke_array: Vec<Value> = strokes
        .iter()
        .map(|s| {
            json!({
                "strokeId": s.stroke_id,
                "userId": s.author_id,
                "points": points_array(&s.points),
                "color": s.color,
                "width": s.width,
                "complete": s.complete,
            })
        })
        .collect();
    message(
        MessageType::RoomState,
        snapshot_seq,
        json!({ "strokes": stroke_array, "snapshotSeq": snapshot_seq }),
    )
}

#[must_use]
pub fn pong(seq: u64) -> String {
    message(MessageType::Pong, seq, json!({}))
}

/// Error frame carrying the stable code and its canned message.
#[must_use]
pub fn error(code: ErrorCode, seq: u64) -> String {
    message(
        MessageType::Error,
        seq,
        json!({ "code": code.code(), "message": code.to_string() }),
    )
}

/// Error frame with a custom human-readable message.
#[must_use]
pub fn error_with_message(code: ErrorCode, custom: &str, seq: u64) -> String {
    message(MessageType::Error, seq, json!({ "code": code.code(), "message": custom }))
}

fn points_array(points: &[Point]) -> Vec<Value> {
    points.iter().map(|p| json!([p.x, p.y])).collect()
}

#[cfg(test)]
#[path = "codec_test.rs"]
mod tests;
