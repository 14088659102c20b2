//! Identifier generation.
//!
//! DESIGN
//! ======
//! User IDs are full RFC 4122 v4 UUIDs with a `user-` prefix. Stroke and
//! room IDs only need to be unique within a room or registry, so they use a
//! cheaper 8-hex-digit short id with a matching prefix.

use std::fmt::Write;

use rand::Rng;
use uuid::Uuid;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate an 8-hex-character short id.
#[must_use]
pub fn short_id() -> String {
    let bytes: [u8; 4] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Generate a server-assigned user id: `user-<uuid v4>`.
#[must_use]
pub fn new_user_id() -> String {
    format!("user-{}", Uuid::new_v4())
}

/// Generate a stroke id: `stroke-<8 hex>`.
#[must_use]
pub fn new_stroke_id() -> String {
    format!("stroke-{}", short_id())
}

/// Generate a room id: `room-<8 hex>`.
#[must_use]
pub fn new_room_id() -> String {
    format!("room-{}", short_id())
}

/// Check whether `s` is a canonically formatted UUID v4:
/// `xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx` with `y` in `[89abAB]`.
#[must_use]
pub fn is_valid_uuid(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 36 {
        return false;
    }
    if bytes[8] != b'-' || bytes[13] != b'-' || bytes[18] != b'-' || bytes[23] != b'-' {
        return false;
    }
    if bytes[14] != b'4' {
        return false;
    }
    if !matches!(bytes[19], b'8' | b'9' | b'a' | b'b' | b'A' | b'B') {
        return false;
    }
    bytes
        .iter()
        .enumerate()
        .filter(|(i, _)| !matches!(i, 8 | 13 | 18 | 23))
        .all(|(_, b)| b.is_ascii_hexdigit())
}
