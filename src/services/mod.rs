//! Domain services used by the message dispatcher.
//!
//! ARCHITECTURE
//! ============
//! Service modules own the room-engine business logic so the dispatcher and
//! the websocket transport stay focused on protocol translation. `room`
//! owns the registry and join/leave orchestration, `board` the stroke
//! lifecycle, and `presence` cursor updates and ghost detection.

pub mod board;
pub mod presence;
pub mod room;
