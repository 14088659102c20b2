//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the room registry and the message dispatcher; everything else is
//! per-connection state owned by the websocket task.

use std::sync::Arc;

use crate::handler::MessageHandler;
use crate::services::room::RoomService;

/// Shared application state. Clone is required by Axum; all inner fields
/// are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomService>,
    pub handler: Arc<MessageHandler>,
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        let rooms = Arc::new(RoomService::new());
        let handler = Arc::new(MessageHandler::new(rooms.clone()));
        Self { rooms, handler }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
