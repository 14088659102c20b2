//! WebSocket handler — one task per connection.
//!
//! DESIGN
//! ======
//! On upgrade, each connection gets a bounded outbound channel whose sender
//! is handed to the room engine as the connection capability. The task then
//! enters a `select!` loop:
//! - incoming text frames → the message dispatcher
//! - outbound frames from the engine → the socket (FIFO, preserving the
//!   room's broadcast order on the wire)
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → loop
//! 2. `join_room` stamps the session's room/user ids
//! 3. Socket close or error → leave the room, dropping the receiver so any
//!    in-flight broadcast skips this peer

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::debug;

use crate::handler::SessionState;
use crate::state::AppState;

/// Outbound frames buffered per connection before slow peers are skipped.
const OUTBOUND_BUFFER: usize = 256;

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let mut session = SessionState::default();

    debug!("ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        state.handler.handle(&tx, &mut session, &text);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(out) = rx.recv() => {
                if socket.send(Message::Text(out.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Drop the receiver before leaving so concurrent broadcasts see a
    // closed channel instead of filling a dead buffer.
    rx.close();
    if let (Some(room_id), Some(user_id)) = (&session.room_id, &session.user_id) {
        state.rooms.leave_room(room_id, user_id);
    }
    debug!("ws: client disconnected");
}
