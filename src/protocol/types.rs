//! Message types, error codes, and wire-visible protocol constants.

/// Every WebSocket message type in the protocol.
///
/// Control messages manage room membership, presence messages carry cursor
/// positions, drawing messages carry stroke lifecycle events, and state
/// messages synchronize late joiners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Client → server: request to join a room.
    JoinRoom,
    /// Server → client: successful join response.
    Welcome,
    /// Broadcast: a new user joined.
    UserJoined,
    /// Broadcast: a user disconnected.
    UserLeft,
    /// Client → server and broadcast: cursor position update.
    CursorMove,
    /// Client → server and broadcast: begin a new stroke.
    StrokeStart,
    /// Client → server and broadcast: append points to a stroke.
    StrokeAdd,
    /// Client → server and broadcast: complete a stroke.
    StrokeEnd,
    /// Client → server and broadcast: translate a completed stroke.
    StrokeMove,
    /// Server → client: full board snapshot.
    RoomState,
    /// Client → server: keep-alive request.
    Ping,
    /// Server → client: keep-alive response.
    Pong,
    /// Server → client: error notification.
    Error,
    /// Parsing failed or the type tag was not recognized.
    Unknown,
}

impl MessageType {
    /// Map a wire `type` tag to a message type; unrecognized tags map to
    /// [`MessageType::Unknown`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "join_room" => Self::JoinRoom,
            "welcome" => Self::Welcome,
            "user_joined" => Self::UserJoined,
            "user_left" => Self::UserLeft,
            "cursor_move" => Self::CursorMove,
            "stroke_start" => Self::StrokeStart,
            "stroke_add" => Self::StrokeAdd,
            "stroke_end" => Self::StrokeEnd,
            "stroke_move" => Self::StrokeMove,
            "room_state" => Self::RoomState,
            "ping" => Self::Ping,
            "pong" => Self::Pong,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Wire `type` tag for this message type.
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::JoinRoom => "join_room",
            Self::Welcome => "welcome",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::CursorMove => "cursor_move",
            Self::StrokeStart => "stroke_start",
            Self::StrokeAdd => "stroke_add",
            Self::StrokeEnd => "stroke_end",
            Self::StrokeMove => "stroke_move",
            Self::RoomState => "room_state",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

/// Protocol-level error codes. The display string is the canned
/// human-readable message sent alongside the stable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCode {
    #[error("The requested room does not exist")]
    RoomNotFound,
    #[error("Room has reached maximum capacity (15 users)")]
    RoomFull,
    #[error("Incorrect room password")]
    InvalidPassword,
    #[error("Message format is invalid")]
    MalformedMessage,
    #[error("Unknown message type")]
    InvalidMessageType,
    #[error("Required field is missing")]
    MissingField,
    #[error("Field value is invalid")]
    InvalidField,
    #[error("Too many messages, please slow down")]
    RateLimited,
    #[error("Stroke not found or not owned by you")]
    InvalidStroke,
    #[error("Stroke contains too many points")]
    StrokeTooLarge,
    #[error("You must join a room first")]
    NotInRoom,
    #[error("You are already in a room")]
    AlreadyInRoom,
    #[error("An unexpected error occurred")]
    InternalError,
}

impl ErrorCode {
    /// Stable uppercase machine code carried in error frames.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomFull => "ROOM_FULL",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::MalformedMessage => "MALFORMED_MESSAGE",
            Self::InvalidMessageType => "INVALID_MESSAGE_TYPE",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidField => "INVALID_FIELD",
            Self::RateLimited => "RATE_LIMITED",
            Self::InvalidStroke => "INVALID_STROKE",
            Self::StrokeTooLarge => "STROKE_TOO_LARGE",
            Self::NotInRoom => "NOT_IN_ROOM",
            Self::AlreadyInRoom => "ALREADY_IN_ROOM",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

/// Wire-visible protocol constants.
pub mod constants {
    /// Maximum participants per room.
    pub const MAX_USERS_PER_ROOM: usize = 15;
    /// Maximum retained strokes per room; older strokes are pruned first.
    pub const MAX_STROKES_PER_ROOM: usize = 1000;
    /// Strokes included in a `room_state` snapshot.
    pub const SNAPSHOT_STROKE_LIMIT: usize = 500;
    /// Reduced snapshot size for constrained clients.
    pub const SNAPSHOT_STROKE_LIMIT_SMALL: usize = 200;

    /// Maximum inbound frame size in bytes.
    pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;
    /// Maximum points a single stroke may accumulate.
    pub const MAX_POINTS_PER_STROKE: usize = 10_000;

    pub const HEARTBEAT_INTERVAL_MS: u64 = 10_000;
    pub const HEARTBEAT_TIMEOUT_MS: u64 = 30_000;
    pub const GHOST_CURSOR_TIMEOUT_MS: u64 = 3_000;
    pub const RATE_LIMIT_MUTE_DURATION_MS: u64 = 10_000;

    /// Cursor limiter refill rate (tokens per second).
    pub const CURSOR_UPDATES_PER_SECOND: f64 = 20.0;
    /// Cursor limiter burst capacity.
    pub const RATE_LIMIT_BURST_SIZE: f64 = 5.0;

    /// Delay between a room becoming empty and its reclamation.
    pub const EMPTY_ROOM_GRACE_SECONDS: u64 = 60;
    /// Idle age after which limiter buckets are evicted.
    pub const BUCKET_IDLE_SECONDS: u64 = 300;
}
