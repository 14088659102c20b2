//! Wire protocol: message vocabulary, error codes, and the JSON codec.

pub mod codec;
pub mod types;

pub use codec::Incoming;
pub use types::{constants, ErrorCode, MessageType};
