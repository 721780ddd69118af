use thiserror::Error;

use crate::events::RoomId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("connection already joined room {room_id}")]
    AlreadyJoined { room_id: RoomId },

    #[error("room service is not running")]
    Unavailable,
}

/// A known inbound event whose payload could not be understood.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed `{event}` payload: {source}")]
    Payload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("outbox is full")]
    Full,

    #[error("outbox is closed")]
    Closed,

    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Emit(linkngo_io::error::EmitError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}
