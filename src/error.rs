use thiserror::Error;

/// Represents a connection closure with a code and reason.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct ConnClose {
    /// represents the status code of the close event.
    pub code: u16,
    /// represents the reason for the close event
    pub reason: Box<str>,
}

/// Errors that can occur while emitting an event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmitError {
    /// The event name exceeds the allowed size (255 bytes).
    #[error("event name exceeds the allowed length.")]
    EventNameTooBig,
    /// The outbound queue has no free slot.
    #[error("outbound queue is full.")]
    Full,
    /// The receiver channel has been closed.
    #[error("receiver is already closed.")]
    ReceiverClosed,
}

/// A data message that is not a well formed event frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("insufficient bytes")]
    InsufficientBytes,
    #[error("event name is not valid utf-8")]
    InvalidName,
}
