use thiserror::Error;

/// Errors raised while encoding or decoding the hash-vector wire format
/// shared by sync messages and persisted peer state (spec §4.2).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FormatError {
    #[error("hash is {0} bytes, expected 32")]
    BadHashLength(usize),
    #[error("hash vector is not strictly ascending")]
    UnsortedHashes,
    #[error("not enough input to decode hash vector")]
    Truncated,
}

/// Errors raised while encoding or decoding a sync message (spec §4.3, §7).
#[derive(Error, Debug)]
pub enum MessageCodecError {
    #[error("expected message type 0x42 but found {0:#x}")]
    WrongType(u8),
    #[error("not enough input to decode message")]
    Truncated,
    #[error("{0}")]
    Format(FormatError),
}

impl From<FormatError> for MessageCodecError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Truncated => MessageCodecError::Truncated,
            other => MessageCodecError::Format(other),
        }
    }
}

/// Errors raised while encoding or decoding persisted peer state (spec
/// §4.4, §7).
#[derive(Error, Debug)]
pub enum StateCodecError {
    #[error("expected state type 0x43 but found {0:#x}")]
    WrongType(u8),
    #[error("not enough input to decode peer state")]
    Truncated,
    #[error("{0}")]
    Format(FormatError),
}

impl From<FormatError> for StateCodecError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Truncated => StateCodecError::Truncated,
            other => StateCodecError::Format(other),
        }
    }
}

/// Top-level error type threaded through the public sync-core operations.
#[derive(Error, Debug)]
pub enum DagsyncError<B: std::error::Error> {
    #[error("malformed sync message: {0}")]
    Message(#[from] MessageCodecError),
    #[error("malformed peer state: {0}")]
    State(#[from] StateCodecError),
    #[error("backend error: {0}")]
    Backend(B),
}
