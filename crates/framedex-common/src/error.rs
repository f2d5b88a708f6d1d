//! Error taxonomy shared by the index and the decode sequencers.
//!
//! End of stream is not represented here: demux reads return `Option` and
//! `None` is the terminal condition.

use crate::types::MediaKind;
use std::collections::TryReserveError;

/// Common error type for framedex.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The container could not be opened or probed.
    #[error("Failed to open media: {0}")]
    Open(String),

    /// No track of the requested kind exists.
    #[error("No {0} track found")]
    TrackNotFound(MediaKind),

    /// Growing an index store or an output buffer failed.
    #[error("Allocation failed: {0}")]
    Allocation(String),

    /// The demuxer could not honour a seek key.
    #[error("Seek failed: {0}")]
    Seek(String),

    /// The decoder rejected a compressed unit.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Two consecutive presentation timestamps are equal.
    #[error("Duplicate presentation timestamp at sample {sample}")]
    TimingInconsistency { sample: u32 },

    /// The track was deactivated or never activated.
    #[error("Track unavailable: {0}")]
    Unavailable(String),

    /// Invalid input was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new Open error.
    pub fn open<S: Into<String>>(msg: S) -> Self {
        Self::Open(msg.into())
    }

    /// Create a new Allocation error.
    pub fn allocation<S: Into<String>>(msg: S) -> Self {
        Self::Allocation(msg.into())
    }

    /// Create a new Seek error.
    pub fn seek<S: Into<String>>(msg: S) -> Self {
        Self::Seek(msg.into())
    }

    /// Create a new Decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new Unavailable error.
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the failure is confined to one unit or one seek, so decoding
    /// can carry on from elsewhere in the stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Seek(_) | Self::Decode(_))
    }
}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Self::Allocation(err.to_string())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
