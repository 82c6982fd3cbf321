//! Error types for transport and playlist operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric error code carried on the `error` event
///
/// - `< 0`: internal logic error
/// - `0`: unknown load error
/// - `1..=4`: platform media error (aborted, network, decode, unsupported source)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum ErrorCode {
    /// Internal logic error (validation, playback exception)
    Internal = -1,

    /// Load failed for an unknown reason
    Unknown = 0,

    /// Fetching was aborted by the platform
    Aborted = 1,

    /// Network failure (also used for load timeouts)
    Network = 2,

    /// Media could not be decoded
    Decode = 3,

    /// Source format not supported by the platform
    SourceNotSupported = 4,
}

impl ErrorCode {
    /// Map a platform media error code, falling back to `Unknown`
    pub fn from_media(code: u16) -> Self {
        match code {
            1 => ErrorCode::Aborted,
            2 => ErrorCode::Network,
            3 => ErrorCode::Decode,
            4 => ErrorCode::SourceNotSupported,
            _ => ErrorCode::Unknown,
        }
    }

    /// Raw numeric value
    pub fn as_i8(self) -> i8 {
        self as i8
    }
}

/// Transport errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Media type missing or not in the capability set
    #[error("No mime type or unsupported: {src}")]
    UnsupportedMediaType { src: String },

    /// Track index outside the play order
    #[error("Invalid track index: {0}")]
    InvalidIndex(i64),

    /// Lookup produced no track
    #[error("No track data, please load track first")]
    NoTrackData,

    /// Neither ready nor error was signalled before the deadline
    #[error("Loading audio {src} timeout after {timeout_ms}ms")]
    LoadTimeout { src: String, timeout_ms: u64 },

    /// Error reported by the platform media element
    #[error("{message}")]
    Media { code: ErrorCode, message: String },

    /// Starting playback failed
    #[error("Failed to play audio, {0}")]
    Playback(String),

    /// Output device or graph failure
    #[error("Output error: {0}")]
    Output(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Operation issued after `destroy`
    #[error("Engine has been destroyed")]
    Destroyed,
}

impl TransportError {
    /// Error code reported alongside this error
    pub fn code(&self) -> ErrorCode {
        match self {
            TransportError::Media { code, .. } => *code,
            TransportError::LoadTimeout { .. } => ErrorCode::Network,
            TransportError::UnsupportedMediaType { .. }
            | TransportError::InvalidIndex(_)
            | TransportError::NoTrackData
            | TransportError::Playback(_)
            | TransportError::Output(_)
            | TransportError::Config(_)
            | TransportError::Destroyed => ErrorCode::Internal,
        }
    }
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
