//! Driver boundary errors

use contracts::StreamType;
use thiserror::Error;

/// Errors reported to driver collaborators by [`crate::DriverBridge`]
#[derive(Debug, Error)]
pub enum IngestionError {
    /// No source node registered this stream id
    #[error("unknown stream {stream_id}")]
    UnknownStream {
        /// Stream id, `node/output`
        stream_id: String,
    },

    /// Delivered value type does not match the registered stream
    #[error("stream {stream_id} carries {expected}, delivered value has a different type")]
    StreamTypeMismatch {
        /// Stream id
        stream_id: String,
        /// Registered stream type
        expected: StreamType,
    },

    /// Handoff queue full, sample dropped
    #[error("queue full for stream {stream_id}, sample dropped")]
    QueueFull {
        /// Stream id
        stream_id: String,
    },

    /// Stream id already owned by another source node
    #[error("stream {stream_id} is already registered")]
    AlreadyRegistered {
        /// Stream id
        stream_id: String,
    },

    /// Receiving side dropped
    #[error("channel closed for stream {stream_id}")]
    ChannelClosed {
        /// Stream id
        stream_id: String,
    },
}

impl IngestionError {
    /// Create an unknown stream error
    pub fn unknown_stream(stream_id: impl Into<String>) -> Self {
        Self::UnknownStream {
            stream_id: stream_id.into(),
        }
    }

    /// Create a queue full error
    pub fn queue_full(stream_id: impl Into<String>) -> Self {
        Self::QueueFull {
            stream_id: stream_id.into(),
        }
    }

    /// Whether the sample was lost to backpressure rather than misuse
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }
}

/// Ingestion Result type
pub type Result<T> = std::result::Result<T, IngestionError>;
