//! IPC response types.

use serde::{Deserialize, Serialize};

use crate::types::SessionStatus;

/// IPC response from service to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    // === Success Responses ===
    /// Session initialization outcome
    SessionInitialized { success: bool },
    /// Payload relayed to the active session
    Sent,
    /// Capture pipeline started
    CaptureStarted,
    /// Capture pipeline stopped
    CaptureStopped,
    /// Transcription finished
    Transcription { text: String },
    /// Transcript written to disk
    TranscriptExported { file_path: String },
    /// Current session/capture status
    Status(SessionStatus),
    /// Subscribed to events
    Subscribed,
    /// Generic success
    Ok,
    /// Pong response to ping
    Pong,

    // === Error Response ===
    /// Error occurred
    Error { message: String },

    // === Event Responses (after Subscribe) ===
    /// Real-time event
    Event { event: EventType },
}

/// Events streamed to subscribed clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventType {
    /// Status-text update ("Listening...", download progress, ...)
    Status { message: String },
    /// A completed assistant response
    Response { text: String },
    /// Service is shutting down
    Shutdown,
}

impl Response {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    /// Check if this response indicates an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}
