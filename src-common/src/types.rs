//! Shared types for the assistant session and service surface.

use serde::{Deserialize, Serialize};

/// Default conversation profile when the client does not specify one.
pub const DEFAULT_PROFILE: &str = "interview";

/// Default BCP-47 language tag for the realtime session.
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Default whisper model (short name, resolves to `ggml-base.en.bin`).
pub const DEFAULT_MODEL: &str = "base.en";

/// Mime type of the raw system-audio chunks relayed to the session.
pub const PCM_MIME_TYPE: &str = "audio/pcm;rate=24000";

/// Configuration for opening a realtime session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// API key for the realtime service.
    pub api_key: String,
    /// Extra prompt text appended to the profile's system prompt.
    #[serde(default)]
    pub custom_prompt: String,
    /// Conversation profile (interview, sales, meeting, ...).
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Spoken-language tag passed to the session's speech config.
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Snapshot of the service's session and capture state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Whether a realtime session is currently open.
    pub session_active: bool,
    /// Whether the system-audio capture subprocess is running.
    pub capture_running: bool,
}
