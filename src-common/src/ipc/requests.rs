//! IPC request types.

use serde::{Deserialize, Serialize};

use crate::validation::{
    validate_bounded, validate_data_uri, validate_non_empty, ValidationError, MAX_API_KEY_LEN,
    MAX_MEDIA_LEN, MAX_TAG_LEN, MAX_TEXT_LEN, MAX_TRANSCRIPT_LEN,
};

/// IPC request from client to service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    // === Realtime Session ===
    /// Open (or replace) the realtime assistant session
    InitializeSession {
        api_key: String,
        #[serde(default)]
        custom_prompt: String,
        #[serde(default)]
        profile: Option<String>,
        #[serde(default)]
        language: Option<String>,
    },
    /// Relay an audio chunk to the active session
    SendAudio { data: String, mime_type: String },
    /// Relay an image frame (base64 JPEG) to the active session
    SendImage { data: String },
    /// Relay a text message to the active session
    SendText { text: String },
    /// Close the active session
    CloseSession,

    // === System Audio Capture ===
    /// Start the continuous system-audio capture pipeline
    StartSystemAudio,
    /// Stop the capture pipeline
    StopSystemAudio,

    // === Local Transcription ===
    /// Transcribe a recorded audio payload (data URI) with the local model
    Transcribe { audio_data_uri: String },
    /// Write a transcript to a text file under the data directory
    ExportTranscript { text: String },

    // === State Queries ===
    /// Get the current session/capture status
    GetStatus,
    /// Subscribe to status and response events
    SubscribeEvents,

    // === Service Control ===
    /// Ping for health check
    Ping,
    /// Stop capture, close the session, and shut the service down
    Quit,
}

impl Request {
    /// Validate all parameters in this request.
    ///
    /// Returns Ok(()) if all parameters are valid, or an error describing
    /// the first invalid parameter found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Request::InitializeSession {
                api_key,
                custom_prompt,
                profile,
                language,
            } => {
                validate_non_empty("api key", api_key, MAX_API_KEY_LEN)?;
                validate_bounded("custom prompt", custom_prompt, MAX_TEXT_LEN)?;
                if let Some(profile) = profile {
                    validate_non_empty("profile", profile, MAX_TAG_LEN)?;
                }
                if let Some(language) = language {
                    validate_non_empty("language", language, MAX_TAG_LEN)?;
                }
            }
            Request::SendAudio { data, mime_type } => {
                validate_non_empty("audio data", data, MAX_MEDIA_LEN)?;
                validate_non_empty("mime type", mime_type, MAX_TAG_LEN)?;
            }
            Request::SendImage { data } => {
                validate_non_empty("image data", data, MAX_MEDIA_LEN)?;
            }
            Request::SendText { text } => {
                validate_non_empty("text", text, MAX_TEXT_LEN)?;
            }
            Request::Transcribe { audio_data_uri } => {
                validate_data_uri(audio_data_uri)?;
            }
            Request::ExportTranscript { text } => {
                validate_non_empty("transcript", text, MAX_TRANSCRIPT_LEN)?;
            }
            // Other requests have no parameters to validate
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_transcribe_payload_fails_validation() {
        let request = Request::Transcribe {
            audio_data_uri: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn blank_text_message_fails_validation() {
        let request = Request::SendText {
            text: "   ".to_string(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn session_init_roundtrips_with_defaults() {
        let json = r#"{"type":"initialize_session","api_key":"k"}"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_ok());
        match request {
            Request::InitializeSession {
                profile, language, ..
            } => {
                assert!(profile.is_none());
                assert!(language.is_none());
            }
            other => panic!("unexpected request: {:?}", other),
        }
    }
}
