//! Realtime assistant session management.
//!
//! The session is owned by a single [`SessionManager`]; there is at most one
//! live session per service process. Outbound payloads go to a worker thread
//! that owns the WebSocket; inbound traffic comes back as [`SessionEvent`]s
//! consumed by the aggregator task.

pub mod aggregator;
pub mod prompts;
pub mod worker;

use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use cheddar_common::SessionConfig;

use crate::state::ServiceEvent;
use worker::SessionCommand;

/// Minimum decoded size for a relayed image frame. Anything smaller is a
/// broken screenshot, not a real frame.
const MIN_IMAGE_BYTES: usize = 1000;

const NO_SESSION_ERROR: &str = "No active Gemini session";

struct ActiveSession {
    commands: std::sync::mpsc::Sender<SessionCommand>,
}

/// Exclusive owner of the (at most one) realtime session.
pub struct SessionManager {
    active: Mutex<Option<ActiveSession>>,
    events: broadcast::Sender<ServiceEvent>,
}

impl SessionManager {
    pub fn new(events: broadcast::Sender<ServiceEvent>) -> Self {
        Self {
            active: Mutex::new(None),
            events,
        }
    }

    /// Whether a session is currently open.
    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Open a realtime session, replacing any previous one.
    ///
    /// Connects and performs the setup exchange before swapping the session
    /// in, so a failed connect leaves the old session untouched.
    pub async fn initialize(&self, config: SessionConfig) -> Result<(), String> {
        let system_prompt = prompts::system_prompt(&config.profile, &config.custom_prompt);
        let api_key = config.api_key.clone();
        let language = config.language.clone();

        let socket = tokio::task::spawn_blocking(move || {
            worker::connect_and_setup(&api_key, &system_prompt, &language)
        })
        .await
        .map_err(|e| format!("Session connect task failed: {}", e))??;

        let (command_tx, command_rx) = std::sync::mpsc::channel();
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("realtime-session".to_string())
            .spawn(move || worker::run(socket, command_rx, event_tx))
            .map_err(|e| format!("Failed to spawn session worker: {}", e))?;

        tokio::spawn(aggregator::run(event_rx, self.events.clone()));

        let mut guard = self.active.lock().await;
        if let Some(old) = guard.take() {
            info!("Replacing existing realtime session");
            let _ = old.commands.send(SessionCommand::Close);
        }
        *guard = Some(ActiveSession {
            commands: command_tx,
        });

        info!(
            "Realtime session opened (profile: {}, language: {})",
            config.profile, config.language
        );
        Ok(())
    }

    /// Relay an audio chunk to the active session.
    pub async fn send_audio(&self, data: String, mime_type: String) -> Result<(), String> {
        self.send_command(SessionCommand::Audio { data, mime_type })
            .await
    }

    /// Relay an image frame (base64 JPEG) to the active session.
    pub async fn send_image(&self, data: String) -> Result<(), String> {
        let decoded = BASE64
            .decode(data.as_bytes())
            .map_err(|_| "Invalid image data".to_string())?;
        if decoded.len() < MIN_IMAGE_BYTES {
            return Err("Image buffer too small".to_string());
        }
        self.send_command(SessionCommand::Image { data }).await
    }

    /// Relay a text message to the active session.
    pub async fn send_text(&self, text: String) -> Result<(), String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err("Invalid text message".to_string());
        }
        self.send_command(SessionCommand::Text {
            text: trimmed.to_string(),
        })
        .await
    }

    /// Request graceful session termination. Safe with no active session.
    pub async fn close(&self) {
        let mut guard = self.active.lock().await;
        if let Some(session) = guard.take() {
            info!("Closing realtime session");
            let _ = session.commands.send(SessionCommand::Close);
        }
    }

    async fn send_command(&self, command: SessionCommand) -> Result<(), String> {
        let mut guard = self.active.lock().await;
        let Some(session) = guard.as_ref() else {
            return Err(NO_SESSION_ERROR.to_string());
        };
        if session.commands.send(command).is_err() {
            // Worker is gone (socket died); drop the stale handle so the
            // failure is reported once and a new session can be opened.
            warn!("Realtime session worker is gone, clearing session");
            *guard = None;
            return Err("Realtime session is no longer available".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn manager() -> Arc<SessionManager> {
        let (events, _) = broadcast::channel(16);
        Arc::new(SessionManager::new(events))
    }

    #[tokio::test]
    async fn sends_without_session_report_recoverable_failure() {
        let manager = manager();

        let audio = manager
            .send_audio("AAAA".to_string(), "audio/pcm;rate=24000".to_string())
            .await;
        assert_eq!(audio.unwrap_err(), NO_SESSION_ERROR);

        let image_payload = BASE64.encode(vec![0u8; 2000]);
        let image = manager.send_image(image_payload).await;
        assert_eq!(image.unwrap_err(), NO_SESSION_ERROR);

        let text = manager.send_text("hello".to_string()).await;
        assert_eq!(text.unwrap_err(), NO_SESSION_ERROR);
    }

    #[tokio::test]
    async fn tiny_image_is_rejected_before_session_lookup() {
        let manager = manager();
        let payload = BASE64.encode(vec![0u8; 10]);
        let result = manager.send_image(payload).await;
        assert_eq!(result.unwrap_err(), "Image buffer too small");
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let manager = manager();
        let result = manager.send_text("   ".to_string()).await;
        assert_eq!(result.unwrap_err(), "Invalid text message");
    }

    #[tokio::test]
    async fn close_without_session_is_a_no_op() {
        let manager = manager();
        manager.close().await;
        assert!(!manager.is_active().await);
    }
}
