//! IPC request handlers.
//!
//! Each request maps onto one state operation; failures become
//! `Response::Error` with the operation's message, never a dropped
//! connection.

use std::sync::Arc;

use tracing::{error, info};

use cheddar_common::ipc::{Request, Response};
use cheddar_common::{SessionConfig, DEFAULT_LANGUAGE, DEFAULT_PROFILE};

use crate::state::ServiceState;
use crate::transcription;

/// Handle an IPC request and return a response.
pub async fn handle_request(state: &Arc<ServiceState>, request: Request) -> Response {
    match request {
        // === Realtime Session ===
        Request::InitializeSession {
            api_key,
            custom_prompt,
            profile,
            language,
        } => {
            let config = SessionConfig {
                api_key,
                custom_prompt,
                profile: profile.unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
                language: language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            };
            match state.session.initialize(config).await {
                Ok(()) => Response::SessionInitialized { success: true },
                Err(e) => {
                    error!("Failed to initialize session: {}", e);
                    Response::SessionInitialized { success: false }
                }
            }
        }
        Request::SendAudio { data, mime_type } => {
            match state.session.send_audio(data, mime_type).await {
                Ok(()) => Response::Sent,
                Err(e) => Response::error(e),
            }
        }
        Request::SendImage { data } => match state.session.send_image(data).await {
            Ok(()) => Response::Sent,
            Err(e) => Response::error(e),
        },
        Request::SendText { text } => match state.session.send_text(text).await {
            Ok(()) => Response::Sent,
            Err(e) => Response::error(e),
        },
        Request::CloseSession => {
            info!("CloseSession");
            state.capture.stop().await;
            state.session.close().await;
            Response::Ok
        }

        // === System Audio Capture ===
        Request::StartSystemAudio => {
            info!("StartSystemAudio");
            match state
                .capture
                .clone()
                .start(state.session.clone(), &state.dirs)
                .await
            {
                Ok(()) => Response::CaptureStarted,
                Err(e) => {
                    error!("Failed to start system audio capture: {}", e);
                    Response::error(e)
                }
            }
        }
        Request::StopSystemAudio => {
            info!("StopSystemAudio");
            state.capture.stop().await;
            Response::CaptureStopped
        }

        // === Local Transcription ===
        Request::Transcribe { audio_data_uri } => {
            info!("Transcribe ({} bytes)", audio_data_uri.len());
            match transcription::transcribe(
                &state.dirs,
                &state.models_dir,
                state.event_sender(),
                &audio_data_uri,
            )
            .await
            {
                Ok(text) => Response::Transcription { text },
                Err(e) => {
                    error!("Transcription failed: {}", e);
                    Response::error(e)
                }
            }
        }
        Request::ExportTranscript { text } => {
            let path = crate::paths::transcript_export_path(&state.dirs.root);
            match tokio::fs::write(&path, &text).await {
                Ok(()) => {
                    info!("Transcript exported to {}", path.display());
                    Response::TranscriptExported {
                        file_path: path.display().to_string(),
                    }
                }
                Err(e) => {
                    error!("Failed to export transcript: {}", e);
                    Response::error(format!("Failed to export transcript: {}", e))
                }
            }
        }

        // === State Queries ===
        Request::GetStatus => Response::Status(state.status().await),
        Request::SubscribeEvents => {
            // The server intercepts this request to switch the connection
            // into streaming mode; reaching here just acknowledges it.
            Response::Subscribed
        }

        // === Service Control ===
        Request::Ping => Response::Pong,
        Request::Quit => {
            info!("Quit requested");
            state.shutdown_cleanup().await;
            crate::request_shutdown();
            Response::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::DataDirs;

    fn state_with_dirs(root: &std::path::Path) -> Arc<ServiceState> {
        let dirs = DataDirs {
            root: root.to_path_buf(),
            image_dir: root.join("image"),
            audio_dir: root.join("audio"),
            temp_dir: root.join("temp"),
            converter_temp: root.join("temp").join("converter_temp"),
        };
        for dir in [
            &dirs.image_dir,
            &dirs.audio_dir,
            &dirs.temp_dir,
            &dirs.converter_temp,
        ] {
            std::fs::create_dir_all(dir).unwrap();
        }
        ServiceState::new(dirs)
    }

    #[tokio::test]
    async fn sends_without_session_return_structured_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with_dirs(tmp.path());

        let response = handle_request(
            &state,
            Request::SendText {
                text: "hello".to_string(),
            },
        )
        .await;
        match response {
            Response::Error { message } => assert_eq!(message, "No active Gemini session"),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn ping_pongs() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with_dirs(tmp.path());
        assert!(matches!(
            handle_request(&state, Request::Ping).await,
            Response::Pong
        ));
    }

    #[tokio::test]
    async fn status_reports_idle_state() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with_dirs(tmp.path());
        match handle_request(&state, Request::GetStatus).await {
            Response::Status(status) => {
                assert!(!status.session_active);
                assert!(!status.capture_running);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn export_writes_transcript_under_data_root() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with_dirs(tmp.path());

        let response = handle_request(
            &state,
            Request::ExportTranscript {
                text: "line one\nline two".to_string(),
            },
        )
        .await;

        match response {
            Response::TranscriptExported { file_path } => {
                let contents = std::fs::read_to_string(&file_path).unwrap();
                assert_eq!(contents, "line one\nline two");
                assert!(file_path.starts_with(tmp.path().to_string_lossy().as_ref()));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn close_session_without_session_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state_with_dirs(tmp.path());
        assert!(matches!(
            handle_request(&state, Request::CloseSession).await,
            Response::Ok
        ));
    }
}
