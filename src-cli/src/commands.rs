//! Command implementations.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use cheddar_common::ipc::{EventType, Request, Response};

use crate::client::ServiceClient;
use crate::colors;
use crate::exit_codes::ExitCode;

/// Output preferences shared by every command.
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    fn emit(&self, response: &Response, human: &str) {
        if self.json {
            println!(
                "{}",
                serde_json::to_string(response).unwrap_or_else(|_| "{}".to_string())
            );
        } else if !self.quiet {
            println!("{}", human);
        }
    }
}

fn connect() -> Result<ServiceClient, (ExitCode, String)> {
    ServiceClient::connect().map_err(|e| (e.to_exit_code(), e.to_string()))
}

fn run_request(
    output: &Output,
    request: Request,
    on_success: impl FnOnce(&Response) -> String,
) -> Result<ExitCode, String> {
    let mut client = match connect() {
        Ok(client) => client,
        Err((code, message)) => {
            eprintln!("{}", colors::error(&message));
            return Ok(code);
        }
    };

    match client.request(&request) {
        Ok(response) => {
            let human = on_success(&response);
            output.emit(&response, &human);
            Ok(ExitCode::Success)
        }
        Err(e) => {
            eprintln!("{}", colors::error(&e.to_string()));
            Ok(e.to_exit_code())
        }
    }
}

pub fn session_start(
    output: &Output,
    api_key: String,
    profile: Option<String>,
    language: Option<String>,
    prompt: String,
) -> Result<ExitCode, String> {
    let mut client = match connect() {
        Ok(client) => client,
        Err((code, message)) => {
            eprintln!("{}", colors::error(&message));
            return Ok(code);
        }
    };

    let request = Request::InitializeSession {
        api_key,
        custom_prompt: prompt,
        profile,
        language,
    };

    match client.request(&request) {
        Ok(response) => match response {
            Response::SessionInitialized { success: true } => {
                output.emit(&response, &colors::success("Session started"));
                Ok(ExitCode::Success)
            }
            Response::SessionInitialized { success: false } => {
                output.emit(&response, &colors::error("Session failed to start"));
                Ok(ExitCode::SessionFailedToStart)
            }
            other => {
                output.emit(&other, "Unexpected response");
                Ok(ExitCode::GeneralError)
            }
        },
        Err(e) => {
            eprintln!("{}", colors::error(&e.to_string()));
            Ok(e.to_exit_code())
        }
    }
}

pub fn session_close(output: &Output) -> Result<ExitCode, String> {
    run_request(output, Request::CloseSession, |_| {
        colors::success("Session closed")
    })
}

pub fn send_text(output: &Output, message: String) -> Result<ExitCode, String> {
    run_request(output, Request::SendText { text: message }, |_| {
        colors::success("Sent")
    })
}

pub fn send_image(output: &Output, file: &Path) -> Result<ExitCode, String> {
    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!(
                "{}",
                colors::error(&format!("Failed to read {}: {}", file.display(), e))
            );
            return Ok(ExitCode::InvalidArguments);
        }
    };
    let data = BASE64.encode(&bytes);
    run_request(output, Request::SendImage { data }, |_| {
        colors::success("Sent")
    })
}

pub fn audio_start(output: &Output) -> Result<ExitCode, String> {
    run_request(output, Request::StartSystemAudio, |_| {
        colors::success("System audio capture started")
    })
}

pub fn audio_stop(output: &Output) -> Result<ExitCode, String> {
    run_request(output, Request::StopSystemAudio, |_| {
        colors::success("System audio capture stopped")
    })
}

pub fn transcribe(output: &Output, file: &Path) -> Result<ExitCode, String> {
    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!(
                "{}",
                colors::error(&format!("Failed to read {}: {}", file.display(), e))
            );
            return Ok(ExitCode::InvalidArguments);
        }
    };

    let audio_data_uri = format!(
        "data:{};base64,{}",
        mime_for_extension(file),
        BASE64.encode(&bytes)
    );

    let mut client = match connect() {
        Ok(client) => client,
        Err((code, message)) => {
            eprintln!("{}", colors::error(&message));
            return Ok(code);
        }
    };

    match client.request(&Request::Transcribe { audio_data_uri }) {
        Ok(response) => {
            if let Response::Transcription { text } = &response {
                output.emit(&response, text);
                Ok(ExitCode::Success)
            } else {
                output.emit(&response, "Unexpected response");
                Ok(ExitCode::GeneralError)
            }
        }
        Err(e) => {
            eprintln!("{}", colors::error(&e.to_string()));
            Ok(ExitCode::TranscriptionFailed)
        }
    }
}

pub fn export(output: &Output, file: &Path) -> Result<ExitCode, String> {
    let text = match std::fs::read_to_string(file) {
        Ok(text) => text,
        Err(e) => {
            eprintln!(
                "{}",
                colors::error(&format!("Failed to read {}: {}", file.display(), e))
            );
            return Ok(ExitCode::InvalidArguments);
        }
    };

    run_request(output, Request::ExportTranscript { text }, |response| {
        match response {
            Response::TranscriptExported { file_path } => {
                colors::success(&format!("Exported to {}", file_path))
            }
            _ => "Unexpected response".to_string(),
        }
    })
}

pub fn status(output: &Output) -> Result<ExitCode, String> {
    run_request(output, Request::GetStatus, |response| match response {
        Response::Status(status) => format!(
            "session: {}\ncapture: {}",
            if status.session_active {
                colors::success("active")
            } else {
                colors::dim("inactive")
            },
            if status.capture_running {
                colors::success("running")
            } else {
                colors::dim("stopped")
            },
        ),
        _ => "Unexpected response".to_string(),
    })
}

pub fn watch(output: &Output) -> Result<ExitCode, String> {
    let mut client = match connect() {
        Ok(client) => client,
        Err((code, message)) => {
            eprintln!("{}", colors::error(&message));
            return Ok(code);
        }
    };

    if let Err(e) = client.request(&Request::SubscribeEvents) {
        eprintln!("{}", colors::error(&e.to_string()));
        return Ok(e.to_exit_code());
    }

    if !output.quiet && !output.json {
        println!("{}", colors::dim("Following events (Ctrl+C to stop)..."));
    }

    loop {
        match client.next_event() {
            Ok(Some(response)) => {
                if output.json {
                    println!(
                        "{}",
                        serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string())
                    );
                    continue;
                }
                if let Response::Event { event } = response {
                    match event {
                        EventType::Status { message } => {
                            println!("{}", colors::info(&format!("[status] {}", message)))
                        }
                        EventType::Response { text } => println!("{}", text),
                        EventType::Shutdown => {
                            println!("{}", colors::dim("[service shut down]"));
                            return Ok(ExitCode::Success);
                        }
                    }
                }
            }
            Ok(None) => return Ok(ExitCode::Success),
            Err(e) => {
                eprintln!("{}", colors::error(&e.to_string()));
                return Ok(e.to_exit_code());
            }
        }
    }
}

pub fn ping(output: &Output) -> Result<ExitCode, String> {
    run_request(output, Request::Ping, |_| colors::success("pong"))
}

pub fn quit(output: &Output) -> Result<ExitCode, String> {
    run_request(output, Request::Quit, |_| {
        colors::success("Service shutting down")
    })
}

/// Container mime type for a recorded audio file, by extension.
fn mime_for_extension(file: &Path) -> &'static str {
    match file
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("ogg") => "audio/ogg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        _ => "audio/webm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_follows_file_extension() {
        assert_eq!(mime_for_extension(Path::new("a.webm")), "audio/webm");
        assert_eq!(mime_for_extension(Path::new("a.OGG")), "audio/ogg");
        assert_eq!(mime_for_extension(Path::new("a.wav")), "audio/wav");
        assert_eq!(mime_for_extension(Path::new("noext")), "audio/webm");
    }
}
