//! Realtime session transport worker.
//!
//! One worker thread per session owns a TLS WebSocket to the realtime API.
//! Outbound payloads arrive over a command channel; inbound frames are
//! parsed into [`SessionEvent`]s for the aggregator. The socket runs with a
//! short read timeout so the thread can interleave reads with command
//! draining.

use std::net::TcpStream;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use tungstenite::Message;

const REALTIME_MODEL: &str = "gemini-2.0-flash-live-001";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HANDSHAKE_READ_TIMEOUT: Duration = Duration::from_secs(30);
const PUMP_READ_TIMEOUT: Duration = Duration::from_millis(100);

pub type WsStream = tungstenite::WebSocket<native_tls::TlsStream<TcpStream>>;

/// Outbound payloads accepted by the worker.
#[derive(Debug)]
pub enum SessionCommand {
    Audio { data: String, mime_type: String },
    Image { data: String },
    Text { text: String },
    Close,
}

/// Inbound signals surfaced to the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connection and setup completed
    Open,
    /// A partial text fragment of the model's current turn
    Partial(String),
    /// The model finished generating the current response
    GenerationComplete,
    /// The model's turn is over; it is listening again
    TurnComplete,
    /// Transport or service error
    Error(String),
    /// The session ended
    Closed(String),
}

/// Open the TLS WebSocket and run the setup exchange.
///
/// Blocking; callers run this on a blocking task. Returns the socket ready
/// for the pump loop, with its read timeout shortened for interleaving.
pub fn connect_and_setup(
    api_key: &str,
    system_prompt: &str,
    language: &str,
) -> Result<WsStream, String> {
    let ws_url = format!(
        "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent?key={}",
        api_key
    );

    let url = url::Url::parse(&ws_url).map_err(|e| format!("Invalid session URL: {}", e))?;
    let host = url
        .host_str()
        .ok_or_else(|| "Session URL has no host".to_string())?
        .to_string();

    use std::net::ToSocketAddrs;
    let addr = format!("{}:443", host)
        .to_socket_addrs()
        .map_err(|e| format!("Failed to resolve {}: {}", host, e))?
        .next()
        .ok_or_else(|| format!("No address for {}", host))?;

    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .map_err(|e| format!("Failed to connect to realtime service: {}", e))?;
    tcp.set_read_timeout(Some(HANDSHAKE_READ_TIMEOUT))
        .map_err(|e| e.to_string())?;
    tcp.set_write_timeout(Some(HANDSHAKE_READ_TIMEOUT))
        .map_err(|e| e.to_string())?;
    tcp.set_nodelay(true).map_err(|e| e.to_string())?;

    let connector = native_tls::TlsConnector::new()
        .map_err(|e| format!("TLS connector setup failed: {}", e))?;
    let tls = connector
        .connect(&host, tcp)
        .map_err(|e| format!("TLS handshake failed: {}", e))?;

    let (mut socket, _response) = tungstenite::client::client(ws_url.as_str(), tls)
        .map_err(|e| format!("WebSocket handshake failed: {}", e))?;

    send_setup(&mut socket, system_prompt, language)?;

    socket
        .get_ref()
        .get_ref()
        .set_read_timeout(Some(PUMP_READ_TIMEOUT))
        .map_err(|e| e.to_string())?;

    Ok(socket)
}

/// Send the session setup frame: text-only responses, the profile's system
/// prompt, and the caller's spoken language.
fn send_setup(socket: &mut WsStream, system_prompt: &str, language: &str) -> Result<(), String> {
    let setup = json!({
        "setup": {
            "model": format!("models/{}", REALTIME_MODEL),
            "generationConfig": {
                "responseModalities": ["TEXT"],
                "speechConfig": {
                    "languageCode": language
                }
            },
            "systemInstruction": {
                "parts": [{ "text": system_prompt }]
            }
        }
    });

    socket
        .send(Message::Text(setup.to_string().into()))
        .map_err(|e| format!("Failed to send session setup: {}", e))?;
    Ok(())
}

/// The worker loop: drain outbound commands, then poll the socket.
///
/// Exits when the session is closed (either side) or the transport fails;
/// the final event tells the aggregator why.
pub fn run(
    mut socket: WsStream,
    commands: Receiver<SessionCommand>,
    events: UnboundedSender<SessionEvent>,
) {
    let _ = events.send(SessionEvent::Open);

    loop {
        loop {
            match commands.try_recv() {
                Ok(SessionCommand::Close) => {
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    let _ = events.send(SessionEvent::Closed("closed by client".to_string()));
                    return;
                }
                Ok(command) => {
                    if let Err(e) = send_command(&mut socket, command) {
                        warn!("Realtime send failed: {}", e);
                        let _ = events.send(SessionEvent::Error(e));
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    let _ = socket.close(None);
                    return;
                }
            }
        }

        match socket.read() {
            Ok(Message::Text(payload)) => handle_server_message(payload.as_str(), &events),
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .unwrap_or_else(|| "server closed".to_string());
                let _ = events.send(SessionEvent::Closed(reason));
                return;
            }
            Ok(_) => {} // binary/ping/pong frames carry nothing for us
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                let _ = events.send(SessionEvent::Closed("connection closed".to_string()));
                return;
            }
            Err(e) => {
                let _ = events.send(SessionEvent::Error(e.to_string()));
                return;
            }
        }
    }
}

fn send_command(socket: &mut WsStream, command: SessionCommand) -> Result<(), String> {
    let frame = match command {
        SessionCommand::Audio { data, mime_type } => json!({
            "realtimeInput": {
                "mediaChunks": [{ "data": data, "mimeType": mime_type }]
            }
        }),
        SessionCommand::Image { data } => json!({
            "realtimeInput": {
                "mediaChunks": [{ "data": data, "mimeType": "image/jpeg" }]
            }
        }),
        SessionCommand::Text { text } => json!({
            "clientContent": {
                "turns": [{ "role": "user", "parts": [{ "text": text }] }],
                "turnComplete": true
            }
        }),
        SessionCommand::Close => unreachable!("Close is handled by the pump loop"),
    };

    socket
        .send(Message::Text(frame.to_string().into()))
        .map_err(|e| e.to_string())
}

/// Translate one server frame into session events.
pub(crate) fn handle_server_message(payload: &str, events: &UnboundedSender<SessionEvent>) {
    let message: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            debug!("Ignoring unparseable server frame: {}", e);
            return;
        }
    };

    let Some(server_content) = message.get("serverContent") else {
        return; // setupComplete and friends
    };

    if let Some(parts) = server_content
        .get("modelTurn")
        .and_then(|turn| turn.get("parts"))
        .and_then(|parts| parts.as_array())
    {
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                let _ = events.send(SessionEvent::Partial(text.to_string()));
            }
        }
    }

    if server_content
        .get("generationComplete")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        let _ = events.send(SessionEvent::GenerationComplete);
    }

    if server_content
        .get("turnComplete")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        let _ = events.send(SessionEvent::TurnComplete);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(payloads: &[&str]) -> Vec<SessionEvent> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for payload in payloads {
            handle_server_message(payload, &tx);
        }
        drop(tx);
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn partial_fragments_are_emitted_in_order() {
        let events = collect(&[
            r#"{"serverContent":{"modelTurn":{"parts":[{"text":"Hel"},{"text":"lo"}]}}}"#,
            r#"{"serverContent":{"modelTurn":{"parts":[{"text":" there"}]}}}"#,
        ]);
        assert_eq!(
            events,
            vec![
                SessionEvent::Partial("Hel".to_string()),
                SessionEvent::Partial("lo".to_string()),
                SessionEvent::Partial(" there".to_string()),
            ]
        );
    }

    #[test]
    fn completion_flags_map_to_events() {
        let events = collect(&[
            r#"{"serverContent":{"generationComplete":true}}"#,
            r#"{"serverContent":{"turnComplete":true}}"#,
        ]);
        assert_eq!(
            events,
            vec![
                SessionEvent::GenerationComplete,
                SessionEvent::TurnComplete
            ]
        );
    }

    #[test]
    fn setup_complete_and_garbage_frames_are_ignored() {
        let events = collect(&[r#"{"setupComplete":{}}"#, "not json at all"]);
        assert!(events.is_empty());
    }

    #[test]
    fn non_text_parts_are_skipped() {
        let events = collect(&[
            r#"{"serverContent":{"modelTurn":{"parts":[{"inlineData":{"data":"AAAA"}},{"text":"ok"}]}}}"#,
        ]);
        assert_eq!(events, vec![SessionEvent::Partial("ok".to_string())]);
    }
}
