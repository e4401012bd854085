//! Synchronous IPC client for the Cheddar service.

use cheddar_common::ipc::{
    get_socket_path, read_json_blocking, write_json_blocking, IpcError, Request, Response,
};
use std::time::Duration;

use crate::exit_codes::ExitCode;

/// Error type for service client operations.
#[derive(Debug, Clone)]
pub enum ServiceError {
    /// Connection to service failed
    ConnectionFailed(String),
    /// Failed to send request
    SendFailed(String),
    /// Failed to receive response
    ReceiveFailed(String),
    /// Service returned an error
    RemoteError(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::ConnectionFailed(msg) => write!(f, "Connection failed: {}", msg),
            ServiceError::SendFailed(msg) => write!(f, "Send failed: {}", msg),
            ServiceError::ReceiveFailed(msg) => write!(f, "Receive failed: {}", msg),
            ServiceError::RemoteError(msg) => write!(f, "Service error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ServiceError {
    /// Convert to an appropriate exit code.
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            ServiceError::ConnectionFailed(_)
            | ServiceError::SendFailed(_)
            | ServiceError::ReceiveFailed(_) => ExitCode::ServiceConnectionFailed,
            ServiceError::RemoteError(msg) => {
                if msg.contains("No active") {
                    ExitCode::NoActiveSession
                } else {
                    ExitCode::GeneralError
                }
            }
        }
    }
}

/// Client for communicating with the Cheddar service.
#[cfg(unix)]
pub struct ServiceClient {
    stream: std::os::unix::net::UnixStream,
}

#[cfg(unix)]
impl ServiceClient {
    /// Connect to the service socket.
    pub fn connect() -> Result<Self, ServiceError> {
        let socket_path = get_socket_path();
        let stream = std::os::unix::net::UnixStream::connect(&socket_path).map_err(|e| {
            ServiceError::ConnectionFailed(format!(
                "Failed to connect to {} (is cheddar-service running?): {}",
                socket_path.display(),
                e
            ))
        })?;
        // A generous timeout: transcription jobs can take a while.
        stream
            .set_read_timeout(Some(Duration::from_secs(300)))
            .map_err(|e| ServiceError::ConnectionFailed(e.to_string()))?;
        Ok(Self { stream })
    }

    /// Send one request and wait for its response.
    pub fn request(&mut self, request: &Request) -> Result<Response, ServiceError> {
        write_json_blocking(&mut self.stream, request)
            .map_err(|e| ServiceError::SendFailed(e.to_string()))?;

        let response: Response = read_json_blocking(&mut self.stream)
            .map_err(|e| ServiceError::ReceiveFailed(e.to_string()))?;

        if let Response::Error { message } = response {
            return Err(ServiceError::RemoteError(message));
        }
        Ok(response)
    }

    /// Read the next streamed frame (used after `SubscribeEvents`).
    ///
    /// Returns `Ok(None)` when the service closes the stream.
    pub fn next_event(&mut self) -> Result<Option<Response>, ServiceError> {
        // Event streams are open-ended; don't time out between events.
        self.stream
            .set_read_timeout(None)
            .map_err(|e| ServiceError::ReceiveFailed(e.to_string()))?;
        match read_json_blocking(&mut self.stream) {
            Ok(response) => Ok(Some(response)),
            Err(IpcError::ConnectionClosed) => Ok(None),
            Err(e) => Err(ServiceError::ReceiveFailed(e.to_string())),
        }
    }
}
