//! IPC server with secure socket setup.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info, warn};

use cheddar_common::ipc::{get_socket_path, read_json, write_json, Request, Response};

use crate::state::{ServiceEvent, ServiceState};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Socket file permissions (owner read/write only)
#[cfg(unix)]
const SOCKET_MODE: u32 = 0o600;

/// Socket directory permissions (owner read/write/execute only)
#[cfg(unix)]
const DIRECTORY_MODE: u32 = 0o700;

/// Create socket directory with secure permissions.
#[cfg(unix)]
fn create_secure_socket_dir(socket_path: &Path) -> std::io::Result<()> {
    let socket_dir = socket_path
        .parent()
        .expect("Socket must have parent directory");

    std::fs::create_dir_all(socket_dir)?;
    std::fs::set_permissions(socket_dir, std::fs::Permissions::from_mode(DIRECTORY_MODE))?;

    // Remove stale socket if exists
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }

    Ok(())
}

/// Set socket file permissions after binding.
#[cfg(unix)]
fn secure_socket_file(socket_path: &Path) -> std::io::Result<()> {
    std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;

    let actual = std::fs::metadata(socket_path)?.permissions().mode() & 0o777;
    if actual != SOCKET_MODE {
        warn!("Socket mode is {:o}, expected {:o}", actual, SOCKET_MODE);
    }

    Ok(())
}

/// Handle a single client connection.
async fn handle_client<S>(mut stream: S, state: Arc<ServiceState>, peer_info: String)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("Client connected: {}", peer_info);

    loop {
        let request: Request = match read_json(&mut stream).await {
            Ok(req) => req,
            Err(cheddar_common::ipc::IpcError::ConnectionClosed) => {
                info!("Client disconnected: {}", peer_info);
                break;
            }
            Err(e) => {
                error!("Error reading request from {}: {}", peer_info, e);
                break;
            }
        };

        if let Err(e) = request.validate() {
            warn!("Invalid request from {}: {}", peer_info, e);
            let response = Response::error(format!("Invalid request: {}", e));
            if write_json(&mut stream, &response).await.is_err() {
                break;
            }
            continue;
        }

        // A subscription turns this connection into a one-way event stream.
        if matches!(request, Request::SubscribeEvents) {
            if write_json(&mut stream, &Response::Subscribed).await.is_err() {
                break;
            }
            stream_events(&mut stream, &state, &peer_info).await;
            break;
        }

        let response = super::handlers::handle_request(&state, request).await;

        if let Err(e) = write_json(&mut stream, &response).await {
            error!("Error writing response to {}: {}", peer_info, e);
            break;
        }
    }
}

/// Forward broadcast events to a subscribed client until it disconnects.
async fn stream_events<S>(stream: &mut S, state: &Arc<ServiceState>, peer_info: &str)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut events = state.subscribe_events();
    loop {
        match events.recv().await {
            Ok(event) => {
                let is_shutdown = matches!(event, ServiceEvent::Shutdown);
                let response = Response::Event {
                    event: event.into(),
                };
                if write_json(stream, &response).await.is_err() {
                    info!("Event subscriber disconnected: {}", peer_info);
                    break;
                }
                if is_shutdown {
                    break;
                }
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                warn!(
                    "Event subscriber {} lagged, dropped {} events",
                    peer_info, missed
                );
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Run the IPC server until shutdown is requested.
#[cfg(unix)]
pub async fn run_server(state: Arc<ServiceState>) -> Result<(), Box<dyn std::error::Error>> {
    use tokio::net::UnixListener;

    let socket_path = get_socket_path();
    info!("Starting IPC server at {:?}", socket_path);

    create_secure_socket_dir(&socket_path)?;
    let listener = UnixListener::bind(&socket_path)?;
    secure_socket_file(&socket_path)?;

    info!("IPC server listening on {:?}", socket_path);

    loop {
        if crate::is_shutdown_requested() {
            info!("Shutdown requested, stopping IPC server");
            break;
        }

        // Use select so the shutdown flag is checked periodically
        let accept_result = tokio::select! {
            result = listener.accept() => Some(result),
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => None,
        };

        match accept_result {
            Some(Ok((stream, _))) => {
                let peer_info = format!("client#{}", next_client_id());
                tokio::spawn(handle_client(stream, state.clone(), peer_info));
            }
            Some(Err(e)) => {
                error!("Accept error: {}", e);
            }
            None => {} // timeout; re-check the shutdown flag
        }
    }

    Ok(())
}

#[cfg(not(unix))]
pub async fn run_server(_state: Arc<ServiceState>) -> Result<(), Box<dyn std::error::Error>> {
    error!("The Cheddar service requires a Unix domain socket transport");
    std::process::exit(1);
}

fn next_client_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
