//! Cheddar Background Service
//!
//! The long-lived host process for the Cheddar desktop assistant: it owns
//! the realtime AI session, the system-audio capture pipeline, and local
//! transcription, and talks to presentation clients over IPC.

mod audio;
mod ipc;
mod models;
mod paths;
mod session;
mod state;
mod transcription;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Global shutdown flag
static SHUTDOWN_FLAG: std::sync::OnceLock<Arc<AtomicBool>> = std::sync::OnceLock::new();

/// Get the global shutdown flag.
pub fn get_shutdown_flag() -> Arc<AtomicBool> {
    SHUTDOWN_FLAG
        .get_or_init(|| Arc::new(AtomicBool::new(false)))
        .clone()
}

/// Request service shutdown.
pub fn request_shutdown() {
    info!("Shutdown requested");
    get_shutdown_flag().store(true, Ordering::SeqCst);
}

/// Check if shutdown has been requested.
pub fn is_shutdown_requested() -> bool {
    get_shutdown_flag().load(Ordering::SeqCst)
}

fn main() {
    // Initialize logging with RUST_LOG env var support
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = cheddar_common::logging::ensure_log_dir() {
        warn!("Failed to create log directory: {}", e);
    }

    info!("Cheddar service starting (pid: {})...", std::process::id());

    // Provision the data directory tree before anything captures or
    // transcribes.
    let dirs = match paths::ensure_data_dirs() {
        Ok(dirs) => dirs,
        Err(e) => {
            error!("Failed to provision data directories: {}", e);
            std::process::exit(1);
        }
    };
    info!("Data directories ready at {}", dirs.root.display());

    // Verify the audio converter early. Transcription fails later if it is
    // missing, but the service itself can still run.
    match transcription::ensure_converter_blocking() {
        Ok(()) => info!("Audio converter verified"),
        Err(e) => warn!("Audio converter check failed: {}", e),
    }

    setup_signal_handlers();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    runtime.block_on(async {
        let state = state::ServiceState::new(dirs);

        if let Err(e) = ipc::run_server(state.clone()).await {
            if !is_shutdown_requested() {
                error!("IPC server error: {}", e);
                std::process::exit(1);
            }
        }

        // Stop capture and close the session before the runtime goes away.
        state.shutdown_cleanup().await;
    });

    cleanup_on_shutdown();
    info!("Cheddar service stopped");
}

/// Set up signal handlers for graceful shutdown.
fn setup_signal_handlers() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        std::thread::spawn(|| {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create signal-handler runtime");
            rt.block_on(async {
                let mut sigterm =
                    signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
                let mut sigint =
                    signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");
                let mut sighup =
                    signal(SignalKind::hangup()).expect("Failed to install SIGHUP handler");

                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                    _ = sighup.recv() => info!("Received SIGHUP"),
                }

                request_shutdown();
            });
        });
    }
}

/// Cleanup resources on shutdown.
fn cleanup_on_shutdown() {
    info!("Cleaning up...");

    #[cfg(unix)]
    {
        let socket_path = cheddar_common::ipc::get_socket_path();
        if socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&socket_path) {
                warn!("Failed to remove socket file: {}", e);
            } else {
                info!("Removed socket file: {:?}", socket_path);
            }
        }
    }
}
