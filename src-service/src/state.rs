//! Service state: the explicitly-owned managers and the event broadcast.
//!
//! One `ServiceState` is built in `main` and passed by `Arc` to whatever
//! needs it; there are no ambient session globals. Events fan out through a
//! broadcast channel to every subscribed IPC client.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use cheddar_common::ipc::EventType;
use cheddar_common::SessionStatus;

use crate::audio::capture::CapturePipeline;
use crate::paths::{self, DataDirs};
use crate::session::SessionManager;

/// Events broadcast to subscribed clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// Status-text update for the presentation layer
    Status(String),
    /// A completed assistant response
    Response(String),
    /// Service is shutting down
    Shutdown,
}

impl From<ServiceEvent> for EventType {
    fn from(event: ServiceEvent) -> Self {
        match event {
            ServiceEvent::Status(message) => EventType::Status { message },
            ServiceEvent::Response(text) => EventType::Response { text },
            ServiceEvent::Shutdown => EventType::Shutdown,
        }
    }
}

/// Everything the IPC handlers operate on.
pub struct ServiceState {
    pub session: Arc<SessionManager>,
    pub capture: Arc<CapturePipeline>,
    pub dirs: DataDirs,
    pub models_dir: PathBuf,
    event_tx: broadcast::Sender<ServiceEvent>,
}

impl ServiceState {
    pub fn new(dirs: DataDirs) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(100);
        Arc::new(Self {
            session: Arc::new(SessionManager::new(event_tx.clone())),
            capture: Arc::new(CapturePipeline::new()),
            dirs,
            models_dir: paths::models_dir(),
            event_tx,
        })
    }

    /// Subscribe to service events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.event_tx.subscribe()
    }

    /// Broadcast an event to all subscribers (no-op without subscribers).
    pub fn broadcast(&self, event: ServiceEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Event sender handle for components that stream their own updates.
    pub fn event_sender(&self) -> &broadcast::Sender<ServiceEvent> {
        &self.event_tx
    }

    /// Snapshot of the session/capture state.
    pub async fn status(&self) -> SessionStatus {
        SessionStatus {
            session_active: self.session.is_active().await,
            capture_running: self.capture.is_running().await,
        }
    }

    /// Stop capture and close the session; used on quit and shutdown.
    pub async fn shutdown_cleanup(&self) {
        self.capture.stop().await;
        self.session.close().await;
        self.broadcast(ServiceEvent::Shutdown);
    }
}
