//! Inbound message aggregation.
//!
//! Collects the partial text fragments of the model's current turn and
//! flushes them as one response event when generation completes. Status
//! transitions (connected, listening, errors, close) pass straight through
//! as status events without touching the buffer.

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use super::worker::SessionEvent;
use crate::state::ServiceEvent;

pub async fn run(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    out: broadcast::Sender<ServiceEvent>,
) {
    let mut buffer = String::new();

    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::Open => {
                let _ = out.send(ServiceEvent::Status(
                    "Connected to Gemini - Starting recording...".to_string(),
                ));
            }
            SessionEvent::Partial(text) => buffer.push_str(&text),
            SessionEvent::GenerationComplete => {
                let _ = out.send(ServiceEvent::Response(std::mem::take(&mut buffer)));
            }
            SessionEvent::TurnComplete => {
                let _ = out.send(ServiceEvent::Status("Listening...".to_string()));
            }
            SessionEvent::Error(message) => {
                let _ = out.send(ServiceEvent::Status(format!("Error: {}", message)));
            }
            SessionEvent::Closed(reason) => {
                debug!("Session closed: {}", reason);
                let _ = out.send(ServiceEvent::Status("Session closed".to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn feed(events: Vec<SessionEvent>) -> Vec<ServiceEvent> {
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = broadcast::channel(64);

        for event in events {
            session_tx.send(event).unwrap();
        }
        drop(session_tx);
        run(session_rx, out_tx).await;

        let mut collected = Vec::new();
        while let Ok(event) = out_rx.try_recv() {
            collected.push(event);
        }
        collected
    }

    #[tokio::test]
    async fn fragments_are_flushed_once_per_generation() {
        let out = feed(vec![
            SessionEvent::Partial("The answer ".to_string()),
            SessionEvent::Partial("is 42.".to_string()),
            SessionEvent::GenerationComplete,
            SessionEvent::TurnComplete,
        ])
        .await;

        assert_eq!(
            out,
            vec![
                ServiceEvent::Response("The answer is 42.".to_string()),
                ServiceEvent::Status("Listening...".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn buffer_resets_between_generations() {
        let out = feed(vec![
            SessionEvent::Partial("first".to_string()),
            SessionEvent::GenerationComplete,
            SessionEvent::Partial("second".to_string()),
            SessionEvent::GenerationComplete,
        ])
        .await;

        assert_eq!(
            out,
            vec![
                ServiceEvent::Response("first".to_string()),
                ServiceEvent::Response("second".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn errors_and_close_do_not_disturb_the_buffer() {
        let out = feed(vec![
            SessionEvent::Partial("kept".to_string()),
            SessionEvent::Error("transient".to_string()),
            SessionEvent::Closed("server closed".to_string()),
            SessionEvent::GenerationComplete,
        ])
        .await;

        assert_eq!(
            out,
            vec![
                ServiceEvent::Status("Error: transient".to_string()),
                ServiceEvent::Status("Session closed".to_string()),
                ServiceEvent::Response("kept".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn empty_generation_still_flushes() {
        let out = feed(vec![SessionEvent::GenerationComplete]).await;
        assert_eq!(out, vec![ServiceEvent::Response(String::new())]);
    }
}
