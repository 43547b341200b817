//! Render sink for the terminal: prints client events as log lines.

use tokio::sync::mpsc;
use tracing::info;
use visage_core::{UiEvent, UiStatus};

/// Drain UI events until the client goes away.
pub async fn run_ui(mut rx: mpsc::UnboundedReceiver<UiEvent>) {
    while let Some(event) = rx.recv().await {
        render(&event);
    }
}

fn render(event: &UiEvent) {
    match event {
        UiEvent::ServerStatus(status) => info!("{status}"),
        UiEvent::Rtt { server, report } => info!("RTT to {server}: {report}"),
        UiEvent::Detections { labels } => {
            if labels.is_empty() {
                info!("nobody detected");
            } else {
                info!("in frame: {}", labels.join(", "));
            }
        }
        UiEvent::AnnotatedFrame { content } => {
            info!("annotated frame received ({} bytes)", content.len());
        }
        UiEvent::TsneArtifact { content } => {
            info!("t-SNE artifact received ({} bytes)", content.len());
        }
        UiEvent::Status(status) => {
            if *status != UiStatus::Idle {
                info!("status: {status}");
            }
        }
        UiEvent::SnapshotChanged(summary) => {
            info!(
                "snapshot: {} images, {} people, training={}",
                summary.image_count,
                summary.people.len(),
                summary.training,
            );
        }
    }
}
