use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::{Modality, RawDetection};

use super::adapter::{DetectionAdapter, FrameSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// What one polling tick hands to the session writer.
#[derive(Debug)]
pub enum TickMessage {
    Batch {
        session_id: String,
        modality: Modality,
        detections: Vec<RawDetection>,
    },
    Failed {
        session_id: String,
        modality: Modality,
        error: String,
    },
}

impl TickMessage {
    pub fn session_id(&self) -> &str {
        match self {
            TickMessage::Batch { session_id, .. } | TickMessage::Failed { session_id, .. } => {
                session_id
            }
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            TickMessage::Batch { modality, .. } | TickMessage::Failed { modality, .. } => *modality,
        }
    }
}

pub struct PollingLoop {
    pub session_id: String,
    pub modality: Modality,
    pub interval: Duration,
    pub adapter: Arc<dyn DetectionAdapter>,
    pub frames: Arc<dyn FrameSource>,
    pub mailbox: mpsc::Sender<TickMessage>,
}

/// Runs one modality's detect cycle until cancelled.
///
/// Ticks never overlap: a tick that falls due while the previous detect call
/// is still running is skipped rather than queued. Cancellation stops new
/// ticks and abandons the result of an in-flight one.
pub async fn polling_loop(worker: PollingLoop, cancel_token: CancellationToken) {
    let PollingLoop {
        session_id,
        modality,
        interval,
        adapter,
        frames,
        mailbox,
    } = worker;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel_token.cancelled() => {
                log_info!("{modality} polling loop shutting down for session {session_id}");
                break;
            }
        }

        let tick_start = Instant::now();
        let outcome = tokio::select! {
            result = perform_tick(modality, &adapter, &frames) => result,
            _ = cancel_token.cancelled() => {
                log_debug!("{modality} tick abandoned mid-flight for session {session_id}");
                break;
            }
        };

        // An overrunning detect swallows the ticks that fell due meanwhile;
        // the next one is a full period after it finished.
        if tick_start.elapsed() >= interval {
            ticker.reset();
        }

        let message = match outcome {
            Ok(Some(detections)) => {
                log_debug!(
                    "{modality} tick produced {} detections in {}ms",
                    detections.len(),
                    tick_start.elapsed().as_millis()
                );
                TickMessage::Batch {
                    session_id: session_id.clone(),
                    modality,
                    detections,
                }
            }
            Ok(None) => {
                log_debug!("{modality} tick skipped: no frame available");
                continue;
            }
            Err(err) => {
                log_warn!("{modality} detection failed for session {session_id}: {err:#}");
                TickMessage::Failed {
                    session_id: session_id.clone(),
                    modality,
                    error: format!("{err:#}"),
                }
            }
        };

        if mailbox.send(message).await.is_err() {
            log_debug!("{modality} mailbox closed, stopping loop");
            break;
        }
    }
}

async fn perform_tick(
    modality: Modality,
    adapter: &Arc<dyn DetectionAdapter>,
    frames: &Arc<dyn FrameSource>,
) -> Result<Option<Vec<RawDetection>>> {
    let Some(frame) = frames
        .current_frame()
        .with_context(|| format!("{modality} frame source failed"))?
    else {
        return Ok(None);
    };

    let adapter = Arc::clone(adapter);
    let detections = tokio::task::spawn_blocking(move || adapter.detect(&frame))
        .await
        .context("detector worker join failed")?
        .with_context(|| format!("{modality} detector failed"))?;

    Ok(Some(detections))
}
