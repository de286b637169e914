use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    answer::{Answer, AnswerRequest, AnswerService},
    error::{Result, SessionError},
    export::ExportArtifact,
    models::{Modality, RawDetection},
    sensing::{DetectionAdapter, FrameSource, PollingLoop, SensingController, TickMessage},
    settings::SessionSettings,
    stats::SessionSummary,
};

use super::{SessionState, SessionStatus, TickCounters};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const MAILBOX_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "state", content = "reason")]
pub enum AdapterReadiness {
    Pending,
    Ready,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModalityStatus {
    pub modality: Modality,
    pub readiness: AdapterReadiness,
    pub interval_ms: u64,
    pub counters: TickCounters,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub modalities: Vec<ModalityStatus>,
}

struct ControllerState {
    status: SessionStatus,
    readiness: BTreeMap<Modality, AdapterReadiness>,
    /// The running session, or the last one frozen read-only after `stop()`.
    session: Option<SessionState>,
}

impl ControllerState {
    fn readable_session(&self) -> Result<&SessionState> {
        self.session
            .as_ref()
            .ok_or(SessionError::NoActiveOrRecentSession)
    }

    fn apply(&mut self, message: TickMessage) {
        let live = self.status == SessionStatus::Active
            && self
                .session
                .as_ref()
                .is_some_and(|session| session.id == message.session_id());
        if !live {
            log_debug!(
                "Discarding {} tick for ended session {}",
                message.modality(),
                message.session_id()
            );
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match message {
            TickMessage::Batch {
                modality,
                detections,
                ..
            } => {
                session.apply_batch(modality, &detections, Utc::now().timestamp_millis());
            }
            TickMessage::Failed { modality, .. } => session.record_failure(modality),
        }
    }
}

/// Owns the session lifecycle and is the only writer of session state.
///
/// Polling loops never touch the state directly; they post their results to
/// a mailbox drained by a single writer task.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<ControllerState>>,
    adapters: Arc<BTreeMap<Modality, Arc<dyn DetectionAdapter>>>,
    frames: Arc<dyn FrameSource>,
    settings: SessionSettings,
    sensing: Arc<Mutex<SensingController>>,
    writer: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// Held for the whole of `start()` and `stop()` so the two never interleave.
    lifecycle: Arc<Mutex<()>>,
}

impl SessionController {
    pub fn new(
        settings: SessionSettings,
        frames: Arc<dyn FrameSource>,
        adapters: BTreeMap<Modality, Arc<dyn DetectionAdapter>>,
    ) -> Self {
        let readiness = adapters
            .keys()
            .map(|modality| (*modality, AdapterReadiness::Pending))
            .collect();

        Self {
            state: Arc::new(Mutex::new(ControllerState {
                status: SessionStatus::Idle,
                readiness,
                session: None,
            })),
            adapters: Arc::new(adapters),
            frames,
            settings,
            sensing: Arc::new(Mutex::new(SensingController::new())),
            writer: Arc::new(Mutex::new(None)),
            lifecycle: Arc::new(Mutex::new(())),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Runs every adapter's `initialize`. A failing adapter only makes its own
    /// modality unavailable.
    pub async fn initialize_adapters(&self) -> BTreeMap<Modality, AdapterReadiness> {
        let mut results = BTreeMap::new();
        for (modality, adapter) in self.adapters.iter() {
            let adapter = Arc::clone(adapter);
            let outcome = tokio::task::spawn_blocking(move || adapter.initialize()).await;
            let readiness = match outcome {
                Ok(Ok(())) => {
                    log_info!("{modality} detector ready");
                    AdapterReadiness::Ready
                }
                Ok(Err(err)) => {
                    log_error!("{modality} detector failed to initialise: {err:#}");
                    AdapterReadiness::Failed(format!("{err:#}"))
                }
                Err(join_err) => {
                    log_error!("{modality} detector initialisation panicked: {join_err}");
                    AdapterReadiness::Failed(join_err.to_string())
                }
            };
            results.insert(*modality, readiness);
        }

        let mut state = self.state.lock().await;
        state.readiness.extend(results.clone());
        results
    }

    pub async fn status(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        let session = state.session.as_ref();
        let modalities = state
            .readiness
            .iter()
            .map(|(modality, readiness)| ModalityStatus {
                modality: *modality,
                readiness: readiness.clone(),
                interval_ms: self.settings.interval_for(*modality).as_millis() as u64,
                counters: session
                    .map(|session| session.counters(*modality))
                    .unwrap_or_default(),
            })
            .collect();

        SessionSnapshot {
            status: state.status,
            session_id: session.map(|session| session.id.clone()),
            started_at: session.map(|session| session.started_at),
            stopped_at: session.and_then(|session| session.stopped_at),
            modalities,
        }
    }

    pub async fn start(&self) -> Result<SessionSnapshot> {
        let _lifecycle = self.lifecycle.lock().await;

        let (session_id, loops, writer_rx, previous) = {
            let mut state = self.state.lock().await;
            if state.status == SessionStatus::Active {
                return Err(SessionError::AlreadyActive);
            }

            let ready: Vec<Modality> = state
                .readiness
                .iter()
                .filter(|(_, readiness)| **readiness == AdapterReadiness::Ready)
                .map(|(modality, _)| *modality)
                .collect();
            if ready.is_empty() {
                return Err(SessionError::NotReady);
            }

            let session_id = Uuid::new_v4().to_string();
            let (mailbox, writer_rx) = mpsc::channel(MAILBOX_CAPACITY);
            let loops: Vec<PollingLoop> = ready
                .iter()
                .filter_map(|modality| {
                    self.adapters.get(modality).map(|adapter| PollingLoop {
                        session_id: session_id.clone(),
                        modality: *modality,
                        interval: self.settings.interval_for(*modality),
                        adapter: Arc::clone(adapter),
                        frames: Arc::clone(&self.frames),
                        mailbox: mailbox.clone(),
                    })
                })
                .collect();

            let previous = state.session.replace(SessionState::new(
                session_id.clone(),
                Utc::now(),
                ready,
                &self.settings,
            ));
            state.status = SessionStatus::Active;
            (session_id, loops, writer_rx, previous)
        };

        self.spawn_writer(writer_rx).await;

        if let Err(err) = self.sensing.lock().await.start_sensing(loops) {
            log_error!("Failed to start polling for session {session_id}: {err:#}");
            {
                let mut state = self.state.lock().await;
                state.status = SessionStatus::Idle;
                state.session = previous;
            }
            if let Some(handle) = self.writer.lock().await.take() {
                handle.abort();
            }
            return Err(SessionError::Sensing(err));
        }

        log_info!("Session {session_id} started");
        Ok(self.status().await)
    }

    /// Stops polling and freezes the session. Calling it again after a session
    /// has ended is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            match (state.status, state.session.as_mut()) {
                (SessionStatus::Active, Some(session)) => {
                    session.freeze(Utc::now());
                    log_info!("Stopping session {}", session.id);
                }
                (_, Some(_)) => return Ok(()),
                (_, None) => return Err(SessionError::NoActiveOrRecentSession),
            }
            state.status = SessionStatus::Idle;
        }

        if let Err(err) = self.sensing.lock().await.stop_sensing().await {
            log_error!("Failed to stop polling loops cleanly: {err:#}");
        }

        if let Some(handle) = self.writer.lock().await.take() {
            if let Err(err) = handle.await {
                log_warn!("Session writer task failed to join: {err}");
            }
        }
        Ok(())
    }

    /// Applies one batch of detections for the running session, exactly as a
    /// polling tick would.
    pub async fn ingest(&self, modality: Modality, detections: Vec<RawDetection>) -> Result<()> {
        let mut state = self.state.lock().await;
        let session_id = match (state.status, state.session.as_ref()) {
            (SessionStatus::Active, Some(session)) => session.id.clone(),
            _ => return Err(SessionError::NoActiveOrRecentSession),
        };
        state.apply(TickMessage::Batch {
            session_id,
            modality,
            detections,
        });
        Ok(())
    }

    pub async fn query_summary(&self, window_minutes: Option<u64>) -> Result<SessionSummary> {
        let state = self.state.lock().await;
        let session = state.readable_session()?;
        Ok(session.summary(window_minutes, Utc::now().timestamp_millis()))
    }

    pub async fn export_all(&self) -> Result<ExportArtifact> {
        let state = self.state.lock().await;
        let session = state.readable_session()?;
        Ok(ExportArtifact::from_session(
            session,
            Utc::now().timestamp_millis(),
        ))
    }

    /// Exports into the configured directory and returns the written path.
    pub async fn export_to_file(&self) -> Result<PathBuf> {
        let artifact = self.export_all().await?;
        let dir = self.settings.export_dir.clone();
        tokio::task::spawn_blocking(move || artifact.write_to_dir(&dir))
            .await
            .map_err(|err| SessionError::Export(std::io::Error::other(err)))?
    }

    /// Asks `service` a question about the current (or just-ended) session.
    pub async fn ask(
        &self,
        question: &str,
        window_minutes: Option<u64>,
        service: Arc<dyn AnswerService>,
    ) -> Result<Answer> {
        let summary = self.query_summary(window_minutes).await?;
        let request = AnswerRequest::new(&summary, question)?;
        tokio::task::spawn_blocking(move || service.answer(&request))
            .await
            .map_err(|err| SessionError::Answer(anyhow::Error::new(err)))?
            .map_err(SessionError::Answer)
    }

    async fn spawn_writer(&self, mut mailbox: mpsc::Receiver<TickMessage>) {
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            while let Some(message) = mailbox.recv().await {
                state.lock().await.apply(message);
            }
        });

        let mut writer = self.writer.lock().await;
        if let Some(previous) = writer.replace(handle) {
            previous.abort();
        }
    }
}
