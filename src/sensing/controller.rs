use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::Modality;

use super::loop_worker::{polling_loop, PollingLoop};

/// Owns the per-modality polling tasks of the running session.
pub struct SensingController {
    handles: Vec<(Modality, JoinHandle<()>)>,
    cancel_token: Option<CancellationToken>,
}

impl SensingController {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
            cancel_token: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel_token.is_some()
    }

    pub fn start_sensing(&mut self, loops: Vec<PollingLoop>) -> Result<()> {
        if self.is_active() {
            bail!("sensing already active");
        }

        let cancel_token = CancellationToken::new();
        for worker in loops {
            info!(
                "Starting {} polling every {}ms",
                worker.modality,
                worker.interval.as_millis()
            );
            let modality = worker.modality;
            let handle = tokio::spawn(polling_loop(worker, cancel_token.clone()));
            self.handles.push((modality, handle));
        }

        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Stops scheduling ticks and waits for every loop to exit. In-flight
    /// detector calls are abandoned, not awaited.
    pub async fn stop_sensing(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        for (modality, handle) in self.handles.drain(..) {
            handle
                .await
                .with_context(|| format!("{modality} polling task failed to join"))?;
        }
        Ok(())
    }
}

impl Default for SensingController {
    fn default() -> Self {
        Self::new()
    }
}
