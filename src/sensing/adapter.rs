use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::{Modality, RawDetection};

/// Opaque handle to one video frame. The aggregator never looks inside the
/// payload; it only passes the handle through to detectors.
#[derive(Clone)]
pub struct FrameHandle {
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    payload: Arc<dyn Any + Send + Sync>,
}

impl FrameHandle {
    pub fn new(sequence: u64, payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            sequence,
            captured_at: Utc::now(),
            payload,
        }
    }

    pub fn payload<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameHandle")
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .finish_non_exhaustive()
    }
}

/// Supplies the frame every detector should look at right now.
pub trait FrameSource: Send + Sync {
    /// `Ok(None)` when no frame is available yet; the tick is skipped.
    fn current_frame(&self) -> Result<Option<FrameHandle>>;
}

/// One detector (object classifier, face/emotion model, hand landmarker).
///
/// Calls are blocking and run on the blocking pool, one at a time per modality.
pub trait DetectionAdapter: Send + Sync {
    fn initialize(&self) -> Result<()>;

    fn detect(&self, frame: &FrameHandle) -> Result<Vec<RawDetection>>;
}

/// Frame source with no pixel data, numbering frames as they are requested.
#[derive(Debug, Default)]
pub struct CountingFrameSource {
    next: AtomicU64,
}

impl CountingFrameSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for CountingFrameSource {
    fn current_frame(&self) -> Result<Option<FrameHandle>> {
        let sequence = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(Some(FrameHandle::new(sequence, Arc::new(()))))
    }
}

/// Detections recorded per modality, one list per frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recording {
    pub frames: BTreeMap<Modality, Vec<Vec<RawDetection>>>,
}

impl Recording {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recording from {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse recording {}", path.display()))
    }

    pub fn adapter(&self, modality: Modality) -> Option<ReplayAdapter> {
        self.frames
            .get(&modality)
            .map(|frames| ReplayAdapter::new(frames.clone()))
    }
}

/// Plays back recorded detections, one frame per `detect` call, looping at
/// the end of the recording.
#[derive(Debug)]
pub struct ReplayAdapter {
    frames: Vec<Vec<RawDetection>>,
    cursor: Mutex<usize>,
}

impl ReplayAdapter {
    pub fn new(frames: Vec<Vec<RawDetection>>) -> Self {
        Self {
            frames,
            cursor: Mutex::new(0),
        }
    }
}

impl DetectionAdapter for ReplayAdapter {
    fn initialize(&self) -> Result<()> {
        if self.frames.is_empty() {
            anyhow::bail!("recording has no frames");
        }
        Ok(())
    }

    fn detect(&self, _frame: &FrameHandle) -> Result<Vec<RawDetection>> {
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        let mut cursor = self
            .cursor
            .lock()
            .map_err(|_| anyhow::anyhow!("replay cursor poisoned"))?;
        let detections = self.frames[*cursor % self.frames.len()].clone();
        *cursor += 1;
        Ok(detections)
    }
}
