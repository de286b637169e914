//! Aggregates object, face and hand detections from independent detectors
//! into per-session history, identities, interactions and summaries.

pub mod answer;
pub mod error;
pub mod export;
pub mod history;
pub mod models;
pub mod sensing;
pub mod session;
pub mod settings;
pub mod stats;
pub mod tracking;
pub mod utils;

pub use answer::{Answer, AnswerRequest, AnswerService};
pub use error::{Result, SessionError};
pub use export::ExportArtifact;
pub use history::HistoryBuffer;
pub use models::{
    BoundingBox, DetectionEvent, EntityId, HandObservation, Modality, RawDetection, TrackedFace,
};
pub use sensing::{DetectionAdapter, FrameHandle, FrameSource};
pub use session::{SessionController, SessionSnapshot, SessionStatus};
pub use settings::{SessionSettings, SettingsStore};
pub use stats::{ModalitySummary, SessionSummary};
