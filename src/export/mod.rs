//! Portable session artifact: the retained event history, lifetime counts
//! and the unwindowed summary, serialised as pretty JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{DetectionEvent, Modality, TimestampMs};
use crate::session::SessionState;
use crate::stats::{LabelCounts, SessionSummary};
use crate::tracking::InteractionEvent;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub exported_at: DateTime<Utc>,
    /// Retained events, grouped by modality and in arrival order within each.
    pub detections: Vec<DetectionEvent>,
    pub stats: BTreeMap<Modality, LabelCounts>,
    pub interactions: Vec<InteractionEvent>,
    pub summary: SessionSummary,
}

impl ExportArtifact {
    pub fn from_session(session: &SessionState, now: TimestampMs) -> Self {
        let detections = Modality::ALL
            .iter()
            .flat_map(|modality| session.history(*modality).snapshot(None).cloned())
            .collect();

        Self {
            session_id: session.id.clone(),
            started_at: session.started_at,
            stopped_at: session.stopped_at,
            exported_at: Utc::now(),
            detections,
            stats: session.stats().all_lifetime_counts().clone(),
            interactions: session.interactions().cloned().collect(),
            summary: session.summary(None, now),
        }
    }

    pub fn file_name(&self) -> String {
        format!("detection-session-{}.json", self.exported_at.timestamp_millis())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the artifact into `dir`, creating it if needed, and returns the
    /// path of the new file.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        fs::write(&path, self.to_json()?)?;
        log::info!(
            "Exported session {} ({} events) to {}",
            self.session_id,
            self.detections.len(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, DetectionDetail, FaceAttributes, RawDetection};
    use crate::settings::SessionSettings;
    use tempfile::tempdir;

    fn session_with_events() -> SessionState {
        let settings = SessionSettings {
            history_capacity: 2,
            ..SessionSettings::default()
        };
        let mut session = SessionState::new(
            "export-test".into(),
            Utc::now(),
            vec![Modality::Object, Modality::Face],
            &settings,
        );
        for (i, label) in ["car", "bus", "car"].iter().enumerate() {
            let raw = RawDetection::new(*label, 0.9, BoundingBox::default());
            session.apply_batch(Modality::Object, &[raw], i as i64 * 1000);
        }
        session
    }

    #[test]
    fn artifact_holds_retained_history_and_lifetime_counts() {
        let session = session_with_events();
        let artifact = ExportArtifact::from_session(&session, 3000);

        let labels: Vec<_> = artifact.detections.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["bus", "car"]);
        assert_eq!(artifact.stats[&Modality::Object]["car"], 2);
        assert_eq!(artifact.summary.window_minutes, None);
        assert_eq!(artifact.summary.modalities[&Modality::Object].total_detections, 2);
    }

    #[test]
    fn writes_pretty_json_file() {
        let dir = tempdir().unwrap();
        let artifact = ExportArtifact::from_session(&session_with_events(), 3000);
        let path = artifact.write_to_dir(&dir.path().join("exports")).unwrap();

        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("detection-session-"));
        assert!(file_name.ends_with(".json"));

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\n  \"sessionId\": \"export-test\""));
        let parsed: ExportArtifact = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.detections.len(), 2);
        assert_eq!(parsed.stats, artifact.stats);
    }

    #[test]
    fn face_attributes_reach_the_artifact() {
        let mut session = SessionState::new(
            "faces".into(),
            Utc::now(),
            vec![Modality::Face],
            &SessionSettings::default(),
        );
        let attrs = FaceAttributes {
            age: Some(41.0),
            gender: Some("male".into()),
            ..FaceAttributes::default()
        };
        let raw = RawDetection::new("neutral", 0.9, BoundingBox::new(5.0, 5.0, 40.0, 40.0))
            .with_detail(DetectionDetail::Face(attrs));
        session.apply_batch(Modality::Face, &[raw], 100);

        let artifact = ExportArtifact::from_session(&session, 200);
        let face = &artifact.detections[0];
        assert_eq!(face.entity_id, Some(1));
        assert_eq!(face.age, Some(41.0));
        assert_eq!(face.gender.as_deref(), Some("male"));

        let json = artifact.to_json().unwrap();
        assert!(json.contains("\"gender\": \"male\""));
    }
}
