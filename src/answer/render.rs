use serde_json::{json, Map, Value};
use std::fmt::Write as _;

use crate::models::Modality;
use crate::stats::{LabelCounts, SessionSummary};

impl SessionSummary {
    /// Flat metric-name to value map, the shape an answer service expects.
    pub fn to_metrics(&self) -> Map<String, Value> {
        let mut metrics = Map::new();
        for (modality, summary) in &self.modalities {
            metrics.insert(
                format!("{modality}Counts"),
                json!(summary.counts),
            );
            metrics.insert(
                format!("{modality}TotalDetections"),
                json!(summary.total_detections),
            );
            metrics.insert(format!("{modality}Timeline"), json!(summary.timeline));
        }
        metrics.insert("uniquePeople".into(), json!(self.people.unique_people));
        metrics.insert("currentFaces".into(), json!(self.people.current_faces));
        metrics.insert("emotions".into(), json!(self.people.emotions));
        metrics.insert("interactions".into(), json!(self.people.interactions));
        metrics.insert("gestures".into(), json!(self.gestures));
        metrics.insert(
            "timeRange".into(),
            json!(match self.window_minutes {
                Some(minutes) => format!("{minutes} minutes"),
                None => "entire session".to_string(),
            }),
        );
        metrics.insert(
            "sessionDurationMinutes".into(),
            json!(self.session_duration_minutes),
        );
        metrics
    }

    /// Plain-text analytics report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Complete Session Analytics:");

        if let Some(objects) = self.modalities.get(&Modality::Object) {
            let _ = writeln!(out);
            let _ = writeln!(out, "Objects Detected ({}):", objects.time_range);
            write_counts(&mut out, &objects.counts);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "People Analysis:");
        let _ = writeln!(out, "- Unique People: {}", self.people.unique_people);
        let _ = writeln!(out, "- Total Face Detections: {}", self.people.total_detections);
        let _ = writeln!(out, "- Current People in Frame: {}", self.people.current_faces);

        let _ = writeln!(out);
        let _ = writeln!(out, "Emotions:");
        write_counts(&mut out, &self.people.emotions);

        let _ = writeln!(out);
        let _ = writeln!(out, "Interactions:");
        if self.people.interactions.is_empty() {
            let _ = writeln!(out, "- none");
        }
        for interaction in &self.people.interactions {
            let _ = writeln!(out, "- {interaction}");
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Gestures Detected:");
        write_counts(&mut out, &self.gestures);

        let _ = writeln!(out);
        let _ = write!(out, "Session Duration: {} minutes", self.session_duration_minutes);
        out
    }
}

fn write_counts(out: &mut String, counts: &LabelCounts) {
    if counts.is_empty() {
        let _ = writeln!(out, "- none");
        return;
    }
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (label, count) in sorted {
        let _ = writeln!(out, "- {label}: {count}");
    }
}
