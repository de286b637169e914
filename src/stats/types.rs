use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Modality;

pub type LabelCounts = BTreeMap<String, u64>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub time: String,
    pub label: String,
    /// Whole percent, 0..=100.
    pub confidence: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModalitySummary {
    pub modality: Modality,
    pub total_detections: usize,
    pub counts: LabelCounts,
    pub timeline: Vec<TimelineEntry>,
    pub time_range: String,
    /// Approximate: measured from the oldest retained event, so it undercounts
    /// once the history buffer has evicted.
    pub session_duration_minutes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaceSummary {
    pub unique_people: u64,
    pub total_detections: usize,
    pub emotions: LabelCounts,
    pub interactions: Vec<String>,
    pub current_faces: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub window_minutes: Option<u64>,
    pub modalities: BTreeMap<Modality, ModalitySummary>,
    pub people: FaceSummary,
    pub gestures: LabelCounts,
    pub session_duration_minutes: u64,
}
