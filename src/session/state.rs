use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::history::HistoryBuffer;
use crate::models::{
    DetectionEvent, HandObservation, Modality, RawDetection, TimestampMs, TrackedFace,
};
use crate::settings::SessionSettings;
use crate::stats::{duration_minutes, FaceSummary, SessionSummary, StatsAggregator};
use crate::tracking::{observe_hand, IdentityTracker, InteractionDetector, InteractionEvent};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Active,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TickCounters {
    pub applied: u64,
    pub failed: u64,
    pub events: u64,
}

/// Everything a single session accumulates between `start()` and `stop()`.
///
/// Only the session writer mutates this; readers see it behind the
/// controller's lock, so a batch is either fully applied or not at all.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub modalities: Vec<Modality>,
    histories: BTreeMap<Modality, HistoryBuffer<DetectionEvent>>,
    tracker: IdentityTracker,
    interaction_detector: InteractionDetector,
    interactions: HistoryBuffer<InteractionEvent>,
    stats: StatsAggregator,
    hands_in_frame: Vec<HandObservation>,
    counters: BTreeMap<Modality, TickCounters>,
}

impl SessionState {
    pub fn new(
        id: String,
        started_at: DateTime<Utc>,
        modalities: Vec<Modality>,
        settings: &SessionSettings,
    ) -> Self {
        let histories = Modality::ALL
            .iter()
            .map(|modality| (*modality, HistoryBuffer::new(settings.history_capacity)))
            .collect();

        Self {
            id,
            started_at,
            stopped_at: None,
            modalities,
            histories,
            tracker: IdentityTracker::new(settings.identity_match_threshold),
            interaction_detector: InteractionDetector::new(settings.interaction_distance),
            interactions: HistoryBuffer::new(settings.interaction_log_capacity),
            stats: StatsAggregator::new(settings.timeline_length),
            hands_in_frame: Vec::new(),
            counters: BTreeMap::new(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped_at.is_some()
    }

    /// Marks the session ended and drops the per-tick state (faces and hands
    /// currently in frame). Histories, stats and the interaction log stay.
    pub fn freeze(&mut self, stopped_at: DateTime<Utc>) {
        self.stopped_at = Some(stopped_at);
        self.tracker.clear_tracking();
        self.hands_in_frame.clear();
    }

    /// Applies one tick's detections. Timestamps never run backwards within a
    /// modality even if the wall clock does.
    pub fn apply_batch(
        &mut self,
        modality: Modality,
        detections: &[RawDetection],
        now: TimestampMs,
    ) -> usize {
        let timestamp = self
            .history(modality)
            .newest_timestamp()
            .map_or(now, |newest| newest.max(now));

        let events: Vec<DetectionEvent> = match modality {
            Modality::Object => detections
                .iter()
                .map(|raw| DetectionEvent::from_raw(Modality::Object, raw, timestamp))
                .collect(),
            Modality::Face => {
                let faces = self.tracker.assign(detections, timestamp);
                let interactions = self.interaction_detector.detect(&faces, timestamp);
                self.interactions.extend(interactions);
                faces.into_iter().map(|face| face.event).collect()
            }
            Modality::Hand => {
                let hands: Vec<HandObservation> = detections
                    .iter()
                    .map(|raw| observe_hand(raw, timestamp))
                    .collect();
                let events = detections
                    .iter()
                    .zip(&hands)
                    .map(|(raw, hand)| {
                        let mut event = DetectionEvent::from_raw(Modality::Hand, raw, timestamp);
                        event.label = hand.gesture.clone();
                        event
                    })
                    .collect();
                self.hands_in_frame = hands;
                events
            }
        };

        let count = events.len();
        self.stats.record_batch(&events);
        self.histories
            .entry(modality)
            .or_default()
            .extend(events);

        let counters = self.counters.entry(modality).or_default();
        counters.applied += 1;
        counters.events += count as u64;
        count
    }

    pub fn record_failure(&mut self, modality: Modality) {
        self.counters.entry(modality).or_default().failed += 1;
    }

    pub fn history(&self, modality: Modality) -> &HistoryBuffer<DetectionEvent> {
        // Every modality gets a buffer in `new`.
        &self.histories[&modality]
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn counters(&self, modality: Modality) -> TickCounters {
        self.counters.get(&modality).copied().unwrap_or_default()
    }

    pub fn interactions(&self) -> impl Iterator<Item = &InteractionEvent> + Clone + '_ {
        self.interactions.snapshot(None)
    }

    pub fn current_faces(&self) -> impl Iterator<Item = &TrackedFace> {
        self.tracker.current()
    }

    pub fn hands_in_frame(&self) -> &[HandObservation] {
        &self.hands_in_frame
    }

    pub fn oldest_timestamp(&self) -> Option<TimestampMs> {
        self.histories
            .values()
            .filter_map(|history| history.oldest_timestamp())
            .min()
    }

    pub fn face_summary(&self) -> FaceSummary {
        FaceSummary {
            unique_people: self.tracker.minted(),
            total_detections: self.history(Modality::Face).len(),
            emotions: self.stats.lifetime_counts(Modality::Face),
            interactions: self.interactions().map(ToString::to_string).collect(),
            current_faces: self.tracker.current_count(),
        }
    }

    pub fn summary(&self, window_minutes: Option<u64>, now: TimestampMs) -> SessionSummary {
        let modalities = self
            .modalities
            .iter()
            .map(|modality| {
                let summary =
                    self.stats
                        .summarize(*modality, self.history(*modality), window_minutes, now);
                (*modality, summary)
            })
            .collect();

        SessionSummary {
            session_id: self.id.clone(),
            started_at: self.started_at,
            generated_at: Utc::now(),
            window_minutes: window_minutes.filter(|minutes| *minutes > 0),
            modalities,
            people: self.face_summary(),
            gestures: self.stats.lifetime_counts(Modality::Hand),
            session_duration_minutes: duration_minutes(self.oldest_timestamp(), now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, DetectionDetail, FaceAttributes};

    fn state(modalities: Vec<Modality>) -> SessionState {
        SessionState::new(
            "test".into(),
            Utc::now(),
            modalities,
            &SessionSettings::default(),
        )
    }

    fn object(label: &str, confidence: f32) -> RawDetection {
        RawDetection::new(label, confidence, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    fn face(x: f32, y: f32, emotion: &str) -> RawDetection {
        let mut attrs = FaceAttributes::default();
        attrs.expressions.insert(emotion.to_string(), 0.9);
        RawDetection::new("face", 0.95, BoundingBox::new(x, y, 60.0, 60.0))
            .with_detail(DetectionDetail::Face(attrs))
    }

    #[test]
    fn object_ticks_accumulate_lifetime_counts() {
        let mut state = state(vec![Modality::Object]);
        state.apply_batch(Modality::Object, &[object("car", 0.9)], 1_000);
        state.apply_batch(Modality::Object, &[object("car", 0.8), object("person", 0.7)], 2_000);
        state.apply_batch(Modality::Object, &[], 3_000);

        let counts = state.stats().lifetime_counts(Modality::Object);
        assert_eq!(counts["car"], 2);
        assert_eq!(counts["person"], 1);
        assert_eq!(state.counters(Modality::Object).applied, 3);

        let summary = state.summary(None, 3_000);
        assert_eq!(summary.modalities[&Modality::Object].timeline.len(), 3);
    }

    #[test]
    fn timestamps_never_go_backwards() {
        let mut state = state(vec![Modality::Object]);
        state.apply_batch(Modality::Object, &[object("car", 0.9)], 5_000);
        state.apply_batch(Modality::Object, &[object("bus", 0.9)], 4_000);

        let stamps: Vec<i64> = state
            .history(Modality::Object)
            .snapshot(None)
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(stamps, vec![5_000, 5_000]);
    }

    #[test]
    fn face_ticks_track_identity_and_interactions() {
        let mut state = state(vec![Modality::Face]);
        state.apply_batch(Modality::Face, &[face(10.0, 10.0, "happy"), face(200.0, 10.0, "happy")], 0);
        state.apply_batch(Modality::Face, &[face(15.0, 12.0, "happy"), face(205.0, 12.0, "sad")], 500);

        let people = state.face_summary();
        assert_eq!(people.unique_people, 2);
        assert_eq!(people.current_faces, 2);
        assert_eq!(people.emotions["happy"], 3);
        assert_eq!(
            people.interactions,
            vec![
                "Person #1 and #2 both smiling".to_string(),
                "Person #1 and #2 interacting".to_string(),
            ]
        );

        let ids: Vec<_> = state
            .history(Modality::Face)
            .snapshot(None)
            .map(|e| e.entity_id)
            .collect();
        assert_eq!(ids, vec![Some(1), Some(2), Some(1), Some(2)]);
    }

    #[test]
    fn empty_face_tick_clears_current_faces() {
        let mut state = state(vec![Modality::Face]);
        state.apply_batch(Modality::Face, &[face(10.0, 10.0, "neutral")], 0);
        state.apply_batch(Modality::Face, &[], 500);
        assert_eq!(state.face_summary().current_faces, 0);
        assert_eq!(state.history(Modality::Face).len(), 1);
    }

    #[test]
    fn hand_events_are_labelled_with_gestures() {
        let mut state = state(vec![Modality::Hand]);
        let raw = RawDetection::new("Right", 0.8, BoundingBox::default()).with_detail(
            DetectionDetail::Hand(crate::models::HandAttributes {
                handedness: crate::models::Handedness::Right,
                landmarks: Vec::new(),
                finger_count: Some(2),
            }),
        );
        state.apply_batch(Modality::Hand, &[raw], 10);

        assert_eq!(state.hands_in_frame().len(), 1);
        assert_eq!(state.stats().lifetime_counts(Modality::Hand)["Peace"], 1);
        assert_eq!(state.summary(None, 10).gestures["Peace"], 1);
    }

    #[test]
    fn freeze_drops_in_frame_state_but_keeps_history() {
        let mut state = state(vec![Modality::Face, Modality::Hand]);
        state.apply_batch(Modality::Face, &[face(10.0, 10.0, "happy")], 0);
        state.apply_batch(
            Modality::Hand,
            &[RawDetection::new("Left", 0.8, BoundingBox::default())],
            0,
        );
        state.freeze(Utc::now());

        assert!(state.is_stopped());
        assert_eq!(state.current_faces().count(), 0);
        assert!(state.hands_in_frame().is_empty());

        let people = state.face_summary();
        assert_eq!(people.current_faces, 0);
        assert_eq!(people.unique_people, 1);
        assert_eq!(state.history(Modality::Face).len(), 1);
        assert_eq!(state.summary(None, 0).gestures["Fist"], 1);
    }

    #[test]
    fn failures_are_counted_without_touching_history() {
        let mut state = state(vec![Modality::Object]);
        state.record_failure(Modality::Object);
        assert_eq!(state.counters(Modality::Object).failed, 1);
        assert!(state.history(Modality::Object).is_empty());
    }
}
