use serde::{Deserialize, Serialize};
use std::fmt;

use crate::history::Timestamped;
use crate::models::{EntityId, TimestampMs, TrackedFace};

pub const DEFAULT_INTERACTION_DISTANCE: f32 = 300.0;

const SMILE_EMOTION: &str = "happy";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum InteractionKind {
    MutualSmile,
    Interacting,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub kind: InteractionKind,
    pub first: EntityId,
    pub second: EntityId,
    pub distance: f32,
    pub timestamp: TimestampMs,
}

impl fmt::Display for InteractionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            InteractionKind::MutualSmile => {
                write!(f, "Person #{} and #{} both smiling", self.first, self.second)
            }
            InteractionKind::Interacting => {
                write!(f, "Person #{} and #{} interacting", self.first, self.second)
            }
        }
    }
}

impl Timestamped for InteractionEvent {
    fn timestamp(&self) -> TimestampMs {
        self.timestamp
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InteractionDetector {
    max_distance: f32,
}

impl InteractionDetector {
    pub fn new(max_distance: f32) -> Self {
        Self { max_distance }
    }

    /// Checks every unordered pair of this tick's faces, in input order.
    pub fn detect(&self, faces: &[TrackedFace], timestamp: TimestampMs) -> Vec<InteractionEvent> {
        if faces.len() < 2 {
            return Vec::new();
        }

        let mut interactions = Vec::new();
        for (i, a) in faces.iter().enumerate() {
            for b in &faces[i + 1..] {
                let distance = a.bounding_box().corner_distance(b.bounding_box());
                if distance >= self.max_distance {
                    continue;
                }

                let kind = if a.dominant_emotion == SMILE_EMOTION && b.dominant_emotion == SMILE_EMOTION {
                    InteractionKind::MutualSmile
                } else {
                    InteractionKind::Interacting
                };

                interactions.push(InteractionEvent {
                    kind,
                    first: a.entity_id,
                    second: b.entity_id,
                    distance,
                    timestamp,
                });
            }
        }
        interactions
    }
}

impl Default for InteractionDetector {
    fn default() -> Self {
        Self::new(DEFAULT_INTERACTION_DISTANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, DetectionEvent, Modality, RawDetection};

    fn face(id: EntityId, x: f32, y: f32, emotion: &str) -> TrackedFace {
        let raw = RawDetection::new(emotion, 0.9, BoundingBox::new(x, y, 50.0, 50.0));
        TrackedFace {
            event: DetectionEvent::from_raw(Modality::Face, &raw, 0),
            entity_id: id,
            dominant_emotion: emotion.to_string(),
            age: None,
            gender: None,
        }
    }

    #[test]
    fn single_face_yields_nothing() {
        let detector = InteractionDetector::default();
        assert!(detector.detect(&[face(1, 0.0, 0.0, "happy")], 0).is_empty());
    }

    #[test]
    fn two_happy_faces_close_together_smile_once() {
        let detector = InteractionDetector::default();
        let faces = [face(1, 0.0, 0.0, "happy"), face(2, 200.0, 0.0, "happy")];
        let events = detector.detect(&faces, 10);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, InteractionKind::MutualSmile);
        assert_eq!(events[0].to_string(), "Person #1 and #2 both smiling");
    }

    #[test]
    fn mixed_emotions_are_generic_interactions() {
        let detector = InteractionDetector::default();
        let faces = [face(3, 0.0, 0.0, "happy"), face(4, 0.0, 100.0, "sad")];
        let events = detector.detect(&faces, 0);
        assert_eq!(events[0].to_string(), "Person #3 and #4 interacting");
    }

    #[test]
    fn distant_pairs_are_ignored() {
        let detector = InteractionDetector::default();
        let faces = [
            face(1, 0.0, 0.0, "happy"),
            face(2, 300.0, 0.0, "happy"),
            face(3, 100.0, 0.0, "neutral"),
        ];
        let pairs: Vec<(EntityId, EntityId)> = detector
            .detect(&faces, 0)
            .iter()
            .map(|e| (e.first, e.second))
            .collect();
        assert_eq!(pairs, vec![(1, 3), (2, 3)]);
    }
}
