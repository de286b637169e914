use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type EntityId = u64;

/// Epoch milliseconds, non-decreasing within one history buffer.
pub type TimestampMs = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Modality {
    Object,
    Face,
    Hand,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Object, Modality::Face, Modality::Hand];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Object => "object",
            Modality::Face => "face",
            Modality::Hand => "hand",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Box in source-frame pixel coordinates, anchored at the top-left corner.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Euclidean distance between the top-left corners of two boxes.
    pub fn corner_distance(&self, other: &BoundingBox) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Handedness {
    Left,
    Right,
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Left => f.write_str("Left"),
            Handedness::Right => f.write_str("Right"),
        }
    }
}

/// Normalised hand landmark (0..1 in frame space, z relative to the wrist).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaceAttributes {
    /// Expression name to score, e.g. `happy -> 0.92`.
    #[serde(default)]
    pub expressions: BTreeMap<String, f32>,
    #[serde(default)]
    pub age: Option<f32>,
    #[serde(default)]
    pub gender: Option<String>,
}

impl FaceAttributes {
    pub fn dominant_expression(&self) -> Option<&str> {
        self.expressions
            .iter()
            .fold(None::<(&String, f32)>, |best, (name, score)| match best {
                Some((_, best_score)) if best_score >= *score => best,
                _ => Some((name, *score)),
            })
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandAttributes {
    pub handedness: Handedness,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
    #[serde(default)]
    pub finger_count: Option<u8>,
}

/// Modality-specific payload an adapter may attach to a detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DetectionDetail {
    Face(FaceAttributes),
    Hand(HandAttributes),
}

/// What a detection adapter hands back for one frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetectionDetail>,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounding_box,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: DetectionDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn face_attributes(&self) -> Option<&FaceAttributes> {
        match &self.detail {
            Some(DetectionDetail::Face(attrs)) => Some(attrs),
            _ => None,
        }
    }

    pub fn hand_attributes(&self) -> Option<&HandAttributes> {
        match &self.detail {
            Some(DetectionDetail::Hand(attrs)) => Some(attrs),
            _ => None,
        }
    }
}

/// One observation at one instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub modality: Modality,
    pub label: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    pub timestamp: TimestampMs,
    /// Set for face events once the identity tracker has assigned them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    /// Estimated age and gender, when a face adapter reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl DetectionEvent {
    pub fn from_raw(modality: Modality, raw: &RawDetection, timestamp: TimestampMs) -> Self {
        Self {
            modality,
            label: raw.label.clone(),
            confidence: raw.confidence.clamp(0.0, 1.0),
            bounding_box: raw.bounding_box,
            timestamp,
            entity_id: None,
            age: None,
            gender: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedFace {
    pub event: DetectionEvent,
    pub entity_id: EntityId,
    pub dominant_emotion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl TrackedFace {
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.event.bounding_box
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HandObservation {
    pub handedness: Handedness,
    pub landmarks: Vec<Landmark>,
    pub gesture: String,
    pub finger_count: u8,
    pub timestamp: TimestampMs,
}
