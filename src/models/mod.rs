mod detection;

pub use detection::{
    BoundingBox, DetectionDetail, DetectionEvent, EntityId, FaceAttributes, HandAttributes,
    HandObservation, Handedness, Landmark, Modality, RawDetection, TimestampMs, TrackedFace,
};
