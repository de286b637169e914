use std::collections::BTreeMap;

use crate::models::{DetectionEvent, EntityId, Modality, RawDetection, TimestampMs, TrackedFace};

pub const DEFAULT_MATCH_THRESHOLD: f32 = 100.0;

/// Assigns stable integer identities to faces across consecutive ticks.
///
/// Matching is a greedy nearest-corner search against the faces seen on the
/// previous tick only. Ties go to the lowest entity id. Two detections in the
/// same tick may resolve to the same entity.
#[derive(Debug, Clone)]
pub struct IdentityTracker {
    threshold: f32,
    next_entity_id: EntityId,
    tracked: BTreeMap<EntityId, TrackedFace>,
}

impl IdentityTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            next_entity_id: 1,
            tracked: BTreeMap::new(),
        }
    }

    /// Resolves one tick of face detections. The tracked set is replaced by
    /// this tick's assignments, so entities missing here are forgotten.
    pub fn assign(&mut self, detections: &[RawDetection], timestamp: TimestampMs) -> Vec<TrackedFace> {
        let faces: Vec<TrackedFace> = detections
            .iter()
            .map(|raw| {
                let entity_id = self
                    .nearest_match(raw)
                    .unwrap_or_else(|| self.mint_id());
                build_tracked_face(raw, entity_id, timestamp)
            })
            .collect();

        self.tracked = faces
            .iter()
            .map(|face| (face.entity_id, face.clone()))
            .collect();

        faces
    }

    fn nearest_match(&self, raw: &RawDetection) -> Option<EntityId> {
        let mut best: Option<(EntityId, f32)> = None;
        for (id, face) in &self.tracked {
            let distance = raw.bounding_box.corner_distance(face.bounding_box());
            if distance >= self.threshold {
                continue;
            }
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((*id, distance)),
            }
        }
        best.map(|(id, _)| id)
    }

    fn mint_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn current(&self) -> impl Iterator<Item = &TrackedFace> {
        self.tracked.values()
    }

    pub fn current_count(&self) -> usize {
        self.tracked.len()
    }

    /// Number of identities handed out so far.
    pub fn minted(&self) -> u64 {
        self.next_entity_id - 1
    }

    pub fn next_entity_id(&self) -> EntityId {
        self.next_entity_id
    }

    pub fn clear_tracking(&mut self) {
        self.tracked.clear();
    }
}

impl Default for IdentityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

fn build_tracked_face(raw: &RawDetection, entity_id: EntityId, timestamp: TimestampMs) -> TrackedFace {
    let attrs = raw.face_attributes();
    let dominant_emotion = attrs
        .and_then(|a| a.dominant_expression())
        .unwrap_or(raw.label.as_str())
        .to_string();

    let age = attrs.and_then(|a| a.age);
    let gender = attrs.and_then(|a| a.gender.clone());

    let mut event = DetectionEvent::from_raw(Modality::Face, raw, timestamp);
    event.label = dominant_emotion.clone();
    event.entity_id = Some(entity_id);
    event.age = age;
    event.gender = gender.clone();

    TrackedFace {
        event,
        entity_id,
        dominant_emotion,
        age,
        gender,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, DetectionDetail, FaceAttributes};

    fn face_at(x: f32, y: f32) -> RawDetection {
        RawDetection::new("neutral", 0.9, BoundingBox::new(x, y, 80.0, 80.0))
    }

    fn ids(faces: &[TrackedFace]) -> Vec<EntityId> {
        faces.iter().map(|f| f.entity_id).collect()
    }

    #[test]
    fn nearby_faces_keep_their_id_and_far_faces_get_new_ones() {
        let mut tracker = IdentityTracker::default();
        let first = tracker.assign(&[face_at(10.0, 10.0)], 0);
        let second = tracker.assign(&[face_at(15.0, 12.0)], 500);
        let third = tracker.assign(&[face_at(500.0, 500.0)], 1000);

        assert_eq!(
            [ids(&first), ids(&second), ids(&third)].concat(),
            vec![1, 1, 2]
        );
    }

    #[test]
    fn threshold_boundary() {
        let mut tracker = IdentityTracker::default();
        tracker.assign(&[face_at(0.0, 0.0)], 0);
        let within = tracker.assign(&[face_at(99.0, 0.0)], 1);
        assert_eq!(ids(&within), vec![1]);

        let mut tracker = IdentityTracker::default();
        tracker.assign(&[face_at(0.0, 0.0)], 0);
        let outside = tracker.assign(&[face_at(100.5, 0.0)], 1);
        assert_eq!(ids(&outside), vec![2]);
    }

    #[test]
    fn two_detections_near_the_same_entity_share_its_id() {
        let mut tracker = IdentityTracker::default();
        tracker.assign(&[face_at(100.0, 100.0)], 0);
        let faces = tracker.assign(&[face_at(120.0, 100.0), face_at(80.0, 100.0)], 1);
        assert_eq!(ids(&faces), vec![1, 1]);
        assert_eq!(tracker.current_count(), 1);
    }

    #[test]
    fn nearest_tracked_face_wins() {
        let mut tracker = IdentityTracker::default();
        tracker.assign(&[face_at(0.0, 0.0), face_at(60.0, 0.0)], 0);
        let faces = tracker.assign(&[face_at(50.0, 0.0)], 1);
        assert_eq!(ids(&faces), vec![2]);
    }

    #[test]
    fn ids_are_never_reused_after_an_entity_leaves() {
        let mut tracker = IdentityTracker::default();
        tracker.assign(&[face_at(0.0, 0.0)], 0);
        let empty = tracker.assign(&[], 1);
        assert!(empty.is_empty());
        assert_eq!(tracker.current_count(), 0);

        let back = tracker.assign(&[face_at(0.0, 0.0)], 2);
        assert_eq!(ids(&back), vec![2]);
        assert_eq!(tracker.minted(), 2);
    }

    #[test]
    fn dominant_emotion_comes_from_expression_scores() {
        let mut attrs = FaceAttributes::default();
        attrs.expressions.insert("happy".into(), 0.8);
        attrs.expressions.insert("surprised".into(), 0.1);
        attrs.gender = Some("female".into());
        attrs.age = Some(34.0);
        let raw = face_at(0.0, 0.0).with_detail(DetectionDetail::Face(attrs));

        let mut tracker = IdentityTracker::default();
        let face = tracker.assign(&[raw], 7).remove(0);
        assert_eq!(face.dominant_emotion, "happy");
        assert_eq!(face.event.label, "happy");
        assert_eq!(face.event.entity_id, Some(1));
        assert_eq!(face.gender.as_deref(), Some("female"));
        assert_eq!(face.event.age, Some(34.0));
        assert_eq!(face.event.gender.as_deref(), Some("female"));
    }
}
