use crate::models::{HandAttributes, HandObservation, Handedness, Landmark, RawDetection, TimestampMs};

// Hand landmark layout: 0 wrist, then four points per finger from the thumb out.
const WRIST: usize = 0;
const THUMB_IP: usize = 3;
const THUMB_TIP: usize = 4;
const FINGER_JOINTS: [(usize, usize); 4] = [(8, 6), (12, 10), (16, 14), (20, 18)];
const PALM: [usize; 4] = [0, 5, 9, 17];
const LANDMARK_COUNT: usize = 21;

/// Raised fingers from a 21-point hand skeleton; `None` for partial skeletons.
pub fn count_fingers(landmarks: &[Landmark]) -> Option<u8> {
    if landmarks.len() < LANDMARK_COUNT {
        return None;
    }

    // Image y grows downwards, so a raised fingertip has the smaller y.
    let mut raised = FINGER_JOINTS
        .iter()
        .filter(|(tip, pip)| landmarks[*tip].y < landmarks[*pip].y)
        .count() as u8;

    let palm_x = PALM.iter().map(|i| landmarks[*i].x).sum::<f32>() / PALM.len() as f32;
    let tip_spread = (landmarks[THUMB_TIP].x - palm_x).abs();
    let joint_spread = (landmarks[THUMB_IP].x - palm_x).abs();
    if tip_spread > joint_spread && landmarks[THUMB_TIP].y < landmarks[WRIST].y {
        raised += 1;
    }

    Some(raised)
}

pub fn gesture_name(finger_count: u8) -> String {
    match finger_count {
        0 => "Fist".to_string(),
        1 => "Pointing".to_string(),
        2 => "Peace".to_string(),
        3 => "OK Sign".to_string(),
        4 => "Rock".to_string(),
        5 => "Open Hand".to_string(),
        n => format!("{n} Fingers"),
    }
}

/// Builds the observation for one detected hand. Adapters that report an
/// explicit finger count win over the landmark heuristic.
pub fn observe_hand(raw: &RawDetection, timestamp: TimestampMs) -> HandObservation {
    let (handedness, landmarks, explicit) = match raw.hand_attributes() {
        Some(HandAttributes {
            handedness,
            landmarks,
            finger_count,
        }) => (*handedness, landmarks.clone(), *finger_count),
        None => (handedness_from_label(&raw.label), Vec::new(), None),
    };

    let finger_count = explicit
        .or_else(|| count_fingers(&landmarks))
        .unwrap_or(0);

    HandObservation {
        handedness,
        landmarks,
        gesture: gesture_name(finger_count),
        finger_count,
        timestamp,
    }
}

fn handedness_from_label(label: &str) -> Handedness {
    if label.eq_ignore_ascii_case("left") {
        Handedness::Left
    } else {
        Handedness::Right
    }
}
