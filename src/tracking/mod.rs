pub mod gesture;
pub mod identity;
pub mod interaction;

pub use gesture::{count_fingers, gesture_name, observe_hand};
pub use identity::IdentityTracker;
pub use interaction::{InteractionDetector, InteractionEvent, InteractionKind};
