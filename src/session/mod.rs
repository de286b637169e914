pub mod controller;
pub mod state;

pub use controller::{AdapterReadiness, ModalityStatus, SessionController, SessionSnapshot};
pub use state::{SessionState, SessionStatus, TickCounters};
