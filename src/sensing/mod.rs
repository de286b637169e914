pub mod adapter;
pub mod controller;
pub mod loop_worker;

pub use adapter::{
    CountingFrameSource, DetectionAdapter, FrameHandle, FrameSource, Recording, ReplayAdapter,
};
pub use controller::SensingController;
pub use loop_worker::{PollingLoop, TickMessage};
