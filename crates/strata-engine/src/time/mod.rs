//! Frame timing.
//!
//! One [`FrameClock`] per window; call `tick()` once per presented frame and
//! hand the resulting [`FrameTime`] to `SceneDriver::on_frame`.

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
