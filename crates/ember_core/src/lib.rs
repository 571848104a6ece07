//! Progressive accumulation scheduling.
//!
//! A path-traced image converges by averaging an unbounded stream of noisy
//! samples, while the display only needs a fresh copy of that average every
//! so often. This crate owns the per-frame decisions tying the two together:
//!
//! - whether the accumulation advances this frame (frame-limit policy),
//! - whether the accumulated buffer is pushed to the display texture
//!   (throttled to roughly once per interval in steady state, every frame
//!   right after a restart),
//! - when accumulation restarts (camera movement, resize, parameter edits).
//!
//! The driver consumes abstract [`RenderBackend`] and [`Presenter`]
//! capabilities and has no GPU or windowing dependencies of its own.

mod accum;
mod clock;
mod driver;
mod framebuffer;
mod present;
mod tracker;

pub use accum::Accumulation;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use driver::{FrameDriver, FrameError, FrameReport, PostProcess, Presenter, RenderBackend};
pub use framebuffer::FrameBuffer;
pub use present::{PresentPolicy, Presentation};
pub use tracker::CameraTracker;
