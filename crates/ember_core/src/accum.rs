//! Iteration counter and frame-limit policy.

/// Tracks how many samples have been accumulated for the current view.
///
/// The counter is zero-based and monotonically non-decreasing between
/// restarts. A nonzero `frame_limit` caps the accumulation: once reached,
/// [`Accumulation::should_advance`] stays false until the next restart,
/// which is the termination condition batch and benchmark runs wait for.
#[derive(Debug, Clone)]
pub struct Accumulation {
    iteration: u32,
    frame_limit: u32,
}

impl Accumulation {
    /// Create a fresh accumulation. `frame_limit == 0` renders forever.
    pub fn new(frame_limit: u32) -> Self {
        Self {
            iteration: 0,
            frame_limit,
        }
    }

    /// Number of samples accumulated so far for the current view.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn frame_limit(&self) -> u32 {
        self.frame_limit
    }

    pub fn set_frame_limit(&mut self, frame_limit: u32) {
        self.frame_limit = frame_limit;
    }

    /// Discard the accumulated view; the next iteration is 0 again.
    pub fn restart(&mut self) {
        self.iteration = 0;
    }

    /// Whether another iteration should be submitted this frame.
    pub fn should_advance(&self) -> bool {
        self.frame_limit == 0 || self.iteration < self.frame_limit
    }

    /// Record a successfully submitted iteration.
    ///
    /// Called only after the backend accepted the work; a failed submission
    /// leaves the counter unchanged so the same index is retried next frame.
    pub fn advance(&mut self) {
        debug_assert!(self.should_advance());
        self.iteration += 1;
    }

    /// True once a nonzero frame limit has been reached.
    pub fn at_limit(&self) -> bool {
        self.frame_limit != 0 && self.iteration >= self.frame_limit
    }
}
