//! Presentation throttle.
//!
//! Copying the accumulated buffer to the display texture (and re-running
//! any post-process stage) is comparatively expensive, so steady-state
//! updates are held to one per interval. Right after a restart the image is
//! changing fast and every frame presents for a short warmup window, which
//! keeps the view responsive instead of waiting a full interval for the
//! first update.

/// Tunable throttle parameters.
#[derive(Debug, Clone, Copy)]
pub struct PresentPolicy {
    /// Seconds after a restart during which every frame presents.
    pub warmup: f64,
    /// Steady-state seconds between presentations.
    pub interval: f64,
}

impl Default for PresentPolicy {
    fn default() -> Self {
        Self {
            warmup: 0.5,
            interval: 1.0,
        }
    }
}

/// Decides, once per frame, whether the accumulated image is copied to the
/// display texture.
#[derive(Debug, Clone)]
pub struct Presentation {
    policy: PresentPolicy,
    continuous: bool,
    pending: bool,
    deadline: f64,
}

impl Presentation {
    pub fn new(policy: PresentPolicy) -> Self {
        Self {
            policy,
            continuous: false,
            pending: true,
            deadline: policy.interval,
        }
    }

    /// Force a presentation on the next frame and reset the deadline one
    /// interval ahead. Called on every accumulation restart.
    pub fn rearm(&mut self) {
        self.pending = true;
        self.deadline = self.policy.interval;
    }

    /// Keep the presentation armed, e.g. after a failed texture upload.
    pub fn defer(&mut self) {
        self.pending = true;
    }

    /// When continuous, throttling is bypassed and every frame presents.
    pub fn set_continuous(&mut self, continuous: bool) {
        self.continuous = continuous;
    }

    pub fn continuous(&self) -> bool {
        self.continuous
    }

    /// Evaluate the throttle for the current frame.
    ///
    /// `elapsed` is measured from the last restart. Precedence:
    /// 1. inside the warmup window: present, deadline pinned one interval out;
    /// 2. deadline reached: present, deadline moves to the next whole-interval
    ///    boundary strictly ahead of `elapsed`;
    /// 3. otherwise: present only in continuous mode.
    pub fn should_present_now(&mut self, elapsed: f64) -> bool {
        if elapsed < self.policy.warmup {
            self.deadline = self.policy.interval;
            self.pending = true;
        } else if self.deadline <= elapsed {
            let mut next = (elapsed / self.policy.interval).ceil() * self.policy.interval;
            if next <= elapsed {
                next += self.policy.interval;
            }
            self.deadline = next;
            self.pending = true;
        }

        let present = self.pending || self.continuous;
        if present {
            self.pending = false;
        }
        present
    }

    /// Restart-relative time of the next forced presentation.
    pub fn deadline(&self) -> f64 {
        self.deadline
    }
}
