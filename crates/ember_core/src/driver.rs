//! Per-frame orchestration.
//!
//! The frame driver runs once per window refresh on the main thread. Each
//! invocation polls the camera, optionally submits one accumulation
//! iteration, and decides whether the accumulated image is presented. No
//! other context touches the scheduling state, so nothing here locks.

use ember_math::Frustum;
use thiserror::Error;

use crate::{
    Accumulation, CameraTracker, Clock, FrameBuffer, MonotonicClock, PresentPolicy, Presentation,
};

/// Capability-seam failures. All are local to a single frame; none are
/// fatal to the process from the driver's perspective.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("render submission failed: {0}")]
    Submit(String),
    #[error("presentation failed: {0}")]
    Present(String),
    #[error("post-process failed: {0}")]
    PostProcess(String),
}

/// The rendering capability: accepts one unit of work per frame and exposes
/// the accumulated image for read-back.
pub trait RenderBackend {
    /// Push a new camera basis, used by all subsequent iterations.
    fn set_camera(&mut self, frustum: &Frustum);

    /// Trace iteration `iteration` (zero-based) and blend it into the
    /// framebuffer. On error the driver leaves the iteration counter
    /// untouched and retries the same index next frame.
    fn submit_iteration(&mut self, iteration: u32) -> Result<(), FrameError>;

    /// Reallocate the accumulation buffer. The driver guarantees non-zero
    /// dimensions and that no submission is in flight.
    fn resize(&mut self, width: u32, height: u32);

    /// Read back the accumulated image.
    fn framebuffer(&self) -> &FrameBuffer;
}

/// The display capability: copies an image to the display texture.
pub trait Presenter {
    fn present(&mut self, frame: &FrameBuffer) -> Result<(), FrameError>;
}

/// Optional filter stage applied to the accumulated image immediately
/// before each presentation.
pub trait PostProcess {
    fn run(&mut self, frame: &FrameBuffer) -> Result<&FrameBuffer, FrameError>;
}

/// What one driver invocation did, for the surrounding event loop.
#[derive(Debug, Clone, Copy)]
pub struct FrameReport {
    /// A new image was pushed to the display; the caller should swap.
    pub presented: bool,
    /// Accumulation restarted this frame (camera moved).
    pub restarted: bool,
    /// Iteration count after this frame; with a restart-free run this is
    /// also the number of samples in the displayed image.
    pub iteration: u32,
    /// A nonzero frame limit has been reached; batch runs can stop.
    pub completed: bool,
}

/// Owns the scheduling state and ties tracker, accumulation and throttle
/// together, once per window refresh.
pub struct FrameDriver {
    accum: Accumulation,
    presentation: Presentation,
    tracker: CameraTracker,
    clock: Box<dyn Clock>,
    origin: f64,
    width: u32,
    height: u32,
}

impl FrameDriver {
    /// Driver for an output of `width` x `height` pixels, rendering
    /// `frame_limit` samples per view (0 = unbounded).
    pub fn new(width: u32, height: u32, frame_limit: u32) -> Self {
        Self::with_clock(width, height, frame_limit, Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(width: u32, height: u32, frame_limit: u32, clock: Box<dyn Clock>) -> Self {
        let origin = clock.now();
        Self {
            accum: Accumulation::new(frame_limit),
            presentation: Presentation::new(PresentPolicy::default()),
            tracker: CameraTracker::new(),
            clock,
            origin,
            width,
            height,
        }
    }

    pub fn set_present_policy(&mut self, policy: PresentPolicy) {
        self.presentation = Presentation::new(policy);
    }

    /// Run one frame.
    ///
    /// 1. poll the camera; on movement push the frustum to the backend and
    ///    restart accumulation;
    /// 2. submit one iteration unless the frame limit has been reached;
    /// 3. evaluate the presentation throttle against the restart-relative
    ///    elapsed time; on a hit run the post-process stage and present.
    pub fn frame(
        &mut self,
        frustum: Frustum,
        backend: &mut dyn RenderBackend,
        presenter: &mut dyn Presenter,
        post: Option<&mut dyn PostProcess>,
    ) -> Result<FrameReport, FrameError> {
        let restarted = self.tracker.poll(frustum);
        if restarted {
            backend.set_camera(&frustum);
            self.restart();
        }

        if self.accum.should_advance() {
            // Index is advanced only on success so a failed frame retries.
            backend.submit_iteration(self.accum.iteration())?;
            self.accum.advance();
        }

        let elapsed = self.elapsed();
        let presented = self.presentation.should_present_now(elapsed);
        if presented {
            let upload = match post {
                Some(stage) => stage
                    .run(backend.framebuffer())
                    .and_then(|image| presenter.present(image)),
                None => presenter.present(backend.framebuffer()),
            };
            if let Err(err) = upload {
                // The display still shows a stale image; retry next frame.
                self.presentation.defer();
                return Err(err);
            }
            if elapsed > 0.0 {
                log::debug!(
                    "{} samples in {:.2}s = {:.1} samples/s",
                    self.accum.iteration(),
                    elapsed,
                    f64::from(self.accum.iteration()) / elapsed
                );
            }
        }

        Ok(FrameReport {
            presented,
            restarted,
            iteration: self.accum.iteration(),
            completed: self.accum.at_limit(),
        })
    }

    /// Discard the accumulated image and start over: counter to zero,
    /// presentation re-armed, elapsed-time origin reset.
    pub fn restart(&mut self) {
        self.accum.restart();
        self.presentation.rearm();
        self.origin = self.clock.now();
    }

    /// A scene or material parameter used at render time was edited; the
    /// accumulated image no longer matches and must be discarded.
    pub fn invalidate(&mut self) {
        self.restart();
    }

    /// Handle an output resize. Degenerate (zero-area) and unchanged sizes
    /// are ignored entirely; a real change reallocates the backend buffer
    /// before accumulation continues, then restarts.
    pub fn resize(&mut self, width: u32, height: u32, backend: &mut dyn RenderBackend) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        if width == self.width && height == self.height {
            return false;
        }

        self.width = width;
        self.height = height;
        backend.resize(width, height);
        self.restart();
        log::info!("accumulation buffer resized to {width}x{height}");
        true
    }

    /// Change the samples-per-view limit (0 = unbounded). If more samples
    /// have already accumulated than the new limit allows, the pass starts
    /// over.
    pub fn set_frame_limit(&mut self, frame_limit: u32) {
        let over_run = frame_limit != 0 && frame_limit < self.accum.iteration();
        self.accum.set_frame_limit(frame_limit);
        if over_run {
            self.restart();
        }
    }

    pub fn frame_limit(&self) -> u32 {
        self.accum.frame_limit()
    }

    pub fn iteration(&self) -> u32 {
        self.accum.iteration()
    }

    /// Bypass throttling and refresh the display every frame.
    pub fn set_continuous_present(&mut self, continuous: bool) {
        self.presentation.set_continuous(continuous);
    }

    pub fn continuous_present(&self) -> bool {
        self.presentation.continuous()
    }

    /// Seconds since the last restart.
    pub fn elapsed(&self) -> f64 {
        self.clock.now() - self.origin
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use ember_math::Vec3;

    /// Backend that records calls instead of tracing anything.
    struct MockBackend {
        framebuffer: FrameBuffer,
        submitted: Vec<u32>,
        camera_pushes: u32,
        resizes: Vec<(u32, u32)>,
        fail_next_submit: bool,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                framebuffer: FrameBuffer::new(8, 8),
                submitted: Vec::new(),
                camera_pushes: 0,
                resizes: Vec::new(),
                fail_next_submit: false,
            }
        }
    }

    impl RenderBackend for MockBackend {
        fn set_camera(&mut self, _frustum: &Frustum) {
            self.camera_pushes += 1;
        }

        fn submit_iteration(&mut self, iteration: u32) -> Result<(), FrameError> {
            if self.fail_next_submit {
                self.fail_next_submit = false;
                return Err(FrameError::Submit("mock backend failure".into()));
            }
            self.submitted.push(iteration);
            Ok(())
        }

        fn resize(&mut self, width: u32, height: u32) {
            self.resizes.push((width, height));
            self.framebuffer.resize(width, height);
        }

        fn framebuffer(&self) -> &FrameBuffer {
            &self.framebuffer
        }
    }

    #[derive(Default)]
    struct MockPresenter {
        presents: u32,
    }

    impl Presenter for MockPresenter {
        fn present(&mut self, _frame: &FrameBuffer) -> Result<(), FrameError> {
            self.presents += 1;
            Ok(())
        }
    }

    fn frustum() -> Frustum {
        Frustum::new(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(0.0, 0.0, -1.0))
    }

    fn driver(frame_limit: u32) -> (FrameDriver, ManualClock) {
        let clock = ManualClock::new();
        let driver = FrameDriver::with_clock(8, 8, frame_limit, Box::new(clock.clone()));
        (driver, clock)
    }

    #[test]
    fn test_unbounded_iteration_strictly_increases() {
        let (mut driver, clock) = driver(0);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();

        for expected in 1..=20 {
            clock.advance(0.016);
            let report = driver
                .frame(frustum(), &mut backend, &mut presenter, None)
                .unwrap();
            assert_eq!(report.iteration, expected);
        }
        assert_eq!(backend.submitted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_camera_change_restarts_and_pushes_frustum() {
        let (mut driver, clock) = driver(0);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();

        driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap();
        clock.advance(3.0);
        driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap();
        assert_eq!(driver.iteration(), 2);
        assert_eq!(backend.camera_pushes, 1); // initial camera only

        // Differ only in w.z: must be detected, restart, and re-push.
        let mut moved = frustum();
        moved.w.z += 1.0e-6;
        let report = driver
            .frame(moved, &mut backend, &mut presenter, None)
            .unwrap();
        assert!(report.restarted);
        assert!(report.presented);
        assert_eq!(backend.camera_pushes, 2);
        assert_eq!(report.iteration, 1); // counter reset, then one new sample
        assert_eq!(*backend.submitted.last().unwrap(), 0);
    }

    #[test]
    fn test_frame_limit_stops_then_restart_rearms() {
        let (mut driver, clock) = driver(10);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();

        let mut completed_at = None;
        for n in 0..25 {
            clock.advance(0.016);
            let report = driver
                .frame(frustum(), &mut backend, &mut presenter, None)
                .unwrap();
            if report.completed && completed_at.is_none() {
                completed_at = Some(n);
            }
        }
        // Exactly 10 submissions, tagged 0..10, then idle at the limit.
        assert_eq!(backend.submitted, (0..10).collect::<Vec<_>>());
        assert_eq!(completed_at, Some(9));
        assert_eq!(driver.iteration(), 10);

        driver.restart();
        assert_eq!(driver.iteration(), 0);
        let report = driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap();
        assert!(!report.completed);
        assert_eq!(report.iteration, 1);
        assert_eq!(*backend.submitted.last().unwrap(), 0);
    }

    #[test]
    fn test_presentation_cadence_with_throttle() {
        let (mut driver, clock) = driver(0);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();

        // First frame seeds the tracker, restarts and presents.
        let report = driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap();
        assert!(report.restarted);
        assert!(report.presented);

        // Step by 1/16 s so elapsed time stays exact in binary.
        let mut presents = 0;
        for _ in 0..88 {
            clock.advance(0.0625); // elapsed 0.0625 .. 5.5
            let report = driver
                .frame(frustum(), &mut backend, &mut presenter, None)
                .unwrap();
            if report.presented {
                presents += 1;
            }
        }
        // Warmup frames at 0.0625 .. 0.4375 (7 of them), then one present
        // per whole second at 1.0 .. 5.0.
        assert_eq!(presents, 7 + 5);
    }

    #[test]
    fn test_continuous_present_bypasses_throttle() {
        let (mut driver, clock) = driver(0);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();

        // Seed the tracker and move past the warmup window.
        driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap();
        clock.set(0.75);
        let report = driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap();
        assert!(!report.presented); // throttled

        driver.set_continuous_present(true);
        for _ in 0..10 {
            clock.advance(0.01);
            let report = driver
                .frame(frustum(), &mut backend, &mut presenter, None)
                .unwrap();
            assert!(report.presented);
        }
    }

    #[test]
    fn test_submit_failure_leaves_iteration_unchanged() {
        let (mut driver, clock) = driver(0);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();

        driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap();
        assert_eq!(driver.iteration(), 1);

        clock.advance(0.016);
        backend.fail_next_submit = true;
        let err = driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap_err();
        assert!(matches!(err, FrameError::Submit(_)));
        assert_eq!(driver.iteration(), 1);

        // Next frame retries the same index.
        clock.advance(0.016);
        driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap();
        assert_eq!(backend.submitted, vec![0, 1]);
    }

    #[test]
    fn test_degenerate_resize_is_ignored() {
        let (mut driver, clock) = driver(0);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();

        for _ in 0..3 {
            clock.advance(0.016);
            driver
                .frame(frustum(), &mut backend, &mut presenter, None)
                .unwrap();
        }

        assert!(!driver.resize(0, 600, &mut backend));
        assert!(!driver.resize(800, 0, &mut backend));
        assert!(backend.resizes.is_empty());
        assert_eq!(driver.iteration(), 3); // no restart happened

        // Unchanged size is also a no-op.
        assert!(!driver.resize(8, 8, &mut backend));
        assert_eq!(driver.iteration(), 3);

        // A real change reallocates and restarts.
        assert!(driver.resize(16, 16, &mut backend));
        assert_eq!(backend.resizes, vec![(16, 16)]);
        assert_eq!(driver.iteration(), 0);
    }

    #[test]
    fn test_frame_limit_edit_below_progress_restarts() {
        let (mut driver, clock) = driver(0);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();

        for _ in 0..30 {
            clock.advance(0.016);
            driver
                .frame(frustum(), &mut backend, &mut presenter, None)
                .unwrap();
        }
        assert_eq!(driver.iteration(), 30);

        // Raising the limit above current progress keeps the accumulation.
        driver.set_frame_limit(50);
        assert_eq!(driver.iteration(), 30);

        // Dropping it below starts the pass over.
        driver.set_frame_limit(10);
        assert_eq!(driver.iteration(), 0);
        assert_eq!(driver.frame_limit(), 10);
    }

    #[test]
    fn test_invalidate_restarts_accumulation() {
        let (mut driver, clock) = driver(0);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();

        clock.advance(2.0);
        for _ in 0..5 {
            driver
                .frame(frustum(), &mut backend, &mut presenter, None)
                .unwrap();
        }

        driver.invalidate();
        assert_eq!(driver.iteration(), 0);
        assert_eq!(driver.elapsed(), 0.0);

        // The next frame presents immediately, like any restart.
        let report = driver
            .frame(frustum(), &mut backend, &mut presenter, None)
            .unwrap();
        assert!(report.presented);
    }

    /// Post-process stage that counts invocations.
    struct CountingStage {
        output: FrameBuffer,
        runs: u32,
    }

    impl PostProcess for CountingStage {
        fn run(&mut self, frame: &FrameBuffer) -> Result<&FrameBuffer, FrameError> {
            self.runs += 1;
            self.output.resize(frame.width(), frame.height());
            Ok(&self.output)
        }
    }

    #[test]
    fn test_post_process_runs_only_on_present() {
        let (mut driver, clock) = driver(0);
        let mut backend = MockBackend::new();
        let mut presenter = MockPresenter::default();
        let mut stage = CountingStage {
            output: FrameBuffer::new(8, 8),
            runs: 0,
        };

        let mut presents = 0;
        for _ in 0..40 {
            clock.advance(0.05);
            let report = driver
                .frame(frustum(), &mut backend, &mut presenter, Some(&mut stage))
                .unwrap();
            if report.presented {
                presents += 1;
            }
        }
        assert_eq!(stage.runs, presents);
        assert_eq!(presenter.presents, presents);
    }
}
