//! Camera change detection.

use ember_math::Frustum;

/// Remembers the frustum of the previous frame and reports whether the
/// camera moved since.
///
/// Comparison is exact: any numeric difference in the position or basis
/// vectors counts as movement and invalidates the accumulated image. No
/// tolerance is applied, so a camera at rest must hand in bit-identical
/// frustums (see `ember_math::OrbitCamera::frustum`).
#[derive(Debug, Default)]
pub struct CameraTracker {
    snapshot: Option<Frustum>,
}

impl CameraTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `frustum` against the stored snapshot, update the snapshot,
    /// and return whether anything differed. The very first poll counts as
    /// a change so the backend receives an initial camera.
    pub fn poll(&mut self, frustum: Frustum) -> bool {
        let changed = self.snapshot != Some(frustum);
        self.snapshot = Some(frustum);
        changed
    }
}
