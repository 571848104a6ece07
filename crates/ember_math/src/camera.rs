use crate::{Frustum, Vec3};

/// Orbit camera for interactive viewing.
///
/// The camera orbits a target point at a fixed distance, parameterized by
/// yaw and pitch. `frustum()` derives the pinhole basis the path tracer
/// consumes; the same derivation runs every frame, so an unmoved camera
/// yields a bit-identical frustum and the accumulation keeps converging.
#[derive(Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
}

/// Keep pitch away from the poles so the view basis stays well defined.
const PITCH_LIMIT: f32 = 1.5;

impl OrbitCamera {
    /// Create a new camera orbiting `target` from `distance` away.
    pub fn new(target: Vec3, distance: f32, aspect: f32) -> Self {
        Self {
            target,
            distance: distance.max(1.0e-3),
            yaw: 0.0,
            pitch: 0.0,
            up: Vec3::Y,
            fov_y: 45.0_f32.to_radians(),
            aspect,
        }
    }

    /// Eye position derived from target, distance and angles.
    pub fn position(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        self.target + Vec3::new(cp * sy, sp, cp * cy) * self.distance
    }

    /// Rotate around the target.
    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Move the target (and with it the eye) in view-relative directions.
    pub fn pan(&mut self, right: f32, up: f32, forward: f32, delta_time: f32) {
        let position = self.position();
        let view = (self.target - position).normalize();
        let right_dir = view.cross(self.up).normalize();
        let up_dir = right_dir.cross(view);

        let speed = self.distance * delta_time;
        self.target += (right_dir * right + up_dir * up + view * forward) * speed;
    }

    /// Move toward or away from the target.
    pub fn dolly(&mut self, amount: f32) {
        self.distance = (self.distance * (1.0 + amount * 0.001)).max(1.0e-3);
    }

    /// Update aspect ratio (e.g., on window resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Derive the pinhole frustum for the current view.
    ///
    /// `w` spans eye to image-plane center, `u`/`v` span half the plane so
    /// that normalized device coordinates in [-1, 1] cover the full image.
    pub fn frustum(&self) -> Frustum {
        let position = self.position();
        let w = self.target - position;
        let w_len = w.length();
        let half_height = w_len * (0.5 * self.fov_y).tan();
        let half_width = half_height * self.aspect;

        let u = w.cross(self.up).normalize() * half_width;
        let v = u.cross(w).normalize() * half_height;

        Frustum::new(position, u, v, w)
    }
}
