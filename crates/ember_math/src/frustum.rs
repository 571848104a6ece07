use crate::Vec3;

/// Pinhole view frustum: camera position plus the three basis vectors that
/// span the image plane.
///
/// `w` points from the eye to the center of the image plane, `u` spans half
/// the plane horizontally and `v` vertically, so a ray through normalized
/// device coordinates (ndx, ndy) in [-1, 1] travels along
/// `ndx * u + ndy * v + w`.
///
/// Equality is exact. The camera tracker compares successive frustums
/// bitwise to decide whether accumulation must restart, so no epsilon is
/// applied on purpose: a camera that did not move produces identical floats.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frustum {
    pub position: Vec3,
    pub u: Vec3,
    pub v: Vec3,
    pub w: Vec3,
}

impl Frustum {
    pub fn new(position: Vec3, u: Vec3, v: Vec3, w: Vec3) -> Self {
        Self { position, u, v, w }
    }

    /// Direction (unnormalized) of the primary ray through normalized
    /// device coordinates in [-1, 1].
    #[inline]
    pub fn ray_direction(&self, ndx: f32, ndy: f32) -> Vec3 {
        self.u * ndx + self.v * ndy + self.w
    }
}
