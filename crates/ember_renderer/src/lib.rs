//! Ember CPU path tracer.
//!
//! A Monte Carlo path tracer that implements the scheduler's
//! [`ember_core::RenderBackend`] capability: every submitted iteration
//! traces one sample per pixel and blends it into the shared
//! running-average framebuffer. Deliberately small — the scene is a
//! handful of spheres — since its job is to feed the progressive
//! accumulation loop, not to be a production renderer.

mod post;
mod scene;
mod screenshot;
mod trace;
mod tracer;

pub use post::DenoiseFilter;
pub use scene::{Material, Scene, Sphere};
pub use screenshot::save_png;
pub use tracer::CpuTracer;

/// Re-export common math types
pub use ember_math::{Frustum, Ray, Vec3};
