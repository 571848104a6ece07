//! Render backend: progressive accumulation into the shared framebuffer.

use ember_core::{FrameBuffer, FrameError, RenderBackend};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::trace::sample_pixel;
use crate::{Frustum, Scene, Vec3};

/// CPU path tracer implementing the scheduler's render capability.
///
/// `submit_iteration(n)` traces one sample per pixel and blends it into
/// the running average with weight `1 / (n + 1)`; iteration 0 therefore
/// overwrites the buffer, which is what makes a restart take effect
/// without an explicit clear.
pub struct CpuTracer {
    scene: Scene,
    frustum: Frustum,
    framebuffer: FrameBuffer,
    max_depth: u32,
}

impl CpuTracer {
    pub fn new(scene: Scene, width: u32, height: u32) -> Self {
        Self {
            scene,
            // Placeholder view; the driver pushes the real camera before
            // the first iteration.
            frustum: Frustum::new(Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::new(0.0, 0.0, -1.0)),
            framebuffer: FrameBuffer::new(width, height),
            max_depth: 16,
        }
    }

    /// Render-time scene parameters, for GUI edits. Any mutation
    /// invalidates the accumulated image; the caller must restart the
    /// driver afterwards.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }
}

impl RenderBackend for CpuTracer {
    fn set_camera(&mut self, frustum: &Frustum) {
        self.frustum = *frustum;
    }

    fn submit_iteration(&mut self, iteration: u32) -> Result<(), FrameError> {
        let width = self.framebuffer.width();
        let height = self.framebuffer.height();
        if width == 0 || height == 0 {
            return Err(FrameError::Submit("zero-sized framebuffer".into()));
        }

        let scene = &self.scene;
        let frustum = &self.frustum;
        let max_depth = self.max_depth;
        let blend = 1.0 / (iteration + 1) as f32;
        let row_stride = (width * 4) as usize;

        self.framebuffer
            .pixels_mut()
            .par_chunks_exact_mut(row_stride)
            .enumerate()
            .for_each(|(y, row)| {
                // Seeded per (iteration, row) so a rerun of the same
                // iteration reproduces the same image.
                let mut rng = SmallRng::seed_from_u64((u64::from(iteration) << 32) | y as u64);
                for x in 0..width {
                    let sample = sample_pixel(
                        frustum, scene, x, y as u32, width, height, max_depth, &mut rng,
                    );
                    let px = (x * 4) as usize;
                    row[px] += (sample.x - row[px]) * blend;
                    row[px + 1] += (sample.y - row[px + 1]) * blend;
                    row[px + 2] += (sample.z - row[px + 2]) * blend;
                    row[px + 3] = 1.0;
                }
            });
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.framebuffer.resize(width, height);
    }

    fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scene whose every sample is the same constant: camera enclosed by
    /// an emissive sphere.
    fn constant_scene(radiance: Vec3) -> Scene {
        Scene::new(
            vec![crate::Sphere::new(
                Vec3::ZERO,
                10.0,
                crate::Material::Emissive { radiance },
            )],
            false,
        )
    }

    #[test]
    fn test_constant_scene_converges_exactly() {
        let radiance = Vec3::new(0.25, 0.5, 0.75);
        let mut tracer = CpuTracer::new(constant_scene(radiance), 4, 4);

        for n in 0..5 {
            tracer.submit_iteration(n).unwrap();
        }
        for px in tracer.framebuffer().pixels().chunks_exact(4) {
            assert!((px[0] - radiance.x).abs() < 1.0e-5);
            assert!((px[1] - radiance.y).abs() < 1.0e-5);
            assert!((px[2] - radiance.z).abs() < 1.0e-5);
            assert_eq!(px[3], 1.0);
        }
    }

    #[test]
    fn test_iteration_zero_overwrites_previous_view() {
        let mut tracer = CpuTracer::new(constant_scene(Vec3::splat(1.0)), 4, 4);
        for n in 0..3 {
            tracer.submit_iteration(n).unwrap();
        }

        // Swap to a black view (sky off, no geometry) and restart at 0.
        *tracer.scene_mut() = Scene::new(Vec::new(), false);
        tracer.submit_iteration(0).unwrap();

        for px in tracer.framebuffer().pixels().chunks_exact(4) {
            assert_eq!(px[0], 0.0);
            assert_eq!(px[1], 0.0);
            assert_eq!(px[2], 0.0);
        }
    }

    #[test]
    fn test_same_iteration_is_reproducible() {
        let mut a = CpuTracer::new(Scene::demo(), 8, 8);
        let mut b = CpuTracer::new(Scene::demo(), 8, 8);
        let frustum = Frustum::new(
            Vec3::new(0.0, 0.5, 3.0),
            Vec3::X,
            Vec3::Y,
            Vec3::new(0.0, -0.5, -3.0),
        );
        a.set_camera(&frustum);
        b.set_camera(&frustum);

        a.submit_iteration(0).unwrap();
        b.submit_iteration(0).unwrap();
        assert_eq!(a.framebuffer().pixels(), b.framebuffer().pixels());
    }

    #[test]
    fn test_resize_reallocates() {
        let mut tracer = CpuTracer::new(Scene::demo(), 8, 8);
        tracer.submit_iteration(0).unwrap();
        tracer.resize(16, 4);
        assert_eq!(tracer.framebuffer().width(), 16);
        assert_eq!(tracer.framebuffer().height(), 4);
        assert_eq!(tracer.framebuffer().pixels().len(), 16 * 4 * 4);
    }
}
