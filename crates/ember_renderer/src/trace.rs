//! Path integrator.
//!
//! One call to [`sample_pixel`] produces one noisy radiance estimate; the
//! scheduler averages many of them per pixel across iterations.

use rand::Rng;

use crate::{Frustum, Material, Ray, Scene, Vec3};

/// Compute the radiance seen by a ray.
///
/// Traces the ray through the scene, bouncing off surfaces and
/// accumulating attenuation until a light or the environment is reached.
pub fn ray_color(ray: &Ray, scene: &Scene, depth: u32, rng: &mut impl Rng) -> Vec3 {
    // Exceeded max depth: no light gathered
    if depth == 0 {
        return Vec3::ZERO;
    }

    let Some(hit) = scene.hit(ray, 0.001, f32::INFINITY) else {
        if scene.sky {
            return sky_gradient(ray);
        }
        return Vec3::ZERO;
    };

    match hit.material {
        Material::Lambertian { albedo } => {
            let mut direction = hit.normal + random_unit_vector(rng);
            // Degenerate scatter direction collapses to the normal
            if direction.length_squared() < 1.0e-12 {
                direction = hit.normal;
            }
            let scattered = Ray::new(hit.point, direction);
            albedo * ray_color(&scattered, scene, depth - 1, rng)
        }
        Material::Metal { albedo, fuzz } => {
            let reflected =
                reflect(ray.direction.normalize(), hit.normal) + random_unit_vector(rng) * fuzz;
            if reflected.dot(hit.normal) <= 0.0 {
                // Fuzz pushed the ray below the surface: absorbed
                return Vec3::ZERO;
            }
            let scattered = Ray::new(hit.point, reflected);
            albedo * ray_color(&scattered, scene, depth - 1, rng)
        }
        Material::Emissive { radiance } => radiance,
    }
}

/// Environment light: vertical white-to-blue gradient.
pub fn sky_gradient(ray: &Ray) -> Vec3 {
    let unit_direction = ray.direction.normalize();
    let a = 0.5 * (unit_direction.y + 1.0);
    let white = Vec3::new(1.0, 1.0, 1.0);
    let blue = Vec3::new(0.5, 0.7, 1.0);
    white * (1.0 - a) + blue * a
}

/// Trace one jittered primary ray through pixel (x, y).
pub fn sample_pixel(
    frustum: &Frustum,
    scene: &Scene,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    max_depth: u32,
    rng: &mut impl Rng,
) -> Vec3 {
    // Jitter inside the pixel footprint for anti-aliasing
    let jx = rng.gen::<f32>();
    let jy = rng.gen::<f32>();
    let ndx = 2.0 * (x as f32 + jx) / width as f32 - 1.0;
    let ndy = 1.0 - 2.0 * (y as f32 + jy) / height as f32;

    let ray = Ray::new(frustum.position, frustum.ray_direction(ndx, ndy));
    ray_color(&ray, scene, max_depth, rng)
}

fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - n * (2.0 * v.dot(n))
}

/// Uniform direction on the unit sphere, by rejection sampling.
fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    loop {
        let p = Vec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let len_sq = p.length_squared();
        if len_sq > 1.0e-12 && len_sq <= 1.0 {
            return p / len_sq.sqrt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_sky_gradient_vertical() {
        // Ray pointing up should be more blue than a ray pointing down
        let up = sky_gradient(&Ray::new(Vec3::ZERO, Vec3::Y));
        let down = sky_gradient(&Ray::new(Vec3::ZERO, -Vec3::Y));
        assert!(up.x < down.x);
    }

    #[test]
    fn test_miss_with_sky_disabled_is_black() {
        let scene = Scene::new(Vec::new(), false);
        let mut rng = SmallRng::seed_from_u64(1);
        let color = ray_color(&Ray::new(Vec3::ZERO, Vec3::Y), &scene, 8, &mut rng);
        assert_eq!(color, Vec3::ZERO);
    }

    #[test]
    fn test_emissive_returns_radiance() {
        let radiance = Vec3::new(2.0, 3.0, 4.0);
        let scene = Scene::new(
            vec![crate::Sphere::new(
                Vec3::new(0.0, 0.0, -2.0),
                0.5,
                Material::Emissive { radiance },
            )],
            false,
        );
        let mut rng = SmallRng::seed_from_u64(1);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(ray_color(&ray, &scene, 8, &mut rng), radiance);
    }

    #[test]
    fn test_depth_zero_terminates() {
        let scene = Scene::demo();
        let mut rng = SmallRng::seed_from_u64(1);
        let ray = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(ray_color(&ray, &scene, 0, &mut rng), Vec3::ZERO);
    }

    #[test]
    fn test_sample_pixel_deterministic_per_seed() {
        let scene = Scene::demo();
        let frustum = Frustum::new(
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::X,
            Vec3::Y,
            Vec3::new(0.0, 0.0, -3.0),
        );

        let mut rng_a = SmallRng::seed_from_u64(7);
        let mut rng_b = SmallRng::seed_from_u64(7);
        let a = sample_pixel(&frustum, &scene, 3, 4, 16, 16, 8, &mut rng_a);
        let b = sample_pixel(&frustum, &scene, 3, 4, 16, 16, 8, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_unit_vector_normalized() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..100 {
            let v = random_unit_vector(&mut rng);
            assert!((v.length() - 1.0).abs() < 1.0e-4);
        }
    }
}
