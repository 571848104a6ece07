//! Minimal sphere scene.
//!
//! Scene description and BVH construction are out of scope here; a flat
//! list of spheres is enough geometry to give the accumulation something
//! noisy to converge on.

use crate::{Ray, Vec3};

/// Surface response of a sphere.
#[derive(Debug, Clone, Copy)]
pub enum Material {
    Lambertian { albedo: Vec3 },
    Metal { albedo: Vec3, fuzz: f32 },
    Emissive { radiance: Vec3 },
}

/// Sphere primitive.
#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
    pub material: Material,
}

/// Intersection record.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub t: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub front_face: bool,
    pub material: Material,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32, material: Material) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            material,
        }
    }

    fn hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<Hit> {
        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();

        // Nearest root within range
        let mut root = (h - sqrtd) / a;
        if root <= t_min || t_max <= root {
            root = (h + sqrtd) / a;
            if root <= t_min || t_max <= root {
                return None;
            }
        }

        let point = ray.at(root);
        let outward_normal = (point - self.center) / self.radius;
        let front_face = ray.direction.dot(outward_normal) < 0.0;
        Some(Hit {
            t: root,
            point,
            normal: if front_face {
                outward_normal
            } else {
                -outward_normal
            },
            front_face,
            material: self.material,
        })
    }
}

/// Flat scene plus the render-time parameters the GUI can edit. Editing
/// any of these invalidates the accumulated image; callers are expected to
/// restart the driver afterwards.
#[derive(Debug, Clone)]
pub struct Scene {
    pub spheres: Vec<Sphere>,
    /// Use the sky gradient as environment light; black environment when off.
    pub sky: bool,
}

impl Scene {
    pub fn new(spheres: Vec<Sphere>, sky: bool) -> Self {
        Self { spheres, sky }
    }

    /// The built-in demo scene: ground sphere, a diffuse and a metal ball,
    /// and a small emitter.
    pub fn demo() -> Self {
        let spheres = vec![
            Sphere::new(
                Vec3::new(0.0, -100.5, 0.0),
                100.0,
                Material::Lambertian {
                    albedo: Vec3::new(0.5, 0.5, 0.5),
                },
            ),
            Sphere::new(
                Vec3::new(-0.6, 0.0, 0.0),
                0.5,
                Material::Lambertian {
                    albedo: Vec3::new(0.7, 0.3, 0.3),
                },
            ),
            Sphere::new(
                Vec3::new(0.6, 0.0, 0.0),
                0.5,
                Material::Metal {
                    albedo: Vec3::new(0.8, 0.8, 0.9),
                    fuzz: 0.05,
                },
            ),
            Sphere::new(
                Vec3::new(0.0, 0.9, -0.4),
                0.25,
                Material::Emissive {
                    radiance: Vec3::new(4.0, 3.6, 3.2),
                },
            ),
        ];
        Self::new(spheres, true)
    }

    /// Closest intersection along `ray` within (t_min, t_max).
    pub fn hit(&self, ray: &Ray, t_min: f32, t_max: f32) -> Option<Hit> {
        let mut closest = t_max;
        let mut result = None;
        for sphere in &self.spheres {
            if let Some(hit) = sphere.hit(ray, t_min, closest) {
                closest = hit.t;
                result = Some(hit);
            }
        }
        result
    }
}
