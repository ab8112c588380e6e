//! Stochastic shape generators.
//!
//! Each generator produces a fresh point set with a fixed aggregate
//! distribution; two calls for the same shape never yield identical clouds.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec3;
use rand::Rng;

/// The available shape families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Heart,
    Flower,
    Saturn,
    Meditate,
    Fireworks,
    Sphere,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 6] = [
        ShapeKind::Heart,
        ShapeKind::Flower,
        ShapeKind::Saturn,
        ShapeKind::Meditate,
        ShapeKind::Fireworks,
        ShapeKind::Sphere,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Heart => "Heart",
            ShapeKind::Flower => "Flower",
            ShapeKind::Saturn => "Saturn",
            ShapeKind::Meditate => "Meditate",
            ShapeKind::Fireworks => "Fireworks",
            ShapeKind::Sphere => "Sphere",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_name(name: &str) -> Option<ShapeKind> {
        ShapeKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Lookup with the documented fallback: unrecognized names mean Sphere.
    pub fn resolve(name: &str) -> ShapeKind {
        ShapeKind::from_name(name).unwrap_or(ShapeKind::Sphere)
    }
}

/// Generate `count` points for `shape` using the thread RNG.
pub fn generate(shape: ShapeKind, count: usize) -> Vec<Vec3> {
    generate_with(&mut rand::rng(), shape, count)
}

/// Generate `count` points for `shape` from the given RNG.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, shape: ShapeKind, count: usize) -> Vec<Vec3> {
    let mut points = Vec::with_capacity(count);
    for _ in 0..count {
        let point = match shape {
            ShapeKind::Heart => heart_point(rng),
            ShapeKind::Flower => flower_point(rng),
            ShapeKind::Saturn => saturn_point(rng),
            ShapeKind::Meditate => meditate_point(rng),
            ShapeKind::Fireworks => point_in_sphere(rng, 4.0),
            ShapeKind::Sphere => point_in_sphere(rng, 3.0),
        };
        points.push(point);
    }
    points
}

/// Uniform sample inside a sphere of the given radius.
fn point_in_sphere<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec3 {
    let theta = rng.random_range(0.0..TAU);
    let phi = rng.random_range(-1.0..1.0f32).acos();
    let r = radius * rng.random::<f32>().cbrt();
    let sin_phi = phi.sin();
    Vec3::new(
        r * sin_phi * theta.cos(),
        r * sin_phi * theta.sin(),
        r * phi.cos(),
    )
}

/// Classic cardioid curve scattered into a slab, thinner toward the tip.
fn heart_point<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let theta = rng.random_range(0.0..TAU);
    let tx = 16.0 * theta.sin().powi(3);
    let ty = 13.0 * theta.cos()
        - 5.0 * (2.0 * theta).cos()
        - 2.0 * (3.0 * theta).cos()
        - (4.0 * theta).cos();

    Vec3::new(
        tx * 0.1 + rng.random_range(-0.25..0.25),
        ty * 0.1 + rng.random_range(-0.25..0.25),
        rng.random_range(-1.0..1.0) * (1.0 - ty.abs() / 20.0),
    )
}

/// Four-petal rose curve with vertical spread.
fn flower_point<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let theta = rng.random_range(0.0..TAU);
    let r = (4.0 * theta).cos();
    let phi = rng.random_range(-FRAC_PI_2..FRAC_PI_2);

    Vec3::new(
        r * theta.cos() * 3.0,
        r * theta.sin() * 3.0,
        phi.sin() * r * 1.5,
    )
}

/// Planet plus a flat ring, 60/40 mixture.
fn saturn_point<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    if rng.random::<f32>() < 0.6 {
        point_in_sphere(rng, 1.5)
    } else {
        let angle = rng.random_range(0.0..TAU);
        let dist = rng.random_range(3.0..5.0);
        Vec3::new(
            angle.cos() * dist,
            rng.random_range(-0.1..0.1),
            angle.sin() * dist,
        )
    }
}

/// Seated figure from three primitives: head, torso, torus base.
fn meditate_point<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    let section = rng.random::<f32>();
    if section < 0.2 {
        let p = point_in_sphere(rng, 0.6);
        Vec3::new(p.x, p.y + 1.8, p.z)
    } else if section < 0.6 {
        let p = point_in_sphere(rng, 1.2);
        Vec3::new(p.x * 1.2, p.y * 1.5, p.z * 0.8)
    } else {
        let ring_radius = 1.2;
        let tube_radius = 0.5;
        let angle = rng.random_range(0.0..TAU);
        let tube = rng.random_range(0.0..TAU);
        Vec3::new(
            (ring_radius + tube_radius * tube.cos()) * angle.cos(),
            tube_radius * tube.sin() - 1.2,
            (ring_radius + tube_radius * tube.cos()) * angle.sin(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn seeded(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_exact_count_for_every_shape() {
        let mut rng = seeded(1);
        for kind in ShapeKind::ALL {
            let points = generate_with(&mut rng, kind, 500);
            assert_eq!(points.len(), 500, "{}", kind.name());
        }
    }

    #[test]
    fn test_sphere_points_within_radius() {
        let mut rng = seeded(2);
        for point in generate_with(&mut rng, ShapeKind::Sphere, 2000) {
            assert!(point.length() <= 3.0 + 1e-4);
        }
    }

    #[test]
    fn test_fireworks_points_within_radius() {
        let mut rng = seeded(3);
        for point in generate_with(&mut rng, ShapeKind::Fireworks, 2000) {
            assert!(point.length() <= 4.0 + 1e-4);
        }
    }

    #[test]
    fn test_same_shape_yields_distinct_instances() {
        let mut rng = seeded(4);
        let a = generate_with(&mut rng, ShapeKind::Heart, 100);
        let b = generate_with(&mut rng, ShapeKind::Heart, 100);
        assert_ne!(a, b);
    }

    #[test]
    fn test_saturn_has_planet_and_ring() {
        let mut rng = seeded(5);
        let points = generate_with(&mut rng, ShapeKind::Saturn, 2000);

        let planet = points.iter().filter(|p| p.length() <= 1.5 + 1e-4).count();
        let ring = points
            .iter()
            .filter(|p| {
                let radial = (p.x * p.x + p.z * p.z).sqrt();
                p.y.abs() <= 0.1 && (3.0..5.0).contains(&radial)
            })
            .count();

        assert_eq!(planet + ring, 2000);
        // 60/40 mixture; allow generous slack around the expectation.
        assert!(planet > 1000 && planet < 1400, "planet = {}", planet);
        assert!(ring > 600 && ring < 1000, "ring = {}", ring);
    }

    #[test]
    fn test_meditate_sections_present() {
        let mut rng = seeded(6);
        let points = generate_with(&mut rng, ShapeKind::Meditate, 2000);

        // Head sphere sits at +1.8, base torus dips to -1.7.
        let head = points.iter().filter(|p| p.y > 1.2).count();
        let base = points.iter().filter(|p| p.y < -0.7).count();
        assert!(head > 0);
        assert!(base > 0);
    }

    #[test]
    fn test_from_name_case_insensitive() {
        assert_eq!(ShapeKind::from_name("heart"), Some(ShapeKind::Heart));
        assert_eq!(ShapeKind::from_name("SATURN"), Some(ShapeKind::Saturn));
        assert_eq!(ShapeKind::from_name("Fireworks"), Some(ShapeKind::Fireworks));
        assert_eq!(ShapeKind::from_name("dragon"), None);
    }

    #[test]
    fn test_resolve_falls_back_to_sphere() {
        assert_eq!(ShapeKind::resolve("Dragon"), ShapeKind::Sphere);
        assert_eq!(ShapeKind::resolve("meditate"), ShapeKind::Meditate);
    }
}
