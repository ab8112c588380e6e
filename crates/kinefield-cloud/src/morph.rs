//! Morph animation: per-frame interpolation of a particle cloud toward its
//! target shape.
//!
//! The cloud keeps two fixed-size position buffers. `target` is replaced
//! wholesale on a shape change; `current` is only ever nudged toward the
//! scaled (and, under tension, jittered) target, so a shape change never
//! snaps the visible particles.

use glam::Vec3;
use rand::Rng;

use crate::shapes::{self, ShapeKind};

/// Tuning constants for the morph step.
///
/// Defaults reproduce the tuned production feel: a 5.0/s smoothing rate,
/// jitter kicking in above tension 0.1, and a 0.2x-2.0x expansion range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphTuning {
    /// Exponential smoothing rate constant, per second.
    pub lerp_rate: f32,
    /// Tension level below which no jitter is applied.
    pub jitter_threshold: f32,
    /// Per-axis jitter half-range at full tension.
    pub jitter_scale: f32,
    /// Scale applied at expansion 0.0.
    pub scale_min: f32,
    /// Additional scale gained from expansion 0.0 to 1.0.
    pub scale_span: f32,
    /// Rotation speed at tension 0.0, radians per second.
    pub spin_base: f32,
    /// Additional rotation speed gained from tension 0.0 to 1.0.
    pub spin_span: f32,
}

impl Default for MorphTuning {
    fn default() -> Self {
        Self {
            lerp_rate: 5.0,
            jitter_threshold: 0.1,
            jitter_scale: 0.25,
            scale_min: 0.2,
            scale_span: 1.8,
            spin_base: 0.1,
            spin_span: 2.0,
        }
    }
}

/// A morphing particle cloud with a fixed particle count.
#[derive(Debug, Clone)]
pub struct ParticleCloud {
    current: Vec<Vec3>,
    target: Vec<Vec3>,
    shape: ShapeKind,
    rotation: f32,
    tuning: MorphTuning,
}

impl ParticleCloud {
    /// Create a cloud of `count` particles targeting `shape`.
    ///
    /// Current positions start at the origin, so the first frames bloom the
    /// shape outward from the center.
    pub fn new(shape: ShapeKind, count: usize) -> Self {
        Self::with_tuning(shape, count, MorphTuning::default())
    }

    pub fn with_tuning(shape: ShapeKind, count: usize, tuning: MorphTuning) -> Self {
        Self {
            current: vec![Vec3::ZERO; count],
            target: shapes::generate(shape, count),
            shape,
            rotation: 0.0,
            tuning,
        }
    }

    /// Number of particles. Constant for the lifetime of the cloud.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// The shape family the cloud is currently morphing toward.
    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    /// Accumulated rotation in radians. Applied by the renderer as a global
    /// transform, never baked into the positions.
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn tuning(&self) -> &MorphTuning {
        &self.tuning
    }

    /// Current particle positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.current
    }

    /// Current positions as a flat `[x0, y0, z0, x1, ...]` coordinate buffer,
    /// suitable for handing to a renderer without copying.
    pub fn positions_flat(&self) -> &[f32] {
        bytemuck::cast_slice(&self.current)
    }

    /// Generate a fresh instance of `shape` and make it the new target.
    /// Current positions are left untouched; the morph continues from
    /// whatever visual state exists right now.
    pub fn retarget(&mut self, shape: ShapeKind) {
        self.target = shapes::generate(shape, self.current.len());
        self.shape = shape;
    }

    /// Seeded variant of [`retarget`](Self::retarget) for deterministic tests.
    pub fn retarget_with<R: Rng + ?Sized>(&mut self, rng: &mut R, shape: ShapeKind) {
        self.target = shapes::generate_with(rng, shape, self.current.len());
        self.shape = shape;
    }

    /// Replace the target buffer directly. `points` must have the cloud's
    /// particle count; mismatched buffers are ignored rather than letting the
    /// two buffers drift out of step.
    pub fn set_target(&mut self, points: Vec<Vec3>) {
        if points.len() == self.current.len() {
            self.target = points;
        }
    }

    /// Advance the morph by `dt` seconds using the thread RNG for jitter.
    pub fn step(&mut self, dt: f32, expansion: f32, tension: f32) {
        self.step_with(&mut rand::rng(), dt, expansion, tension);
    }

    /// Advance the morph by `dt` seconds.
    ///
    /// Every particle is pulled toward `target * scale` by an exponential
    /// smoothing factor; the factor is clamped to 1.0 so an oversized `dt`
    /// (a paused or hitched frame) cannot overshoot. Jitter is resampled
    /// every call, which is what makes high tension read as vibration.
    pub fn step_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        dt: f32,
        expansion: f32,
        tension: f32,
    ) {
        let t = &self.tuning;
        let lerp = (t.lerp_rate * dt).clamp(0.0, 1.0);
        let scale = t.scale_min + t.scale_span * expansion;
        let jitter = tension > t.jitter_threshold;
        let amp = tension * t.jitter_scale;

        for (current, target) in self.current.iter_mut().zip(&self.target) {
            let mut point = *target * scale;
            if jitter {
                point += Vec3::new(
                    rng.random_range(-amp..amp),
                    rng.random_range(-amp..amp),
                    rng.random_range(-amp..amp),
                );
            }
            *current += (point - *current) * lerp;
        }

        self.rotation += dt * (t.spin_base + t.spin_span * tension);
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

    fn cloud(seed: u64, shape: ShapeKind, count: usize) -> ParticleCloud {
        let mut c = ParticleCloud::new(shape, count);
        let mut rng = seeded(seed);
        c.retarget_with(&mut rng, shape);
        c
    }

    #[test]
    fn test_starts_at_origin_with_full_target() {
        let c = ParticleCloud::new(ShapeKind::Heart, 64);
        assert_eq!(c.len(), 64);
        assert!(c.positions().iter().all(|p| *p == Vec3::ZERO));
        assert_eq!(c.rotation(), 0.0);
    }

    #[test]
    fn test_converges_to_scaled_target_without_tension() {
        let mut c = cloud(1, ShapeKind::Saturn, 200);
        let mut rng = seeded(2);
        let targets: Vec<Vec3> = c.target.clone();

        // expansion 1.0 -> scale 2.0; 60 steps at 1/60 s.
        for _ in 0..60 {
            c.step_with(&mut rng, 1.0 / 60.0, 1.0, 0.0);
        }

        for (current, target) in c.positions().iter().zip(&targets) {
            let want = *target * 2.0;
            let err = (*current - want).length();
            assert!(
                err <= 0.01 * want.length() + 1e-4,
                "residual {} for target {:?}",
                err,
                want
            );
        }
    }

    #[test]
    fn test_rotation_accumulates_base_rate() {
        let mut c = cloud(3, ShapeKind::Sphere, 8);
        let mut rng = seeded(4);
        for _ in 0..60 {
            c.step_with(&mut rng, 1.0 / 60.0, 1.0, 0.0);
        }
        // 60 * (1/60) * 0.1 radians at zero tension.
        assert!((c.rotation() - 0.1).abs() < 1e-5, "rotation {}", c.rotation());
    }

    #[test]
    fn test_rotation_speeds_up_with_tension() {
        let mut c = cloud(5, ShapeKind::Sphere, 8);
        let mut rng = seeded(6);
        c.step_with(&mut rng, 1.0, 0.5, 1.0);
        // 0.1 + 2.0 * 1.0 radians over one second.
        assert!((c.rotation() - 2.1).abs() < 1e-5);
    }

    #[test]
    fn test_retarget_keeps_current_positions() {
        let mut c = cloud(7, ShapeKind::Heart, 100);
        let mut rng = seeded(8);
        for _ in 0..30 {
            c.step_with(&mut rng, 1.0 / 60.0, 0.8, 0.0);
        }

        let before: Vec<Vec3> = c.positions().to_vec();
        c.retarget_with(&mut rng, ShapeKind::Fireworks);

        assert_eq!(c.shape(), ShapeKind::Fireworks);
        assert_eq!(c.positions(), before.as_slice());
        assert_eq!(c.len(), 100);
    }

    #[test]
    fn test_set_target_rejects_mismatched_count() {
        let mut c = cloud(9, ShapeKind::Sphere, 50);
        let original = c.target.clone();
        c.set_target(vec![Vec3::ONE; 10]);
        assert_eq!(c.target, original);
    }

    #[test]
    fn test_jitter_stays_within_bound_at_full_tension() {
        // A converged cloud only moves by the jitter term, so one extra step
        // bounds each axis displacement by lerp * amp.
        let mut c = cloud(10, ShapeKind::Sphere, 200);
        let mut rng = seeded(11);
        for _ in 0..600 {
            c.step_with(&mut rng, 1.0 / 60.0, 0.5, 0.0);
        }

        let settled: Vec<Vec3> = c.positions().to_vec();
        c.step_with(&mut rng, 1.0 / 60.0, 0.5, 1.0);

        let lerp = 5.0 / 60.0;
        for (after, before) in c.positions().iter().zip(&settled) {
            let delta = *after - *before;
            for axis in [delta.x, delta.y, delta.z] {
                assert!(axis.abs() <= lerp * 0.25 + 1e-3, "axis delta {}", axis);
            }
        }
    }

    #[test]
    fn test_no_jitter_below_threshold() {
        let mut a = cloud(12, ShapeKind::Flower, 50);
        let mut b = a.clone();
        let mut rng_a = seeded(13);
        let mut rng_b = seeded(14);

        // Different RNGs, identical outcome: tension 0.1 is below the
        // jitter threshold so no random draws happen.
        a.step_with(&mut rng_a, 1.0 / 60.0, 0.7, 0.1);
        b.step_with(&mut rng_b, 1.0 / 60.0, 0.7, 0.1);
        assert_eq!(a.positions(), b.positions());
    }

    #[test]
    fn test_oversized_dt_clamps_instead_of_overshooting() {
        let mut c = cloud(15, ShapeKind::Sphere, 50);
        let mut rng = seeded(16);
        let targets = c.target.clone();

        // 10 simulated seconds in one frame: lerp clamps to 1.0 and lands
        // exactly on the scaled target.
        c.step_with(&mut rng, 10.0, 1.0, 0.0);
        for (current, target) in c.positions().iter().zip(&targets) {
            assert!((*current - *target * 2.0).length() < 1e-5);
        }
    }

    #[test]
    fn test_flat_buffer_matches_positions() {
        let mut c = cloud(17, ShapeKind::Meditate, 16);
        let mut rng = seeded(18);
        c.step_with(&mut rng, 0.02, 0.5, 0.0);

        let flat = c.positions_flat();
        assert_eq!(flat.len(), 16 * 3);
        for (i, p) in c.positions().iter().enumerate() {
            assert_eq!(flat[i * 3], p.x);
            assert_eq!(flat[i * 3 + 1], p.y);
            assert_eq!(flat[i * 3 + 2], p.z);
        }
    }
}
