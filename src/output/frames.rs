//! Frame snapshots for external renderers
//!
//! The animation loop publishes the latest frame through a watch channel so
//! a renderer can always read the freshest positions without blocking the
//! animator. Positions are a flat xyz buffer ready for a vertex upload.

use std::sync::Arc;

use kinefield_cloud::ParticleCloud;

use crate::control::ControlState;

/// One rendered frame of the particle field
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Flat positions, three floats per particle
    pub positions: Arc<[f32]>,
    /// Rotation accumulator in radians; the renderer applies it as a global
    /// transform around the vertical axis
    pub rotation: f32,
    /// Hex color for the whole field
    pub color: String,
    /// Point size in world units
    pub point_size: f32,
}

impl Default for FrameSnapshot {
    fn default() -> Self {
        Self {
            positions: Vec::new().into(),
            rotation: 0.0,
            color: ControlState::default().color().to_string(),
            point_size: 0.05,
        }
    }
}

impl FrameSnapshot {
    /// Capture the animator's current state
    pub fn capture(cloud: &ParticleCloud, control: &ControlState, point_size: f32) -> Self {
        Self {
            positions: Arc::from(cloud.positions_flat()),
            rotation: cloud.rotation(),
            color: control.color().to_string(),
            point_size,
        }
    }

    pub fn particle_count(&self) -> usize {
        self.positions.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinefield_cloud::ShapeKind;

    #[test]
    fn test_capture_flattens_positions() {
        let mut cloud = ParticleCloud::new(ShapeKind::Sphere, 16);
        cloud.step(1.0 / 60.0, 0.8, 0.0);

        let control = ControlState::default();
        let frame = FrameSnapshot::capture(&cloud, &control, 0.05);

        assert_eq!(frame.positions.len(), 48);
        assert_eq!(frame.particle_count(), 16);
        assert_eq!(frame.rotation, cloud.rotation());
        assert_eq!(frame.color, control.color());
    }

    #[test]
    fn test_default_is_empty() {
        let frame = FrameSnapshot::default();
        assert_eq!(frame.particle_count(), 0);
        assert_eq!(frame.point_size, 0.05);
    }
}
