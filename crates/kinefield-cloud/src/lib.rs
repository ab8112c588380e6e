//! Procedural point cloud engine: shape generation and morph animation.
//!
//! This crate is renderer-agnostic. It produces and mutates plain position
//! buffers; drawing them (and applying the rotation accumulator as a global
//! transform) is the embedder's job.

pub mod morph;
pub mod shapes;

pub use morph::{MorphTuning, ParticleCloud};
pub use shapes::{generate, generate_with, ShapeKind};

/// Default number of particles in a cloud.
pub const DEFAULT_PARTICLE_COUNT: usize = 8000;
