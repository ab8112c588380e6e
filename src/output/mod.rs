//! Output module
//!
//! Renderer-facing surfaces for the particle field:
//! - Frame snapshots over a watch channel for embedding renderers
//! - Server-Sent Events mirroring control-state updates

pub mod frames;
pub mod sse;
