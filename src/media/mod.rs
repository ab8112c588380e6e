//! Media capture module
//!
//! Handles microphone capture and camera frame ingest. Both feeds exist to
//! serve the streaming session; nothing here touches the particle field.

pub mod camera;
pub mod mic;

pub use camera::{FrameReceiver, FrameTap, VideoFrame};
pub use mic::{default_input_device_name, list_input_devices, MicCapture};
