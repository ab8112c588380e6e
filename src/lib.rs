//! Kinefield - Gesture-Driven Kinetic Particle Field Service
//!
//! A headless Rust service that:
//! - Streams microphone audio and camera frames to a multimodal recognition
//!   collaborator over a live WebSocket session
//! - Receives discrete control events (expansion, tension, shape) back
//!   through an acknowledged function-call protocol
//! - Morphs a procedural 3D point cloud smoothly toward the active control
//!   state, independent of frame rate
//! - Publishes frames over a watch channel and state over SSE and a JSON
//!   HTTP API for external renderers and UI adapters
//!
//! The shape and morph engine lives in the `kinefield-cloud` sub-crate so a
//! renderer can embed it without pulling in the service stack.

pub mod config;
pub mod control;
pub mod error;
pub mod media;
pub mod output;
pub mod session;
pub mod web;

pub use config::Config;
pub use error::{KinefieldError, Result};

use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};

use control::{ControlSample, ControlState};
use media::FrameTap;
use output::frames::FrameSnapshot;
use session::StreamingSession;

/// Application state shared across all components
#[derive(Debug)]
pub struct AppState {
    /// Current configuration
    pub config: RwLock<Config>,
    /// Current control state
    pub control_state: RwLock<ControlState>,
    /// Channel for control state updates
    pub state_tx: broadcast::Sender<ControlState>,
    /// Latest rendered frame, for external renderers
    pub frame_tx: watch::Sender<FrameSnapshot>,
    /// Latest camera frame from the ingest socket
    pub frames: Arc<FrameTap>,
    /// The streaming session to the recognition collaborator
    pub session: Arc<StreamingSession>,
    /// Shutdown signal
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create a new application state with the given configuration
    pub fn new(config: Config) -> Arc<Self> {
        let (state_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);
        let (frame_tx, _) = watch::channel(FrameSnapshot::default());

        let control_state = ControlState::new(
            config.particles.initial_shape(),
            &config.particles.default_color,
            config.particles.default_expansion,
            config.particles.default_tension,
        );

        Arc::new(Self {
            config: RwLock::new(config),
            control_state: RwLock::new(control_state),
            state_tx,
            frame_tx,
            frames: Arc::new(FrameTap::new()),
            session: Arc::new(StreamingSession::new()),
            shutdown_tx,
        })
    }

    /// Update the control state and broadcast the change
    pub async fn update_control_state(&self, state: ControlState) {
        let mut current = self.control_state.write().await;
        *current = state.clone();
        let _ = self.state_tx.send(state);
    }

    /// Get the current control state
    pub async fn get_control_state(&self) -> ControlState {
        self.control_state.read().await.clone()
    }

    /// Apply a control sample accepted from the recognition collaborator
    pub async fn apply_control_sample(&self, sample: ControlSample) {
        let updated = self.get_control_state().await.apply_sample(sample);
        self.update_control_state(updated).await;
    }

    /// Subscribe to control state changes
    pub fn subscribe_state(&self) -> broadcast::Receiver<ControlState> {
        self.state_tx.subscribe()
    }

    /// Publish a frame snapshot; late subscribers still see the latest frame
    pub fn publish_frame(&self, frame: FrameSnapshot) {
        self.frame_tx.send_replace(frame);
    }

    /// Subscribe to frame snapshots
    pub fn subscribe_frames(&self) -> watch::Receiver<FrameSnapshot> {
        self.frame_tx.subscribe()
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
