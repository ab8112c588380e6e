//! Configuration parsing and management for Kinefield

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use kinefield_cloud::{MorphTuning, ShapeKind};

use crate::error::{ConfigError, KinefieldError};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub particles: ParticlesConfig,
    pub morph: MorphConfig,
    pub audio: AudioConfig,
    pub video: VideoConfig,
    pub session: SessionConfig,
    pub http: HttpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            particles: ParticlesConfig::default(),
            morph: MorphConfig::default(),
            audio: AudioConfig::default(),
            video: VideoConfig::default(),
            session: SessionConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KinefieldError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> Result<Self, KinefieldError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, KinefieldError> {
        // Try config paths in order
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
            dirs_path().join("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), KinefieldError> {
        // Validate particle settings
        if self.particles.count == 0 {
            return Err(ConfigError::InvalidValue {
                field: "particles.count".to_string(),
                message: "Particle count must be greater than 0".to_string(),
            }
            .into());
        }

        if self.particles.frame_rate <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "particles.frame_rate".to_string(),
                message: "Frame rate must be greater than 0".to_string(),
            }
            .into());
        }

        if ShapeKind::from_name(&self.particles.default_shape).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "particles.default_shape".to_string(),
                message: format!("Unknown shape: {}", self.particles.default_shape),
            }
            .into());
        }

        if !crate::control::valid_hex_color(&self.particles.default_color) {
            return Err(ConfigError::InvalidValue {
                field: "particles.default_color".to_string(),
                message: "Color must be a #rrggbb hex string".to_string(),
            }
            .into());
        }

        for (field, value) in [
            ("particles.default_expansion", self.particles.default_expansion),
            ("particles.default_tension", self.particles.default_tension),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: "Value must be between 0.0 and 1.0".to_string(),
                }
                .into());
            }
        }

        // Validate audio settings
        if self.audio.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audio.sample_rate".to_string(),
                message: "Sample rate must be greater than 0".to_string(),
            }
            .into());
        }

        // Validate video settings
        if !(self.video.downscale > 0.0 && self.video.downscale <= 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "video.downscale".to_string(),
                message: "Downscale must be between 0.0 (exclusive) and 1.0".to_string(),
            }
            .into());
        }

        if !(1..=100).contains(&self.video.jpeg_quality) {
            return Err(ConfigError::InvalidValue {
                field: "video.jpeg_quality".to_string(),
                message: "JPEG quality must be between 1 and 100".to_string(),
            }
            .into());
        }

        if self.video.frame_rate <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "video.frame_rate".to_string(),
                message: "Frame rate must be greater than 0".to_string(),
            }
            .into());
        }

        // Validate session settings
        if !self.session.endpoint.starts_with("ws") {
            return Err(ConfigError::InvalidValue {
                field: "session.endpoint".to_string(),
                message: "Endpoint must be a ws:// or wss:// URL".to_string(),
            }
            .into());
        }

        // Validate HTTP settings
        if self.http.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.port".to_string(),
                message: "Port must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Particle field configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticlesConfig {
    /// Number of particles in the cloud
    pub count: usize,
    /// Animation frame rate in Hz
    pub frame_rate: f32,
    /// Point sprite size in world units
    pub point_size: f32,
    /// Shape on startup
    pub default_shape: String,
    /// Particle color on startup (#rrggbb)
    pub default_color: String,
    /// Expansion on startup (0.0 - 1.0)
    pub default_expansion: f32,
    /// Tension on startup (0.0 - 1.0)
    pub default_tension: f32,
}

impl Default for ParticlesConfig {
    fn default() -> Self {
        Self {
            count: 8000,
            frame_rate: 60.0,
            point_size: 0.05,
            default_shape: "heart".to_string(),
            default_color: "#3b82f6".to_string(),
            default_expansion: 0.8,
            default_tension: 0.0,
        }
    }
}

impl ParticlesConfig {
    /// The startup shape. Unknown names fall back to the packaged default;
    /// [`Config::validate`] rejects them before this is reached in practice.
    pub fn initial_shape(&self) -> ShapeKind {
        ShapeKind::from_name(&self.default_shape).unwrap_or(ShapeKind::Heart)
    }
}

/// Morph animation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphConfig {
    /// Exponential smoothing rate, per second
    pub lerp_rate: f32,
    /// Tension level below which jitter is disabled
    pub jitter_threshold: f32,
    /// Per-axis jitter half-range at full tension
    pub jitter_scale: f32,
    /// Scale at expansion 0.0
    pub scale_min: f32,
    /// Scale gained from expansion 0.0 to 1.0
    pub scale_span: f32,
    /// Rotation speed at tension 0.0 (rad/s)
    pub spin_base: f32,
    /// Rotation speed gained from tension 0.0 to 1.0 (rad/s)
    pub spin_span: f32,
}

impl Default for MorphConfig {
    fn default() -> Self {
        let t = MorphTuning::default();
        Self {
            lerp_rate: t.lerp_rate,
            jitter_threshold: t.jitter_threshold,
            jitter_scale: t.jitter_scale,
            scale_min: t.scale_min,
            scale_span: t.scale_span,
            spin_base: t.spin_base,
            spin_span: t.spin_span,
        }
    }
}

impl MorphConfig {
    pub fn tuning(&self) -> MorphTuning {
        MorphTuning {
            lerp_rate: self.lerp_rate,
            jitter_threshold: self.jitter_threshold,
            jitter_scale: self.jitter_scale,
            scale_min: self.scale_min,
            scale_span: self.scale_span,
            spin_base: self.spin_base,
            spin_span: self.spin_span,
        }
    }
}

/// Audio input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Audio device name or "default"
    pub device: String,
    /// Preferred capture sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels to request
    pub channels: u16,
    /// Buffer size in samples
    pub buffer_size: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            sample_rate: 48000,
            channels: 1,
            buffer_size: 1024,
        }
    }
}

/// Video frame ingest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Enable the UDP frame receiver
    pub ingest_enabled: bool,
    /// UDP port to receive JPEG frames on
    pub ingest_port: u16,
    /// Listen address for the UDP socket
    pub listen_address: String,
    /// Frames forwarded to the session per second
    pub frame_rate: f32,
    /// JPEG re-encode quality (1 - 100)
    pub jpeg_quality: u8,
    /// Downscale factor applied before re-encoding
    pub downscale: f32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ingest_enabled: true,
            ingest_port: 12350,
            listen_address: "127.0.0.1".to_string(),
            frame_rate: 10.0,
            jpeg_quality: 60,
            downscale: 0.5,
        }
    }
}

impl VideoConfig {
    /// Interval between forwarded frames.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f32(1.0 / self.frame_rate)
    }
}

/// Streaming session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// WebSocket endpoint for the live API
    pub endpoint: String,
    /// API key; falls back to the GEMINI_API_KEY environment variable
    pub api_key: String,
    /// Model identifier sent in the setup message
    pub model: String,
    /// System instruction override; None uses the built-in prompt
    pub system_instruction: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            api_key: String::new(),
            model: "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            system_instruction: None,
        }
    }
}

impl SessionConfig {
    /// The API key from config, or the GEMINI_API_KEY environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Enable HTTP server
    pub enabled: bool,
    /// HTTP server host
    pub host: String,
    /// HTTP server port
    pub port: u16,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Get the platform-specific configuration directory
fn dirs_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        if let Some(config_dir) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(config_dir).join("kinefield");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config/kinefield");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/kinefield");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("kinefield");
        }
    }

    PathBuf::from(".")
}
