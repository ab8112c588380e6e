//! Error types for Kinefield

use thiserror::Error;

/// Main error type for Kinefield
#[derive(Error, Debug)]
pub enum KinefieldError {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Web server error: {0}")]
    Web(#[from] WebError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio capture errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio device found")]
    NoDeviceFound,

    #[error("Failed to enumerate audio devices: {0}")]
    DeviceEnumeration(String),

    #[error("Failed to get default input device")]
    NoDefaultInput,

    #[error("Failed to get supported config: {0}")]
    UnsupportedConfig(String),

    #[error("Failed to build input stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start audio stream: {0}")]
    StreamStart(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Streaming session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session already active")]
    AlreadyActive,

    #[error("No API key configured")]
    MissingApiKey,

    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    #[error("Setup handshake failed: {0}")]
    Handshake(String),

    #[error("Failed to send message: {0}")]
    Send(String),

    #[error("Server closed the connection: {0}")]
    ServerClosed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Video ingest and encoding errors
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Frame receiver error: {0}")]
    Receiver(String),

    #[error("Frame decode error: {0}")]
    Decode(String),

    #[error("Frame encode error: {0}")]
    Encode(String),
}

/// Web server errors
#[derive(Error, Debug)]
pub enum WebError {
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    #[error("Server startup failed: {0}")]
    Startup(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for Kinefield operations
pub type Result<T> = std::result::Result<T, KinefieldError>;
