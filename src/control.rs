//! Presentation control state and inbound gesture samples

use serde::Serialize;
use serde_json::Value;

use kinefield_cloud::ShapeKind;

/// Check that a string is a #rrggbb hex color
pub fn valid_hex_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn serialize_shape<S>(shape: &ShapeKind, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(shape.name())
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Full presentation state driving the particle field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    /// Shape the cloud is morphing toward
    #[serde(serialize_with = "serialize_shape")]
    shape: ShapeKind,
    /// Particle color as a #rrggbb hex string
    color: String,
    /// Openness of the field (0.0 - 1.0)
    expansion: f32,
    /// Agitation of the field (0.0 - 1.0)
    tension: f32,
    /// Epoch milliseconds of the last accepted gesture sample
    updated_at_ms: u64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(ShapeKind::Heart, "#3b82f6", 0.8, 0.0)
    }
}

impl ControlState {
    /// Create a new control state with the given startup values
    pub fn new(shape: ShapeKind, color: &str, expansion: f32, tension: f32) -> Self {
        Self {
            shape,
            color: color.to_string(),
            expansion: expansion.clamp(0.0, 1.0),
            tension: tension.clamp(0.0, 1.0),
            updated_at_ms: now_ms(),
        }
    }

    /// Get the current shape
    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    /// Get the current color
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Get the expansion amount
    pub fn expansion(&self) -> f32 {
        self.expansion
    }

    /// Get the tension amount
    pub fn tension(&self) -> f32 {
        self.tension
    }

    /// Epoch milliseconds of the last accepted gesture sample
    pub fn updated_at_ms(&self) -> u64 {
        self.updated_at_ms
    }

    /// Milliseconds since the last accepted gesture sample
    pub fn ms_since_update(&self) -> u64 {
        now_ms().saturating_sub(self.updated_at_ms)
    }

    /// Create a new state with the shape changed
    pub fn with_shape(mut self, shape: ShapeKind) -> Self {
        self.shape = shape;
        self
    }

    /// Create a new state with the color changed
    pub fn with_color(mut self, color: String) -> Self {
        self.color = color;
        self
    }

    /// Create a new state with the expansion changed
    pub fn with_expansion(mut self, value: f32) -> Self {
        self.expansion = value.clamp(0.0, 1.0);
        self
    }

    /// Create a new state with the tension changed
    pub fn with_tension(mut self, value: f32) -> Self {
        self.tension = value.clamp(0.0, 1.0);
        self
    }

    /// Apply an accepted gesture sample. Marks the state fresh; local edits
    /// through the `with_*` builders never touch the timestamp.
    pub fn apply_sample(mut self, sample: ControlSample) -> Self {
        self.expansion = sample.expansion;
        self.tension = sample.tension;
        if let Some(shape) = sample.shape {
            self.shape = shape;
        }
        self.updated_at_ms = now_ms();
        self
    }
}

/// A single gesture sample decoded from an inbound tool call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSample {
    pub expansion: f32,
    pub tension: f32,
    pub shape: Option<ShapeKind>,
}

impl ControlSample {
    /// Decode a sample from tool call arguments.
    ///
    /// `expansion` and `tension` are required numbers and are clamped to
    /// 0.0 - 1.0. A missing or non-numeric field rejects the whole call.
    /// `shape` is optional; unknown names resolve to the sphere.
    pub fn from_args(args: &Value) -> Option<Self> {
        let expansion = args.get("expansion")?.as_f64()? as f32;
        let tension = args.get("tension")?.as_f64()? as f32;
        let shape = args
            .get("shape")
            .and_then(|v| v.as_str())
            .map(ShapeKind::resolve);

        Some(Self {
            expansion: expansion.clamp(0.0, 1.0),
            tension: tension.clamp(0.0, 1.0),
            shape,
        })
    }
}
