//! Wire protocol for the live recognition session
//!
//! Messages are JSON with camelCase keys. Outbound we send one setup
//! message, then realtime media chunks and tool acks; inbound we only care
//! about the setup confirmation and tool calls, everything else is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kinefield_cloud::ShapeKind;

use crate::config::SessionConfig;
use crate::error::SessionError;

/// Tool the collaborator calls to drive the particle field
pub const CONTROL_FUNCTION: &str = "updateParticleControl";

/// Mime type for outbound audio chunks
pub const AUDIO_MIME: &str = "audio/pcm;rate=16000";

/// Mime type for outbound video chunks
pub const VIDEO_MIME: &str = "image/jpeg";

/// Prompt used when the config does not override it
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are a high-speed motion capture engine. Your ONLY job is to analyze the \
video stream and control the 3D particles.

OPERATIONAL RULES:
1. VISUAL PRIORITY: Ignore audio unless it is a specific command (e.g. \"change shape\"). Focus 99% on the video.
2. GAME LOOP: You must output the 'updateParticleControl' tool call CONTINUOUSLY (aim for every 100-200ms). Do not stop.
3. SILENCE: Do NOT speak. Do NOT reply with text or audio. ONLY call the tool.

GESTURE MAPPING:
- EXPANSION (0.0 - 1.0): hands touching / fists closed = 0.0; hands shoulder width = 0.5; hands fully extended = 1.0.
- TENSION (0.0 - 1.0): smooth, slow, floating = 0.0; fast, jerky, energetic = 1.0.

If you see no hands, maintain the last known state or default to Expansion: 0.5, Tension: 0.0.
React INSTANTLY to movement.";

/// First message on the wire after connecting
#[derive(Debug, Clone, Serialize)]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl SetupMessage {
    pub fn new(config: &SessionConfig) -> Self {
        let instruction = config
            .system_instruction
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string());

        Self {
            setup: Setup {
                model: config.model.clone(),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                },
                system_instruction: Content {
                    parts: vec![Part { text: instruction }],
                },
                tools: vec![Tool {
                    function_declarations: vec![control_function()],
                }],
            },
        }
    }
}

/// Declaration of the particle control tool
pub fn control_function() -> FunctionDeclaration {
    let shape_names: Vec<&str> = ShapeKind::ALL.iter().map(|s| s.name()).collect();

    FunctionDeclaration {
        name: CONTROL_FUNCTION.to_string(),
        description: "Updates the particle system based on hand gestures. Call this continuously."
            .to_string(),
        parameters: serde_json::json!({
            "type": "OBJECT",
            "properties": {
                "expansion": {
                    "type": "NUMBER",
                    "description": "Distance between hands. 0.0 (touching) to 1.0 (arms wide).",
                },
                "tension": {
                    "type": "NUMBER",
                    "description": "Movement energy. 0.0 (still/slow) to 1.0 (shaking/fast).",
                },
                "shape": {
                    "type": "STRING",
                    "description": "Only set if the user asks for a shape.",
                    "enum": shape_names,
                },
            },
            "required": ["expansion", "tension"],
        }),
    }
}

/// Build a realtime media chunk message
pub fn media_chunk(mime_type: &str, data: &str) -> String {
    serde_json::json!({
        "realtimeInput": {
            "mediaChunks": [{
                "mimeType": mime_type,
                "data": data,
            }],
        },
    })
    .to_string()
}

/// Build the acknowledgment for an accepted tool call
pub fn tool_ack(call: &FunctionCall) -> String {
    let mut response = serde_json::json!({
        "name": call.name,
        "response": { "result": "ok" },
    });
    if let Some(id) = &call.id {
        response["id"] = serde_json::json!(id);
    }

    serde_json::json!({
        "toolResponse": {
            "functionResponses": [response],
        },
    })
    .to_string()
}

/// An inbound server message, reduced to the parts we act on
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<Value>,
    #[serde(default)]
    pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ServerMessage {
    /// Parse a text or binary frame payload
    pub fn parse(payload: &[u8]) -> Result<Self, SessionError> {
        serde_json::from_slice(payload).map_err(|e| SessionError::Protocol(e.to_string()))
    }

    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete.is_some()
    }
}
