//! Live recognition session
//!
//! One WebSocket session to the multimodal collaborator. `connect` grabs the
//! microphone first, performs the setup handshake, then hands the socket
//! halves to background tasks: a writer draining the outbound queue, an
//! inbound reader turning tool calls into control samples, and producers
//! feeding mic audio and camera frames. Teardown is single-owner: whichever
//! side claims the close takes the resources and everything else follows.

pub mod audio;
pub mod protocol;
pub mod video;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::VideoConfig;
use crate::control::ControlSample;
use crate::error::{KinefieldError, SessionError};
use crate::media::{FrameTap, MicCapture};
use crate::AppState;

use protocol::{ServerMessage, SetupMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SessionPhase {
    Idle = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
}

impl SessionPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => SessionPhase::Connecting,
            2 => SessionPhase::Open,
            3 => SessionPhase::Closing,
            _ => SessionPhase::Idle,
        }
    }
}

/// Phase tracker for the session lifecycle.
///
/// Transitions are CAS-guarded so exactly one closer wins when the user and
/// the server race to tear the session down. `live` gates media: it drops
/// before the closing phase is observable anywhere else.
#[derive(Debug)]
struct SessionGate {
    phase: AtomicU8,
    live: AtomicBool,
}

impl SessionGate {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(SessionPhase::Idle as u8),
            live: AtomicBool::new(false),
        }
    }

    fn phase(&self) -> SessionPhase {
        SessionPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Whether producers may push media right now
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn begin_connect(&self) -> Result<(), SessionError> {
        self.phase
            .compare_exchange(
                SessionPhase::Idle as u8,
                SessionPhase::Connecting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(|_| SessionError::AlreadyActive)
    }

    fn abort_connect(&self) {
        self.live.store(false, Ordering::SeqCst);
        self.phase.store(SessionPhase::Idle as u8, Ordering::SeqCst);
    }

    fn open(&self) {
        self.phase.store(SessionPhase::Open as u8, Ordering::SeqCst);
        self.live.store(true, Ordering::SeqCst);
    }

    /// Claim the right to tear down. Media stops before this returns true.
    fn begin_close(&self) -> bool {
        let claimed = self
            .phase
            .compare_exchange(
                SessionPhase::Open as u8,
                SessionPhase::Closing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();

        if claimed {
            self.live.store(false, Ordering::SeqCst);
        }
        claimed
    }

    fn finish_close(&self) {
        self.phase.store(SessionPhase::Idle as u8, Ordering::SeqCst);
    }
}

/// Resources owned by one open session
#[derive(Debug)]
struct SessionResources {
    outbound_tx: mpsc::UnboundedSender<Message>,
    inbound_task: JoinHandle<()>,
    audio_task: JoinHandle<()>,
    video_task: JoinHandle<()>,
}

/// The streaming session to the recognition collaborator
#[derive(Debug)]
pub struct StreamingSession {
    gate: SessionGate,
    resources: Mutex<Option<SessionResources>>,
}

impl Default for StreamingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingSession {
    pub fn new() -> Self {
        Self {
            gate: SessionGate::new(),
            resources: Mutex::new(None),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.gate.phase()
    }

    pub fn is_open(&self) -> bool {
        self.gate.phase() == SessionPhase::Open
    }

    /// Open a session: microphone first, then socket, then handshake.
    /// Producers start only after the server confirms setup.
    pub async fn connect(&self, state: &Arc<AppState>) -> Result<(), KinefieldError> {
        self.gate.begin_connect()?;

        match self.try_connect(state).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.gate.abort_connect();
                Err(e)
            }
        }
    }

    async fn try_connect(&self, state: &Arc<AppState>) -> Result<(), KinefieldError> {
        let (audio_config, video_config, session_config) = {
            let config = state.config.read().await;
            (
                config.audio.clone(),
                config.video.clone(),
                config.session.clone(),
            )
        };

        let api_key = session_config
            .resolved_api_key()
            .ok_or(SessionError::MissingApiKey)?;

        // Grab the mic before touching the network so a missing device
        // fails fast with nothing to unwind.
        let mic = MicCapture::new(&audio_config)?;

        let url = format!("{}?key={}", session_config.endpoint, api_key);
        let (mut ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SessionError::Connect(e.to_string()))?;

        tracing::info!("Connected to {}", session_config.endpoint);

        let setup = SetupMessage::new(&session_config);
        let text =
            serde_json::to_string(&setup).map_err(|e| SessionError::Protocol(e.to_string()))?;
        ws.send(Message::Text(text))
            .await
            .map_err(|e| SessionError::Send(e.to_string()))?;

        wait_for_setup(&mut ws).await?;
        tracing::info!("Session setup complete");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (ws_tx, ws_rx) = ws.split();

        // Hold the resources lock through task startup so a server close
        // racing in cannot observe the open phase before resources exist.
        let mut slot = self.resources.lock().await;
        self.gate.open();

        tokio::spawn(run_writer(ws_tx, outbound_rx, state.clone()));
        let inbound_task = tokio::spawn(run_inbound(ws_rx, state.clone(), outbound_tx.clone()));
        let audio_task =
            tokio::spawn(run_audio_producer(mic, outbound_tx.clone(), state.clone()));
        let video_task = tokio::spawn(run_video_producer(
            state.frames.clone(),
            video_config,
            outbound_tx.clone(),
            state.clone(),
        ));

        *slot = Some(SessionResources {
            outbound_tx,
            inbound_task,
            audio_task,
            video_task,
        });

        Ok(())
    }

    /// Close the session if it is open. Returns false when nothing was open
    /// or another closer already claimed it.
    pub async fn close(&self, reason: &str) -> bool {
        if !self.gate.begin_close() {
            return false;
        }
        self.release(reason).await;
        true
    }

    pub async fn disconnect(&self) -> bool {
        self.close("user requested disconnect").await
    }

    /// Tear down after a successful close claim.
    ///
    /// Everything past the lock is synchronous: the inbound task calls this
    /// on a server close, and an aborted task only stops at its next await,
    /// so teardown must not await once its own abort is queued.
    async fn release(&self, reason: &str) {
        let mut slot = self.resources.lock().await;
        tracing::info!("Closing session: {}", reason);

        if let Some(resources) = slot.take() {
            resources.inbound_task.abort();
            resources.audio_task.abort();
            resources.video_task.abort();

            // The writer forwards this close frame, then exits as the
            // channel drains.
            let _ = resources.outbound_tx.send(Message::Close(None));
        }

        self.gate.finish_close();
    }
}

/// Wait for the server's setup confirmation.
///
/// No local timeout: the wait ends when the server confirms, closes, or the
/// socket errors. Pings still get answered while waiting.
async fn wait_for_setup(ws: &mut WsStream) -> Result<(), KinefieldError> {
    loop {
        let message = ws
            .next()
            .await
            .ok_or_else(|| SessionError::Handshake("Connection ended before setup".to_string()))?
            .map_err(|e| SessionError::Handshake(e.to_string()))?;

        let payload = match message {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(data) => data,
            Message::Ping(payload) => {
                ws.send(Message::Pong(payload))
                    .await
                    .map_err(|e| SessionError::Send(e.to_string()))?;
                continue;
            }
            Message::Close(frame) => {
                return Err(SessionError::Handshake(format!(
                    "Closed during setup: {:?}",
                    frame
                ))
                .into());
            }
            _ => continue,
        };

        match ServerMessage::parse(&payload) {
            Ok(msg) if msg.is_setup_complete() => return Ok(()),
            Ok(_) => tracing::debug!("Ignoring pre-setup message"),
            Err(e) => tracing::debug!("Unparseable pre-setup message: {}", e),
        }
    }
}

/// Drain the outbound queue into the socket.
///
/// Media is dropped once the session stops being live; a close frame always
/// goes through and ends the writer.
async fn run_writer(
    mut ws_tx: WsSink,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    state: Arc<AppState>,
) {
    while let Some(message) = outbound_rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if !closing && !state.session.gate.is_live() {
            continue;
        }

        if let Err(e) = ws_tx.send(message).await {
            tracing::debug!("Session send failed: {}", e);
            break;
        }

        if closing {
            break;
        }
    }

    let _ = ws_tx.close().await;
    tracing::debug!("Session writer finished");
}

/// Read server frames until the stream ends, dispatching tool calls
async fn run_inbound(
    mut ws_rx: WsSource,
    state: Arc<AppState>,
    outbound_tx: mpsc::UnboundedSender<Message>,
) {
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => {
                process_server_payload(&state, &outbound_tx, text.as_bytes()).await;
            }
            Ok(Message::Binary(data)) => {
                process_server_payload(&state, &outbound_tx, &data).await;
            }
            Ok(Message::Close(frame)) => {
                let reason = frame
                    .map(|f| f.reason.to_string())
                    .unwrap_or_else(|| "no reason".to_string());
                state
                    .session
                    .close(&format!("server closed ({})", reason))
                    .await;
                return;
            }
            Ok(_) => {}
            Err(e) => {
                state.session.close(&format!("receive error: {}", e)).await;
                return;
            }
        }
    }

    state.session.close("server stream ended").await;
}

/// Decode one server payload and apply any control tool calls. Returns the
/// number of accepted samples.
async fn process_server_payload(
    state: &Arc<AppState>,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    payload: &[u8],
) -> usize {
    let message = match ServerMessage::parse(payload) {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!("Unparseable server message: {}", e);
            return 0;
        }
    };

    let Some(tool_call) = message.tool_call else {
        return 0;
    };

    let mut accepted = 0;
    for call in &tool_call.function_calls {
        if call.name != protocol::CONTROL_FUNCTION {
            tracing::debug!("Ignoring unknown tool call: {}", call.name);
            continue;
        }

        let Some(sample) = ControlSample::from_args(&call.args) else {
            tracing::debug!("Dropping malformed control args: {}", call.args);
            continue;
        };

        state.apply_control_sample(sample).await;
        accepted += 1;

        // Ack accepted calls so the collaborator keeps its loop going
        if outbound_tx
            .send(Message::Text(protocol::tool_ack(call)))
            .is_err()
        {
            tracing::warn!("Dropped tool ack: outbound queue closed");
        }
    }

    accepted
}

/// Pull capture batches, condition them, and queue wire-ready audio blocks
async fn run_audio_producer(
    mic: MicCapture,
    outbound_tx: mpsc::UnboundedSender<Message>,
    state: Arc<AppState>,
) {
    let mut chunker = audio::AudioChunker::new(mic.sample_rate(), mic.channels());
    tracing::debug!(
        "Audio producer started: {} Hz, {} channels",
        mic.sample_rate(),
        mic.channels()
    );

    loop {
        let samples = match mic.get_samples().await {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!("Mic capture failed: {}", e);
                state.session.close("mic capture failed").await;
                return;
            }
        };

        if samples.is_empty() || !state.session.gate.is_live() {
            continue;
        }

        for block in chunker.push(&samples) {
            let chunk =
                protocol::media_chunk(protocol::AUDIO_MIME, &audio::encode_block(&block));
            if outbound_tx.send(Message::Text(chunk)).is_err() {
                return;
            }
        }
    }
}

/// Forward the freshest camera frame at the configured cadence
async fn run_video_producer(
    frames: Arc<FrameTap>,
    config: VideoConfig,
    outbound_tx: mpsc::UnboundedSender<Message>,
    state: Arc<AppState>,
) {
    let mut interval = tokio::time::interval(config.frame_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        if !state.session.gate.is_live() {
            continue;
        }

        // No frame yet means no camera helper; stay quiet until one shows up
        let Some(frame) = frames.latest().await else {
            continue;
        };

        match video::encode_frame(&frame.jpeg, config.jpeg_quality, config.downscale) {
            Ok(data) => {
                let chunk = protocol::media_chunk(protocol::VIDEO_MIME, &data);
                if outbound_tx.send(Message::Text(chunk)).is_err() {
                    return;
                }
            }
            Err(e) => tracing::debug!("Frame encode failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use kinefield_cloud::ShapeKind;

    #[test]
    fn test_gate_lifecycle() {
        let gate = SessionGate::new();
        assert_eq!(gate.phase(), SessionPhase::Idle);
        assert!(!gate.is_live());

        gate.begin_connect().unwrap();
        assert_eq!(gate.phase(), SessionPhase::Connecting);
        assert!(gate.begin_connect().is_err());
        assert!(!gate.is_live());

        gate.open();
        assert_eq!(gate.phase(), SessionPhase::Open);
        assert!(gate.is_live());

        assert!(gate.begin_close());
        assert!(!gate.is_live());
        assert_eq!(gate.phase(), SessionPhase::Closing);
        // Second closer loses the race
        assert!(!gate.begin_close());

        gate.finish_close();
        assert_eq!(gate.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_gate_abort_connect_returns_to_idle() {
        let gate = SessionGate::new();
        gate.begin_connect().unwrap();
        gate.abort_connect();
        assert_eq!(gate.phase(), SessionPhase::Idle);
        assert!(gate.begin_connect().is_ok());
    }

    #[test]
    fn test_gate_close_requires_open() {
        let gate = SessionGate::new();
        assert!(!gate.begin_close());

        gate.begin_connect().unwrap();
        assert!(!gate.begin_close());
    }

    #[test]
    fn test_phase_serializes_lowercase() {
        assert_eq!(serde_json::to_value(SessionPhase::Idle).unwrap(), "idle");
        assert_eq!(serde_json::to_value(SessionPhase::Open).unwrap(), "open");
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_noop() {
        let session = StreamingSession::new();
        assert!(!session.disconnect().await);
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_connect_rejected_while_active() {
        let state = AppState::new(Config::default());
        state.session.gate.begin_connect().unwrap();

        let err = state.session.connect(&state).await.unwrap_err();
        assert!(matches!(
            err,
            KinefieldError::Session(SessionError::AlreadyActive)
        ));
        // The earlier connect attempt still owns the phase
        assert_eq!(state.session.phase(), SessionPhase::Connecting);
    }

    #[tokio::test]
    async fn test_process_accepts_control_call() {
        let state = AppState::new(Config::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let payload = serde_json::json!({
            "toolCall": {"functionCalls": [{
                "id": "fc-9",
                "name": protocol::CONTROL_FUNCTION,
                "args": {"expansion": 0.25, "tension": 0.75, "shape": "Saturn"}
            }]}
        })
        .to_string();

        let accepted = process_server_payload(&state, &tx, payload.as_bytes()).await;
        assert_eq!(accepted, 1);

        let control = state.get_control_state().await;
        assert_eq!(control.expansion(), 0.25);
        assert_eq!(control.tension(), 0.75);
        assert_eq!(control.shape(), ShapeKind::Saturn);

        let Message::Text(ack) = rx.try_recv().unwrap() else {
            panic!("expected a text ack");
        };
        assert!(ack.contains("fc-9"));
        assert!(ack.contains("\"result\":\"ok\""));
    }

    #[tokio::test]
    async fn test_process_drops_malformed_args_without_ack() {
        let state = AppState::new(Config::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let payload = serde_json::json!({
            "toolCall": {"functionCalls": [{
                "name": protocol::CONTROL_FUNCTION,
                "args": {"expansion": "wide"}
            }]}
        })
        .to_string();

        let before = state.get_control_state().await;
        let accepted = process_server_payload(&state, &tx, payload.as_bytes()).await;

        assert_eq!(accepted, 0);
        assert_eq!(state.get_control_state().await, before);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_process_ignores_unknown_function() {
        let state = AppState::new(Config::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let payload = serde_json::json!({
            "toolCall": {"functionCalls": [{
                "name": "orderPizza",
                "args": {"expansion": 0.5, "tension": 0.5}
            }]}
        })
        .to_string();

        assert_eq!(process_server_payload(&state, &tx, payload.as_bytes()).await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_process_ignores_non_tool_messages() {
        let state = AppState::new(Config::default());
        let (tx, _rx) = mpsc::unbounded_channel();

        assert_eq!(
            process_server_payload(&state, &tx, br#"{"setupComplete": {}}"#).await,
            0
        );
        assert_eq!(process_server_payload(&state, &tx, b"garbage").await, 0);
    }

    #[tokio::test]
    async fn test_process_applies_multiple_calls_in_order() {
        let state = AppState::new(Config::default());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let payload = serde_json::json!({
            "toolCall": {"functionCalls": [
                {
                    "name": protocol::CONTROL_FUNCTION,
                    "args": {"expansion": 0.1, "tension": 0.2}
                },
                {
                    "name": protocol::CONTROL_FUNCTION,
                    "args": {"expansion": 0.9, "tension": 0.8}
                }
            ]}
        })
        .to_string();

        let accepted = process_server_payload(&state, &tx, payload.as_bytes()).await;
        assert_eq!(accepted, 2);

        // Last write wins
        let control = state.get_control_state().await;
        assert_eq!(control.expansion(), 0.9);
        assert_eq!(control.tension(), 0.8);

        // One ack per accepted call
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
