//! Camera frame ingest
//!
//! Receives JPEG-over-UDP frames from an external camera helper (one frame
//! per datagram). Only the most recent frame is kept; the session's video
//! producer taps it at its own cadence and stale frames are simply replaced.

use std::io::Cursor;
use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Instant;

use image::{ImageFormat, ImageReader};
use tokio::sync::RwLock;

use crate::config::VideoConfig;
use crate::error::{KinefieldError, VideoError};

/// A single camera frame as received from the helper
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Raw JPEG bytes
    pub jpeg: Vec<u8>,
    /// Decoded width in pixels
    pub width: u32,
    /// Decoded height in pixels
    pub height: u32,
    /// When the frame arrived
    pub received_at: Instant,
}

impl VideoFrame {
    /// Validate a datagram as a JPEG frame.
    ///
    /// Only the header is parsed here; the full decode happens when the
    /// session encodes the frame for transport.
    pub fn from_jpeg(bytes: Vec<u8>) -> Result<Self, KinefieldError> {
        if !bytes.starts_with(&[0xFF, 0xD8]) {
            return Err(VideoError::Decode("Not a JPEG datagram".to_string()).into());
        }

        let (width, height) = ImageReader::with_format(Cursor::new(&bytes), ImageFormat::Jpeg)
            .into_dimensions()
            .map_err(|e| VideoError::Decode(e.to_string()))?;

        Ok(Self {
            jpeg: bytes,
            width,
            height,
            received_at: Instant::now(),
        })
    }
}

/// Shared latest-frame slot between the receiver and the session
#[derive(Debug, Default)]
pub struct FrameTap {
    latest: RwLock<Option<Arc<VideoFrame>>>,
}

impl FrameTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest frame
    pub async fn publish(&self, frame: VideoFrame) {
        let mut latest = self.latest.write().await;
        *latest = Some(Arc::new(frame));
    }

    /// Get the latest frame, if any has arrived
    pub async fn latest(&self) -> Option<Arc<VideoFrame>> {
        self.latest.read().await.clone()
    }

    /// Check whether any frame has been received
    pub async fn has_frame(&self) -> bool {
        self.latest.read().await.is_some()
    }

    /// Drop the stored frame
    pub async fn clear(&self) {
        let mut latest = self.latest.write().await;
        *latest = None;
    }
}

/// JPEG-over-UDP frame receiver
pub struct FrameReceiver {
    config: VideoConfig,
    socket: Option<UdpSocket>,
    tap: Arc<FrameTap>,
}

impl FrameReceiver {
    /// Create a new frame receiver (does not bind yet)
    pub fn new(config: &VideoConfig, tap: Arc<FrameTap>) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            tap,
        }
    }

    /// Bind the UDP socket and start receiving
    pub fn start(&mut self) -> Result<(), KinefieldError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.ingest_port);

        let socket = UdpSocket::bind(&addr).map_err(|e| {
            VideoError::Receiver(format!("Failed to bind to {}: {}", addr, e))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            VideoError::Receiver(format!("Failed to set non-blocking: {}", e))
        })?;

        tracing::info!("Frame receiver listening on {}", addr);
        self.socket = Some(socket);

        Ok(())
    }

    /// Process one incoming datagram (non-blocking).
    ///
    /// Malformed or truncated datagrams are logged and dropped; only socket
    /// failures surface as errors.
    pub async fn process(&self) -> Result<(), KinefieldError> {
        let socket = match &self.socket {
            Some(s) => s,
            None => return Ok(()),
        };

        let mut buf = [0u8; 65536];

        match socket.recv(&mut buf) {
            Ok(size) if size > 0 => {
                if size == buf.len() {
                    // A datagram this large was truncated by the kernel
                    tracing::warn!("Dropping oversized frame datagram");
                    return Ok(());
                }

                match VideoFrame::from_jpeg(buf[..size].to_vec()) {
                    Ok(frame) => {
                        tracing::trace!(
                            "Frame received: {}x{}, {} bytes",
                            frame.width,
                            frame.height,
                            size
                        );
                        self.tap.publish(frame).await;
                    }
                    Err(e) => {
                        tracing::debug!("Dropping bad frame datagram: {}", e);
                    }
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // No data available
            }
            Err(e) => {
                return Err(VideoError::Receiver(format!("Receive error: {}", e)).into());
            }
        }

        Ok(())
    }

    /// Stop the receiver
    pub fn stop(&mut self) {
        self.socket = None;
        tracing::info!("Frame receiver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn tiny_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 40) as u8, (y * 40) as u8, 128])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[test]
    fn test_frame_from_jpeg() {
        let bytes = tiny_jpeg(6, 4);
        let frame = VideoFrame::from_jpeg(bytes.clone()).unwrap();
        assert_eq!(frame.width, 6);
        assert_eq!(frame.height, 4);
        assert_eq!(frame.jpeg, bytes);
    }

    #[test]
    fn test_frame_rejects_non_jpeg() {
        // PNG magic
        let bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert!(VideoFrame::from_jpeg(bytes).is_err());

        assert!(VideoFrame::from_jpeg(Vec::new()).is_err());
    }

    #[test]
    fn test_frame_rejects_truncated_jpeg() {
        let mut bytes = tiny_jpeg(6, 4);
        bytes.truncate(4);
        assert!(VideoFrame::from_jpeg(bytes).is_err());
    }

    #[tokio::test]
    async fn test_tap_keeps_latest_frame() {
        let tap = FrameTap::new();
        assert!(!tap.has_frame().await);
        assert!(tap.latest().await.is_none());

        tap.publish(VideoFrame::from_jpeg(tiny_jpeg(6, 4)).unwrap()).await;
        tap.publish(VideoFrame::from_jpeg(tiny_jpeg(8, 6)).unwrap()).await;

        let frame = tap.latest().await.unwrap();
        assert_eq!(frame.width, 8);

        tap.clear().await;
        assert!(!tap.has_frame().await);
    }
}
