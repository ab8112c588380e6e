//! Video uplink conditioning
//!
//! Camera frames arrive as full-size JPEGs; the wire wants something small.
//! Each forwarded frame is decoded, downscaled, and re-encoded at reduced
//! quality before being base64'd into a media chunk.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageFormat;

use crate::error::{KinefieldError, VideoError};

/// Downscale and re-encode a JPEG frame, returning base64 for the wire
pub fn encode_frame(jpeg: &[u8], quality: u8, downscale: f32) -> Result<String, KinefieldError> {
    let image = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
        .map_err(|e| VideoError::Decode(e.to_string()))?;

    let width = ((image.width() as f32 * downscale) as u32).max(1);
    let height = ((image.height() as f32 * downscale) as u32).max(1);
    let scaled = image.resize_exact(width, height, FilterType::Triangle);

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    scaled
        .write_with_encoder(encoder)
        .map_err(|e| VideoError::Encode(e.to_string()))?;

    Ok(BASE64.encode(&bytes))
}
