//! Audio uplink conditioning
//!
//! The device captures at whatever rate it supports; the wire wants 16 kHz
//! mono PCM16 in fixed-size blocks. Everything here is stateful across
//! capture batches so block boundaries never fall on resampler seams.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Sample rate expected on the wire
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Samples per outbound audio block (256 ms at 16 kHz)
pub const BLOCK_SAMPLES: usize = 4096;

/// Average interleaved channels down to mono
pub fn downmix_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    let channels = channels as usize;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Convert float samples to little-endian PCM16 bytes.
///
/// Negative values scale by 32768 and positive by 32767 so both rails are
/// reachable without overflow.
pub fn pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let s = sample.clamp(-1.0, 1.0);
        let value = if s < 0.0 {
            (s * 32768.0) as i16
        } else {
            (s * 32767.0) as i16
        };
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Encode a block of float samples as base64 PCM16
pub fn encode_block(samples: &[f32]) -> String {
    BASE64.encode(pcm16_bytes(samples))
}

/// Streaming linear resampler to [`TARGET_SAMPLE_RATE`].
///
/// Keeps the previous source sample and the fractional read position, so
/// feeding the stream in arbitrary chunk sizes produces identical output to
/// feeding it whole.
pub struct LinearResampler {
    src_rate: u32,
    step: f64,
    frac: f64,
    prev: Option<f32>,
}

impl LinearResampler {
    pub fn new(src_rate: u32) -> Self {
        Self {
            src_rate,
            step: src_rate as f64 / TARGET_SAMPLE_RATE as f64,
            frac: 0.0,
            prev: None,
        }
    }

    /// Resample a chunk of mono samples
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.src_rate == TARGET_SAMPLE_RATE {
            return input.to_vec();
        }

        let mut out = Vec::with_capacity((input.len() as f64 / self.step) as usize + 2);

        for &sample in input {
            let prev = match self.prev {
                Some(p) => p,
                None => {
                    self.prev = Some(sample);
                    continue;
                }
            };

            // Emit every output sample that falls between prev and sample
            while self.frac < 1.0 {
                out.push(prev + (sample - prev) * self.frac as f32);
                self.frac += self.step;
            }
            self.frac -= 1.0;
            self.prev = Some(sample);
        }

        out
    }
}

/// Turns raw capture batches into wire-ready audio blocks
pub struct AudioChunker {
    resampler: LinearResampler,
    channels: u16,
    pending: Vec<f32>,
}

impl AudioChunker {
    pub fn new(src_rate: u32, channels: u16) -> Self {
        Self {
            resampler: LinearResampler::new(src_rate),
            channels,
            pending: Vec::with_capacity(BLOCK_SAMPLES * 2),
        }
    }

    /// Feed an interleaved capture batch; returns zero or more full blocks
    /// of [`BLOCK_SAMPLES`] mono samples at the target rate.
    pub fn push(&mut self, interleaved: &[f32]) -> Vec<Vec<f32>> {
        let mono = downmix_mono(interleaved, self.channels);
        self.pending.extend(self.resampler.process(&mono));

        let mut blocks = Vec::new();
        while self.pending.len() >= BLOCK_SAMPLES {
            blocks.push(self.pending.drain(..BLOCK_SAMPLES).collect());
        }
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_rails() {
        let bytes = pcm16_bytes(&[-1.0, 0.0, 1.0]);
        assert_eq!(bytes, [
            (-32768i16).to_le_bytes(),
            0i16.to_le_bytes(),
            32767i16.to_le_bytes(),
        ]
        .concat());
    }

    #[test]
    fn test_pcm16_asymmetric_scaling() {
        let bytes = pcm16_bytes(&[0.5, -0.5]);
        let positive = i16::from_le_bytes([bytes[0], bytes[1]]);
        let negative = i16::from_le_bytes([bytes[2], bytes[3]]);
        assert_eq!(positive, 16383); // 0.5 * 32767
        assert_eq!(negative, -16384); // -0.5 * 32768
    }

    #[test]
    fn test_pcm16_clamps_out_of_range() {
        let bytes = pcm16_bytes(&[3.0, -3.0]);
        assert_eq!(i16::from_le_bytes([bytes[0], bytes[1]]), 32767);
        assert_eq!(i16::from_le_bytes([bytes[2], bytes[3]]), -32768);
    }

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix_mono(&[0.2, 0.4, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.3, 0.0]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let samples = [0.1, 0.2, 0.3];
        assert_eq!(downmix_mono(&samples, 1), samples.to_vec());
    }

    #[test]
    fn test_resampler_passthrough_at_target_rate() {
        let mut resampler = LinearResampler::new(TARGET_SAMPLE_RATE);
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(resampler.process(&input), input);
    }

    #[test]
    fn test_resampler_decimates_48k_by_three() {
        let mut resampler = LinearResampler::new(48000);
        let input: Vec<f32> = (0..4800).map(|i| i as f32).collect();
        let out = resampler.process(&input);

        assert_eq!(out.len(), 1600);
        // 48k -> 16k lands exactly on every third source sample
        for (i, &v) in out.iter().enumerate() {
            assert_eq!(v, (i * 3) as f32);
        }
    }

    #[test]
    fn test_resampler_interpolates_fractional_ratio() {
        let mut resampler = LinearResampler::new(24000);
        // step = 1.5: outputs at source positions 0, 1.5, 3, ...
        let out = resampler.process(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out, vec![0.0, 1.5, 3.0]);
    }

    #[test]
    fn test_resampler_chunking_is_seamless() {
        let input: Vec<f32> = (0..2000).map(|i| (i as f32 * 0.013).sin()).collect();

        let mut whole = LinearResampler::new(44100);
        let expected = whole.process(&input);

        let mut split = LinearResampler::new(44100);
        let mut got = split.process(&input[..700]);
        got.extend(split.process(&input[700..701]));
        got.extend(split.process(&input[701..]));

        assert_eq!(got, expected);
    }

    #[test]
    fn test_chunker_emits_fixed_blocks() {
        let mut chunker = AudioChunker::new(16000, 1);

        // Not enough for a block yet
        assert!(chunker.push(&vec![0.0; 4000]).is_empty());

        // Crosses one block boundary
        let blocks = chunker.push(&vec![0.0; 200]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), BLOCK_SAMPLES);

        // Two blocks at once
        let blocks = chunker.push(&vec![0.0; BLOCK_SAMPLES * 2]);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_chunker_downmixes_and_resamples() {
        // 32 kHz stereo in: halved by downmix pairing, halved again by rate
        let mut chunker = AudioChunker::new(32000, 2);
        let interleaved: Vec<f32> = vec![0.5; 32000 * 2];
        let blocks = chunker.push(&interleaved);

        // One second of input becomes ~16000 mono samples -> 3 full blocks
        assert_eq!(blocks.len(), 16000 / BLOCK_SAMPLES);
        assert!(blocks.iter().all(|b| b.iter().all(|&s| (s - 0.5).abs() < 1e-6)));
    }

    #[test]
    fn test_encode_block_is_base64_pcm() {
        let encoded = encode_block(&[0.0, 0.0]);
        assert_eq!(encoded, BASE64.encode([0u8, 0, 0, 0]));
    }
}
