//! Microphone capture using cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleRate, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread;

use crate::config::AudioConfig;
use crate::error::{AudioError, KinefieldError};

/// Microphone capture from an input device
///
/// cpal::Stream is not Send, so the stream lives on a dedicated thread and
/// samples cross over a bounded crossbeam channel. Dropping the capture
/// stops the stream and joins the thread, which releases the device.
pub struct MicCapture {
    sample_rx: Receiver<Vec<f32>>,
    stop_tx: Sender<()>,
    config: StreamConfig,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MicCapture {
    /// Open the configured device and start capturing
    pub fn new(config: &AudioConfig) -> Result<Self, KinefieldError> {
        let host = cpal::default_host();

        // Find the requested device
        let device = if config.device == "default" {
            host.default_input_device()
                .ok_or(AudioError::NoDefaultInput)?
        } else {
            find_device_by_name(&host, &config.device)?
        };

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        tracing::info!("Using audio device: {}", device_name);

        let (stream_config, sample_format) = negotiate_config(&device, config)?;

        tracing::debug!(
            "Stream config: {} Hz, {} channels, format {:?}",
            stream_config.sample_rate.0,
            stream_config.channels,
            sample_format
        );

        // Create channels for samples and stop signal
        let (sample_tx, sample_rx) = bounded::<Vec<f32>>(32);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let stream_config_clone = stream_config.clone();

        // Spawn the audio thread
        let thread_handle = thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                run_audio_thread(device, stream_config_clone, sample_format, sample_tx, stop_rx);
            })
            .map_err(|e| AudioError::StreamBuild(format!("Failed to spawn audio thread: {}", e)))?;

        Ok(Self {
            sample_rx,
            stop_tx,
            config: stream_config,
            thread_handle: Some(thread_handle),
        })
    }

    /// Get the next batch of interleaved samples (non-blocking)
    pub async fn get_samples(&self) -> Result<Vec<f32>, KinefieldError> {
        match self.sample_rx.try_recv() {
            Ok(samples) => Ok(samples),
            Err(crossbeam_channel::TryRecvError::Empty) => {
                // No samples ready, that's fine
                tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                Err(AudioError::StreamBuild("Stream disconnected".to_string()).into())
            }
        }
    }

    /// Get the stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The rate the device is actually capturing at
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Number of interleaved channels in each sample batch
    pub fn channels(&self) -> u16 {
        self.config.channels
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Pick a stream config for the device.
///
/// Prefers the configured rate and channel count; otherwise falls back to
/// the device default, since the session resamples whatever we capture.
fn negotiate_config(
    device: &Device,
    config: &AudioConfig,
) -> Result<(StreamConfig, cpal::SampleFormat), KinefieldError> {
    let exact = device
        .supported_input_configs()
        .map_err(|e| AudioError::UnsupportedConfig(e.to_string()))?
        .filter(|c| c.channels() == config.channels)
        .find(|c| {
            c.min_sample_rate() <= SampleRate(config.sample_rate)
                && c.max_sample_rate() >= SampleRate(config.sample_rate)
        });

    if let Some(supported) = exact {
        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(config.buffer_size),
        };
        return Ok((stream_config, supported.sample_format()));
    }

    let default = device
        .default_input_config()
        .map_err(|e| AudioError::UnsupportedConfig(e.to_string()))?;
    let sample_format = default.sample_format();
    let mut stream_config: StreamConfig = default.into();
    stream_config.buffer_size = cpal::BufferSize::Default;

    tracing::debug!(
        "Requested config unavailable, using device default: {} Hz, {} channels",
        stream_config.sample_rate.0,
        stream_config.channels
    );

    Ok((stream_config, sample_format))
}

/// Run the audio capture in a dedicated thread
fn run_audio_thread(
    device: Device,
    config: StreamConfig,
    sample_format: cpal::SampleFormat,
    sample_tx: Sender<Vec<f32>>,
    stop_rx: Receiver<()>,
) {
    let stream = match build_input_stream(&device, &config, sample_format, sample_tx) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to build audio stream: {}", e);
            return;
        }
    };

    if let Err(e) = stream.play() {
        tracing::error!("Failed to start audio stream: {}", e);
        return;
    }

    tracing::debug!("Mic capture thread started");

    // Wait for stop signal
    let _ = stop_rx.recv();

    tracing::debug!("Mic capture thread stopping");
    drop(stream);
}

/// Find an audio device by name
fn find_device_by_name(host: &cpal::Host, name: &str) -> Result<Device, KinefieldError> {
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;

    for device in devices {
        if let Ok(device_name) = device.name() {
            if device_name.contains(name) || name.contains(&device_name) {
                return Ok(device);
            }
        }
    }

    Err(AudioError::NoDeviceFound.into())
}

/// Build input stream based on sample format
fn build_input_stream(
    device: &Device,
    config: &StreamConfig,
    sample_format: cpal::SampleFormat,
    tx: Sender<Vec<f32>>,
) -> Result<Stream, KinefieldError> {
    match sample_format {
        cpal::SampleFormat::F32 => build_typed_stream::<f32>(device, config, tx),
        cpal::SampleFormat::I16 => build_typed_stream::<i16>(device, config, tx),
        cpal::SampleFormat::U16 => build_typed_stream::<u16>(device, config, tx),
        cpal::SampleFormat::I8 => build_typed_stream::<i8>(device, config, tx),
        cpal::SampleFormat::U8 => build_typed_stream::<u8>(device, config, tx),
        cpal::SampleFormat::I32 => build_typed_stream::<i32>(device, config, tx),
        cpal::SampleFormat::F64 => build_typed_stream::<f64>(device, config, tx),
        other => Err(AudioError::UnsupportedConfig(format!(
            "Unsupported sample format: {:?}",
            other
        ))
        .into()),
    }
}

fn build_typed_stream<T>(
    device: &Device,
    config: &StreamConfig,
    tx: Sender<Vec<f32>>,
) -> Result<Stream, KinefieldError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let err_fn = |err| tracing::error!("Audio stream error: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> = data.iter().map(|&s| f32::from_sample(s)).collect();
                let _ = tx.try_send(samples);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamBuild(e.to_string()).into())
}

/// List all available input devices
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(input_devices) = host.input_devices() {
        for device in input_devices {
            if let Ok(name) = device.name() {
                devices.push(name);
            }
        }
    }

    devices
}

/// Get the default input device name
pub fn default_input_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_input_device()
        .and_then(|d| d.name().ok())
}
