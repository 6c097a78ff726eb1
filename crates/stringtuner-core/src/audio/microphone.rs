//! Microphone capture via cpal
//!
//! Production [`CaptureSource`]: captures from the default input device,
//! downmixes interleaved frames to mono, and delivers fixed-size frames to
//! the registered callback on cpal's capture thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;

use crate::audio::capture::{BufferCallback, CaptureError, CaptureSource};
use crate::{DEFAULT_SAMPLE_RATE, FRAME_SIZE};

/// Microphone-backed capture source using the default cpal host.
pub struct MicrophoneSource {
    sample_rate_hz: u32,
    stream: Option<cpal::Stream>,
}

impl MicrophoneSource {
    pub fn new() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE,
            stream: None,
        }
    }

    /// The sample rate the next `start` will request.
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Pick the f32 input config whose rate range lies closest to the target,
    /// preferring mono so no downmix is needed.
    fn find_supported_config(
        configs: Vec<SupportedStreamConfigRange>,
        target_rate: u32,
    ) -> Option<SupportedStreamConfigRange> {
        let (mono, other): (Vec<_>, Vec<_>) = configs
            .into_iter()
            .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
            .partition(|c| c.channels() == 1);

        let nearest = |candidates: Vec<SupportedStreamConfigRange>| {
            candidates.into_iter().min_by_key(|c| {
                let min_diff = (i64::from(c.min_sample_rate().0) - i64::from(target_rate)).abs();
                let max_diff = (i64::from(c.max_sample_rate().0) - i64::from(target_rate)).abs();
                min_diff.min(max_diff)
            })
        };

        nearest(mono).or_else(|| nearest(other))
    }
}

impl CaptureSource for MicrophoneSource {
    fn configure(&mut self, sample_rate_hz: u32) {
        self.sample_rate_hz = sample_rate_hz;
    }

    fn start(&mut self, mut on_buffer: BufferCallback) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::DeviceUnavailable)?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let configs = device
            .supported_input_configs()
            .map_err(|e| CaptureError::Stream(e.to_string()))?
            .collect::<Vec<_>>();
        let supported = Self::find_supported_config(configs, self.sample_rate_hz)
            .ok_or(CaptureError::NoSupportedConfig(self.sample_rate_hz))?;

        let sample_rate = self
            .sample_rate_hz
            .clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
        let supported = supported.with_sample_rate(cpal::SampleRate(sample_rate));
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.into();

        // Accumulates downmixed samples until a full frame is ready; cpal
        // gives no guarantee about its own callback sizes.
        let mut pending: Vec<f32> = Vec::with_capacity(FRAME_SIZE * 2);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks(channels) {
                        pending.push(frame.iter().sum::<f32>() / channels as f32);
                    }
                    while pending.len() >= FRAME_SIZE {
                        on_buffer(&pending[..FRAME_SIZE]);
                        pending.drain(..FRAME_SIZE);
                    }
                },
                |err| {
                    tracing::error!(%err, "input stream error");
                },
                None,
            )
            .map_err(CaptureError::from)?;

        stream.play().map_err(CaptureError::from)?;

        tracing::info!(
            device = %device_name,
            sample_rate,
            channels,
            "microphone capture started"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        // Dropping the stream halts capture and unregisters the callback.
        if self.stream.take().is_some() {
            tracing::info!("microphone capture stopped");
        }
    }
}

impl Default for MicrophoneSource {
    fn default() -> Self {
        Self::new()
    }
}

impl From<cpal::BuildStreamError> for CaptureError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
            other => CaptureError::Stream(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for CaptureError {
    fn from(err: cpal::PlayStreamError) -> Self {
        match err {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable,
            other => CaptureError::Stream(other.to_string()),
        }
    }
}
