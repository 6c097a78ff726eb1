//! Stringtuner Core - audio capture, spectral analysis, and tuning classification
//!
//! This library is the headless core of an instrument tuner. It captures audio
//! buffers from an injectable source, estimates the dominant frequency and
//! loudness of each buffer, and classifies the estimate against a catalog of
//! target tones. It contains no UI code; results are pushed outward through a
//! sink contract and the latest snapshot stays readable from any thread.

pub mod audio;
pub mod tuning;

pub use audio::capture::{
    BufferCallback, CaptureError, CaptureEvent, CaptureSession, CaptureSource,
};
pub use audio::microphone::MicrophoneSource;
pub use audio::signal::ToneGenerator;
pub use audio::spectrum::{AnalysisSample, SpectralAnalyzer};
pub use tuning::catalog::{CatalogError, Tone, ToneCatalog};
pub use tuning::evaluator::{TuningEvaluator, TuningResult, TuningStatus};
pub use tuning::tuner::{ChannelSink, ResultSink, Tuner};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default sample rate for audio capture (CD quality)
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Nominal samples per delivered buffer (~23ms at 44.1kHz)
pub const FRAME_SIZE: usize = 1024;

/// Default audibility floor in dBFS; quieter observations are discarded as noise
pub const DEFAULT_LOUDNESS_FLOOR_DB: f32 = -40.0;
