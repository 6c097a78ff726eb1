//! Capture-source contract and session glue
//!
//! Bridges an external audio-capture source to the analysis pipeline and
//! defines the typed event emitted per delivered buffer. The session runs the
//! analyzer synchronously inside the source's delivery callback; it does not
//! serialize deliveries, that is the consumer's concern.

use thiserror::Error;

use crate::audio::spectrum::{AnalysisSample, SpectralAnalyzer};

/// Errors that can occur when starting audio capture
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no input device available")]
    DeviceUnavailable,

    #[error("input device permission denied")]
    PermissionDenied,

    #[error("capture is already running")]
    AlreadyStarted,

    #[error("no supported input configuration near {0} Hz")]
    NoSupportedConfig(u32),

    #[error("failed to open stream: {0}")]
    Stream(String),
}

/// Buffer-delivery callback registered with a capture source.
///
/// Invoked on the source's capture thread for every delivered buffer.
pub type BufferCallback = Box<dyn FnMut(&[f32]) + Send>;

/// Contract for an external audio-capture collaborator.
///
/// Implementations deliver mono f32 buffers of approximately fixed length at
/// approximately the configured sample rate; exact buffer length is not
/// guaranteed on every call. [`crate::MicrophoneSource`] is the production
/// implementation; tests inject scripted sources.
pub trait CaptureSource {
    /// Set the sample rate used for subsequent capture. Takes effect on the
    /// next `start`.
    fn configure(&mut self, sample_rate_hz: u32);

    /// Begin capture, invoking `on_buffer` for each delivered buffer.
    fn start(&mut self, on_buffer: BufferCallback) -> Result<(), CaptureError>;

    /// Halt capture and unregister the callback. Idempotent. Must not return
    /// while a delivery callback is still executing.
    fn stop(&mut self);
}

/// Typed event emitted by [`CaptureSession`] per delivered buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureEvent {
    /// The buffer was analyzed into a (frequency, loudness) observation.
    Sample(AnalysisSample),
    /// The source delivered an empty buffer. Distinct from "signal present
    /// but frequency unreadable", which shows up as a zero-frequency
    /// [`CaptureEvent::Sample`].
    NoSignal,
}

/// Bridges a [`CaptureSource`] to the analysis pipeline.
///
/// Owns the source's lifetime: one session, one source, at most one active
/// capture at a time.
pub struct CaptureSession {
    source: Box<dyn CaptureSource>,
    running: bool,
}

impl CaptureSession {
    pub fn new(source: Box<dyn CaptureSource>) -> Self {
        Self {
            source,
            running: false,
        }
    }

    /// Reconfigure the source and begin capture.
    ///
    /// Each delivered buffer is handled synchronously on the capture thread:
    /// an empty buffer emits [`CaptureEvent::NoSignal`] without invoking the
    /// analyzer, anything else is analyzed into a [`CaptureEvent::Sample`].
    /// A session that is already running restarts: the previous capture is
    /// stopped before the source is reconfigured.
    pub fn start(
        &mut self,
        sample_rate_hz: u32,
        mut on_event: impl FnMut(CaptureEvent) + Send + 'static,
    ) -> Result<(), CaptureError> {
        if self.running {
            self.stop();
        }

        self.source.configure(sample_rate_hz);

        let mut analyzer = SpectralAnalyzer::new();
        self.source.start(Box::new(move |samples: &[f32]| {
            if samples.is_empty() {
                on_event(CaptureEvent::NoSignal);
            } else {
                on_event(CaptureEvent::Sample(
                    analyzer.analyze(samples, sample_rate_hz),
                ));
            }
        }))?;

        self.running = true;
        tracing::info!(sample_rate_hz, "capture session started");
        Ok(())
    }

    /// Halt the source and unregister the delivery callback. Calling this
    /// when not started is a no-op, not an error.
    pub fn stop(&mut self) {
        if self.running {
            self.source.stop();
            self.running = false;
            tracing::info!("capture session stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Source that synchronously replays queued buffers when started.
    struct ReplaySource {
        buffers: Vec<Vec<f32>>,
        fail_start: bool,
        stop_count: Arc<Mutex<u32>>,
    }

    impl ReplaySource {
        fn new(buffers: Vec<Vec<f32>>) -> Self {
            Self {
                buffers,
                fail_start: false,
                stop_count: Arc::new(Mutex::new(0)),
            }
        }
    }

    impl CaptureSource for ReplaySource {
        fn configure(&mut self, _sample_rate_hz: u32) {}

        fn start(&mut self, mut on_buffer: BufferCallback) -> Result<(), CaptureError> {
            if self.fail_start {
                return Err(CaptureError::DeviceUnavailable);
            }
            for buffer in &self.buffers {
                on_buffer(buffer);
            }
            Ok(())
        }

        fn stop(&mut self) {
            *self.stop_count.lock().unwrap() += 1;
        }
    }

    fn collect_events(buffers: Vec<Vec<f32>>) -> Vec<CaptureEvent> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let mut session = CaptureSession::new(Box::new(ReplaySource::new(buffers)));
        session
            .start(44_100, move |event| sink.lock().unwrap().push(event))
            .unwrap();

        let collected = events.lock().unwrap().clone();
        collected
    }

    #[test]
    fn test_empty_buffer_emits_no_signal() {
        let events = collect_events(vec![vec![]]);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0], CaptureEvent::NoSignal);
    }

    #[test]
    fn test_non_empty_buffer_is_analyzed() {
        let events = collect_events(vec![vec![0.5; 1024]]);

        assert_eq!(events.len(), 1);
        match events[0] {
            CaptureEvent::Sample(sample) => {
                assert!(sample.loudness_db.is_finite());
                assert!(sample.frequency_hz > 0.0);
            }
            CaptureEvent::NoSignal => panic!("expected an analyzed sample"),
        }
    }

    #[test]
    fn test_mixed_buffers_keep_delivery_order() {
        let events = collect_events(vec![vec![], vec![0.5; 256], vec![]]);

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], CaptureEvent::NoSignal);
        assert!(matches!(events[1], CaptureEvent::Sample(_)));
        assert_eq!(events[2], CaptureEvent::NoSignal);
    }

    #[test]
    fn test_failed_start_leaves_session_stopped() {
        let mut source = ReplaySource::new(vec![]);
        source.fail_start = true;

        let mut session = CaptureSession::new(Box::new(source));
        let result = session.start(44_100, |_| {});

        assert!(matches!(result, Err(CaptureError::DeviceUnavailable)));
        assert!(!session.is_running());
    }

    #[test]
    fn test_restart_stops_previous_capture() {
        let source = ReplaySource::new(vec![]);
        let stop_count = Arc::clone(&source.stop_count);

        let mut session = CaptureSession::new(Box::new(source));
        session.start(44_100, |_| {}).unwrap();
        session.start(48_000, |_| {}).unwrap();

        assert_eq!(
            *stop_count.lock().unwrap(),
            1,
            "second start must stop the first capture"
        );
        assert!(session.is_running());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let source = ReplaySource::new(vec![]);
        let stop_count = Arc::clone(&source.stop_count);

        let mut session = CaptureSession::new(Box::new(source));
        session.start(44_100, |_| {}).unwrap();
        session.stop();
        session.stop();

        assert_eq!(*stop_count.lock().unwrap(), 1);
        assert!(!session.is_running());
    }

    #[test]
    fn test_stop_before_start_is_a_no_op() {
        let source = ReplaySource::new(vec![]);
        let stop_count = Arc::clone(&source.stop_count);

        let mut session = CaptureSession::new(Box::new(source));
        session.stop();

        assert_eq!(*stop_count.lock().unwrap(), 0);
    }
}
