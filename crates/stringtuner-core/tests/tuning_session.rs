//! Integration tests for a full tuning session
//!
//! Drives the complete pipeline (capture source, spectral analysis, tuning
//! evaluation, result hand-off) with a scripted source delivering synthetic
//! frames from its own thread, the way a real device callback would.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use stringtuner_core::{
    BufferCallback, CaptureError, CaptureSource, ChannelSink, ToneCatalog, ToneGenerator, Tuner,
    TuningStatus, DEFAULT_SAMPLE_RATE,
};

type SharedCallback = Arc<Mutex<Option<BufferCallback>>>;

/// Capture source that replays scripted frames from a background thread.
///
/// `stop` takes the callback back under the delivery lock, so it cannot
/// return while a frame is mid-delivery.
struct ScriptedSource {
    frames: Vec<Vec<f32>>,
    callback: SharedCallback,
    worker: Option<thread::JoinHandle<()>>,
}

impl ScriptedSource {
    fn new(frames: Vec<Vec<f32>>) -> Self {
        Self {
            frames,
            callback: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }
}

impl CaptureSource for ScriptedSource {
    fn configure(&mut self, _sample_rate_hz: u32) {}

    fn start(&mut self, on_buffer: BufferCallback) -> Result<(), CaptureError> {
        if self.worker.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        *self.callback.lock().unwrap() = Some(on_buffer);

        let frames = self.frames.clone();
        let callback = Arc::clone(&self.callback);
        self.worker = Some(thread::spawn(move || {
            for frame in &frames {
                let mut slot = callback.lock().unwrap();
                match slot.as_mut() {
                    Some(deliver) => deliver(frame),
                    None => break,
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        self.callback.lock().unwrap().take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// A frame whose dominant frequency lands exactly on an FFT bin near the
/// requested frequency.
fn bin_centered_frame(frequency_hz: f32, len: usize) -> Vec<f32> {
    let bin_width = DEFAULT_SAMPLE_RATE as f32 / len as f32;
    let bin_freq = (frequency_hz / bin_width).round() * bin_width;
    let mut gen = ToneGenerator::new(DEFAULT_SAMPLE_RATE, bin_freq);
    let mut frame = vec![0.0f32; len];
    gen.fill_buffer(&mut frame);
    frame
}

#[test]
fn test_scripted_session_classifies_each_frame() {
    // One in-tune frame near G4, one detuned frame, one out-of-band frame,
    // one empty frame.
    let frames = vec![
        bin_centered_frame(390.0, 4096),
        bin_centered_frame(409.0, 4096),
        bin_centered_frame(600.0, 4096),
        Vec::new(),
    ];

    let (sink, rx) = ChannelSink::bounded(32);
    let mut tuner = Tuner::new(Box::new(ScriptedSource::new(frames)), Arc::new(sink));
    tuner.start_tuning(ToneCatalog::ukulele()).unwrap();

    let mut statuses = Vec::new();
    while let Ok(result) = rx.recv_timeout(Duration::from_secs(2)) {
        statuses.push((result.status, result.matched_tone.map(|t| t.pitch_label)));
        if statuses.len() == 3 {
            break;
        }
    }
    tuner.stop_tuning();

    // The out-of-band frame is discarded, so three results arrive.
    assert_eq!(
        statuses,
        vec![
            (TuningStatus::InTune, Some("G4".to_string())),
            (TuningStatus::NeedsTuning, Some("G4".to_string())),
            (TuningStatus::AnalysisError, None),
        ]
    );
    assert_eq!(tuner.current_result().status, TuningStatus::Idle);
}

#[test]
fn test_restart_with_a_different_catalog() {
    // First session: ukulele frames. Second session: a guitar G3 frame that
    // the ukulele band would have discarded.
    let first_frames = vec![bin_centered_frame(390.0, 4096)];
    let second_frames = vec![bin_centered_frame(196.0, 4096)];

    let (sink, rx) = ChannelSink::bounded(32);
    let sink = Arc::new(sink);

    let mut tuner = Tuner::new(
        Box::new(ScriptedSource::new(first_frames)),
        Arc::clone(&sink) as Arc<dyn stringtuner_core::ResultSink>,
    );
    tuner.start_tuning(ToneCatalog::ukulele()).unwrap();
    let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(first.matched_tone.unwrap().pitch_label, "G4");
    tuner.stop_tuning();
    drop(tuner);

    let mut tuner = Tuner::new(Box::new(ScriptedSource::new(second_frames)), sink);
    tuner.start_tuning(ToneCatalog::guitar()).unwrap();
    let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(second.matched_tone.unwrap().pitch_label, "G3");
    assert_eq!(second.status, TuningStatus::InTune);
}

#[test]
fn test_concurrent_stop_halts_publishing() {
    // A long stream of valid frames; stop while deliveries are in flight
    // and verify nothing lands afterwards.
    let frames = vec![bin_centered_frame(390.0, 1024); 5_000];

    let published = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&published);
    let sink: Arc<dyn stringtuner_core::ResultSink> =
        Arc::new(move |_result: &stringtuner_core::TuningResult| {
            *counter.lock().unwrap() += 1;
        });

    let mut tuner = Tuner::new(Box::new(ScriptedSource::new(frames)), sink);
    tuner.start_tuning(ToneCatalog::ukulele()).unwrap();

    // Wait for the stream to be flowing before stopping.
    let wait_started = std::time::Instant::now();
    while *published.lock().unwrap() == 0 {
        assert!(
            wait_started.elapsed() < Duration::from_secs(5),
            "no results arrived before the stop"
        );
        thread::yield_now();
    }

    tuner.stop_tuning();
    let count_at_stop = *published.lock().unwrap();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(
        *published.lock().unwrap(),
        count_at_stop,
        "no result may be published after stop_tuning returns"
    );
    assert_eq!(tuner.current_result().status, TuningStatus::Idle);
}

#[test]
fn test_stop_without_start_and_double_stop_are_no_ops() {
    let (sink, _rx) = ChannelSink::bounded(8);
    let mut tuner = Tuner::new(Box::new(ScriptedSource::new(Vec::new())), Arc::new(sink));

    tuner.stop_tuning();
    assert_eq!(tuner.current_result().status, TuningStatus::Idle);

    tuner.start_tuning(ToneCatalog::ukulele()).unwrap();
    tuner.stop_tuning();
    tuner.stop_tuning();
    assert_eq!(tuner.current_result().status, TuningStatus::Idle);
    assert!(!tuner.is_listening());
}

#[test]
fn test_quiet_frames_never_reach_the_sink() {
    // Frames carry a clear pitch but sit far below the audibility floor.
    let mut quiet = bin_centered_frame(390.0, 4096);
    for sample in &mut quiet {
        *sample *= 0.001; // about -69 dBFS
    }
    let frames = vec![quiet; 10];

    let (sink, rx) = ChannelSink::bounded(32);
    let mut tuner = Tuner::new(Box::new(ScriptedSource::new(frames)), Arc::new(sink));
    tuner.start_tuning(ToneCatalog::ukulele()).unwrap();

    assert!(
        rx.recv_timeout(Duration::from_millis(200)).is_err(),
        "inaudible frames must be silently discarded"
    );
    assert_eq!(tuner.current_result().status, TuningStatus::Listening);
    tuner.stop_tuning();
}
