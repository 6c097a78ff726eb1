//! Session orchestration and result publishing
//!
//! Owns the capture session and the active evaluator, publishes each
//! classified result through the sink contract, and keeps the latest
//! snapshot readable from any thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::capture::{CaptureError, CaptureSession, CaptureSource};
use crate::tuning::catalog::ToneCatalog;
use crate::tuning::evaluator::{TuningEvaluator, TuningResult};
use crate::{DEFAULT_LOUDNESS_FLOOR_DB, DEFAULT_SAMPLE_RATE};

/// Sink receiving classified results.
///
/// Invoked at most once per classified sample, on the capture thread. The
/// sink is responsible for its own marshaling when the consumer needs a
/// particular execution context.
pub trait ResultSink: Send + Sync {
    fn publish(&self, result: &TuningResult);
}

impl<F> ResultSink for F
where
    F: Fn(&TuningResult) + Send + Sync,
{
    fn publish(&self, result: &TuningResult) {
        self(result)
    }
}

/// Bounded-channel hand-off for consumers that drain results on their own
/// thread.
///
/// Publishing never blocks the capture thread; when the consumer falls
/// behind, new results are dropped until the queue drains (the latest
/// snapshot stays available through [`Tuner::current_result`]).
pub struct ChannelSink {
    tx: crossbeam_channel::Sender<TuningResult>,
}

impl ChannelSink {
    /// Create a sink and its receiving end with the given capacity.
    pub fn bounded(capacity: usize) -> (Self, crossbeam_channel::Receiver<TuningResult>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn publish(&self, result: &TuningResult) {
        if self.tx.try_send(result.clone()).is_err() {
            tracing::trace!("result queue full, dropping");
        }
    }
}

/// Orchestrates one tuning session at a time.
///
/// The capture source and the result sink are injected; the tuner wires the
/// evaluator between them and manages the session lifecycle.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use stringtuner_core::{MicrophoneSource, ToneCatalog, Tuner, TuningResult};
///
/// let sink = Arc::new(|result: &TuningResult| println!("{:?}", result.status));
/// let mut tuner = Tuner::new(Box::new(MicrophoneSource::new()), sink);
/// tuner.start_tuning(ToneCatalog::ukulele()).unwrap();
/// ```
pub struct Tuner {
    session: CaptureSession,
    sink: Arc<dyn ResultSink>,
    sample_rate_hz: u32,
    loudness_floor_db: f32,
    latest: Arc<Mutex<TuningResult>>,
    publish_gate: Option<Arc<AtomicBool>>,
}

impl Tuner {
    pub fn new(source: Box<dyn CaptureSource>, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            session: CaptureSession::new(source),
            sink,
            sample_rate_hz: DEFAULT_SAMPLE_RATE,
            loudness_floor_db: DEFAULT_LOUDNESS_FLOOR_DB,
            latest: Arc::new(Mutex::new(TuningResult::default())),
            publish_gate: None,
        }
    }

    /// Set the capture sample rate. Takes effect on the next start.
    pub fn set_sample_rate(&mut self, rate: u32) {
        if (8_000..=192_000).contains(&rate) {
            self.sample_rate_hz = rate;
        }
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Set the audibility floor in dBFS. Takes effect on the next start.
    pub fn set_loudness_floor_db(&mut self, floor_db: f32) {
        self.loudness_floor_db = floor_db;
    }

    pub fn is_listening(&self) -> bool {
        self.publish_gate.is_some()
    }

    /// The latest published snapshot; [`TuningResult::default`] when no
    /// session is active. Never a partially written value.
    pub fn current_result(&self) -> TuningResult {
        self.latest
            .lock()
            .map(|result| result.clone())
            .unwrap_or_default()
    }

    /// Install `catalog` as the active tuning and begin capturing.
    ///
    /// A session that is already listening is stopped first; two delivery
    /// callbacks never run against one evaluator. On failure the tuner
    /// remains idle and the error surfaces to the caller, who may retry.
    pub fn start_tuning(&mut self, catalog: ToneCatalog) -> Result<(), CaptureError> {
        self.stop_tuning();

        let catalog_name = catalog.name().to_string();
        let mut evaluator = TuningEvaluator::new(catalog, self.loudness_floor_db);
        let gate = Arc::new(AtomicBool::new(true));
        let callback_gate = Arc::clone(&gate);
        let latest = Arc::clone(&self.latest);
        let sink = Arc::clone(&self.sink);

        if let Ok(mut current) = self.latest.lock() {
            *current = TuningResult::listening();
        }

        let started = self.session.start(self.sample_rate_hz, move |event| {
            if !callback_gate.load(Ordering::Acquire) {
                return;
            }
            if let Some(result) = evaluator.evaluate(&event) {
                if let Ok(mut current) = latest.lock() {
                    *current = result.clone();
                }
                sink.publish(&result);
            }
        });

        match started {
            Ok(()) => {
                self.publish_gate = Some(gate);
                tracing::info!(catalog = %catalog_name, "tuning started");
                Ok(())
            }
            Err(err) => {
                if let Ok(mut current) = self.latest.lock() {
                    *current = TuningResult::default();
                }
                tracing::warn!(%err, "tuning failed to start");
                Err(err)
            }
        }
    }

    /// Stop the active session and reset to idle.
    ///
    /// The publish gate closes before the source halts, so no result reaches
    /// the sink after this returns. Idempotent, and safe to call from a
    /// thread other than the delivery thread.
    pub fn stop_tuning(&mut self) {
        let was_listening = self.publish_gate.is_some();
        if let Some(gate) = self.publish_gate.take() {
            gate.store(false, Ordering::Release);
        }
        self.session.stop();
        if let Ok(mut current) = self.latest.lock() {
            *current = TuningResult::default();
        }
        if was_listening {
            tracing::info!("tuning stopped");
        }
    }
}

impl Drop for Tuner {
    fn drop(&mut self) {
        self.stop_tuning();
    }
}
