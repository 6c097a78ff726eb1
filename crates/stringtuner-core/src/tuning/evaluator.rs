//! The tuning state machine
//!
//! Consumes capture events against the active catalog and decides, per
//! accepted sample, whether the nearest target tone is in tune. Samples that
//! are inaudible or outside the catalog band are discarded without producing
//! a result; the previous result stays current.

use serde::Serialize;

use crate::audio::capture::CaptureEvent;
use crate::tuning::catalog::{Tone, ToneCatalog};

/// Externally visible tuning status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TuningStatus {
    /// No active session
    Idle,
    /// Session active, no classifiable sample yet
    Listening,
    /// The nearest tone is outside the match threshold
    NeedsTuning,
    /// The nearest tone is within the match threshold
    InTune,
    /// Signal present but its frequency could not be determined
    AnalysisError,
}

/// One classification, replaced wholesale per classified sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningResult {
    pub status: TuningStatus,
    /// The nearest catalog tone, present for `NeedsTuning` and `InTune`
    pub matched_tone: Option<Tone>,
    pub observed_frequency_hz: f32,
    /// Observed minus target when a tone is matched; otherwise the observed
    /// frequency relative to no target
    pub signed_deviation_hz: f32,
}

impl TuningResult {
    fn unmatched(status: TuningStatus, observed_frequency_hz: f32) -> Self {
        Self {
            status,
            matched_tone: None,
            observed_frequency_hz,
            signed_deviation_hz: observed_frequency_hz,
        }
    }

    /// The value a freshly started session reports before any sample lands.
    pub(crate) fn listening() -> Self {
        Self::unmatched(TuningStatus::Listening, 0.0)
    }
}

impl Default for TuningResult {
    /// The resting value: no session, no observation.
    fn default() -> Self {
        Self::unmatched(TuningStatus::Idle, 0.0)
    }
}

/// Per-sample decision machine for one tuning session.
///
/// Owns the active catalog for the session's lifetime. `evaluate` runs
/// synchronously on the delivery thread and never blocks; a `None` return
/// means the event was discarded.
pub struct TuningEvaluator {
    catalog: ToneCatalog,
    loudness_floor_db: f32,
    last_status: TuningStatus,
}

impl TuningEvaluator {
    pub fn new(catalog: ToneCatalog, loudness_floor_db: f32) -> Self {
        Self {
            catalog,
            loudness_floor_db,
            last_status: TuningStatus::Listening,
        }
    }

    pub fn catalog(&self) -> &ToneCatalog {
        &self.catalog
    }

    pub fn loudness_floor_db(&self) -> f32 {
        self.loudness_floor_db
    }

    /// Classify one capture event.
    ///
    /// - `NoSignal`, or an audible sample whose frequency came back as 0.0,
    ///   classifies as [`TuningStatus::AnalysisError`]. Capture continues;
    ///   the next sample may succeed.
    /// - A sample at or below the loudness floor, or with a readable
    ///   frequency outside the catalog band, is discarded: no result, no
    ///   status change.
    /// - Anything else matches the nearest catalog tone and splits on the
    ///   match threshold into `InTune` or `NeedsTuning`.
    pub fn evaluate(&mut self, event: &CaptureEvent) -> Option<TuningResult> {
        let result = match event {
            CaptureEvent::NoSignal => {
                TuningResult::unmatched(TuningStatus::AnalysisError, 0.0)
            }
            CaptureEvent::Sample(sample) => {
                // An unreadable frequency with audible loudness is an
                // analysis failure, not a band rejection; checked before the
                // gate because 0.0 Hz lies outside every band.
                if sample.frequency_hz == 0.0 {
                    if sample.loudness_db > self.loudness_floor_db {
                        TuningResult::unmatched(TuningStatus::AnalysisError, 0.0)
                    } else {
                        return None;
                    }
                } else if sample.loudness_db <= self.loudness_floor_db
                    || !self.catalog.in_band(sample.frequency_hz)
                {
                    tracing::trace!(
                        frequency_hz = sample.frequency_hz,
                        loudness_db = sample.loudness_db,
                        "sample discarded"
                    );
                    return None;
                } else {
                    self.classify(sample.frequency_hz)
                }
            }
        };

        if result.status != self.last_status {
            tracing::debug!(from = ?self.last_status, to = ?result.status, "status changed");
            self.last_status = result.status;
        }
        Some(result)
    }

    fn classify(&self, frequency_hz: f32) -> TuningResult {
        let (nearest, min_diff) = self.catalog.nearest(frequency_hz);
        let status = if min_diff <= self.catalog.match_threshold_hz() {
            TuningStatus::InTune
        } else {
            TuningStatus::NeedsTuning
        };

        TuningResult {
            status,
            matched_tone: Some(nearest.clone()),
            observed_frequency_hz: frequency_hz,
            signed_deviation_hz: frequency_hz - nearest.frequency_hz,
        }
    }
}
