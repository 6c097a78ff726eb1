//! Tuning catalogs: target tones, valid band, match threshold
//!
//! A catalog describes one instrument tuning. It is constructed once at
//! session start, validated eagerly, and immutable thereafter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by catalog validation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("catalog '{0}' has no tones")]
    EmptyTones(String),

    #[error("catalog '{name}' has an invalid frequency band: [{low}, {high}]")]
    InvalidBand { name: String, low: f32, high: f32 },

    #[error("catalog '{name}' has a non-positive match threshold: {threshold}")]
    InvalidThreshold { name: String, threshold: f32 },
}

/// One target tone of a tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    /// Scientific pitch label, e.g. "G4"
    pub pitch_label: String,
    /// Display name, e.g. "SOL"
    pub name: String,
    /// Target frequency in Hz
    pub frequency_hz: f32,
    /// Free-form description shown to the user
    pub detail: String,
}

impl Tone {
    pub fn new(pitch_label: &str, name: &str, frequency_hz: f32, detail: &str) -> Self {
        Self {
            pitch_label: pitch_label.to_string(),
            name: name.to_string(),
            frequency_hz,
            detail: detail.to_string(),
        }
    }
}

/// A named tuning: ordered target tones, the band of observed frequencies
/// worth classifying, and the in-tune threshold.
///
/// The band restricts which *observed* samples are considered; tone
/// frequencies themselves may lie outside it. Fields are private so the
/// validating constructor is the only construction path, including through
/// deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CatalogDef")]
pub struct ToneCatalog {
    name: String,
    tones: Vec<Tone>,
    valid_band_low_hz: f32,
    valid_band_high_hz: f32,
    match_threshold_hz: f32,
}

impl ToneCatalog {
    /// Validate and build a catalog.
    ///
    /// Fails fast on an empty tone list, a band that is not a strictly
    /// ordered finite pair, or a threshold that is not strictly positive.
    pub fn new(
        name: impl Into<String>,
        tones: Vec<Tone>,
        valid_band_low_hz: f32,
        valid_band_high_hz: f32,
        match_threshold_hz: f32,
    ) -> Result<Self, CatalogError> {
        let name = name.into();
        if tones.is_empty() {
            return Err(CatalogError::EmptyTones(name));
        }
        // Negated comparisons so NaN bounds fail validation too.
        if !(valid_band_low_hz < valid_band_high_hz) {
            return Err(CatalogError::InvalidBand {
                name,
                low: valid_band_low_hz,
                high: valid_band_high_hz,
            });
        }
        if !(match_threshold_hz > 0.0) {
            return Err(CatalogError::InvalidThreshold {
                name,
                threshold: match_threshold_hz,
            });
        }

        tracing::debug!(catalog = %name, tones = tones.len(), "catalog validated");
        Ok(Self {
            name,
            tones,
            valid_band_low_hz,
            valid_band_high_hz,
            match_threshold_hz,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tones(&self) -> &[Tone] {
        &self.tones
    }

    pub fn valid_band_low_hz(&self) -> f32 {
        self.valid_band_low_hz
    }

    pub fn valid_band_high_hz(&self) -> f32 {
        self.valid_band_high_hz
    }

    pub fn match_threshold_hz(&self) -> f32 {
        self.match_threshold_hz
    }

    /// True when `frequency_hz` lies inside the valid capture band.
    pub fn in_band(&self, frequency_hz: f32) -> bool {
        (self.valid_band_low_hz..=self.valid_band_high_hz).contains(&frequency_hz)
    }

    /// The catalog tone nearest to `frequency_hz`, with the absolute
    /// deviation. Ties resolve to the earlier tone in catalog order.
    pub fn nearest(&self, frequency_hz: f32) -> (&Tone, f32) {
        let mut nearest = &self.tones[0];
        let mut min_diff = (frequency_hz - nearest.frequency_hz).abs();
        for tone in &self.tones[1..] {
            let diff = (frequency_hz - tone.frequency_hz).abs();
            if diff < min_diff {
                min_diff = diff;
                nearest = tone;
            }
        }
        (nearest, min_diff)
    }

    /// Standard ukulele tuning (reentrant gCEA).
    pub fn ukulele() -> Self {
        let tones = vec![
            Tone::new("G4", "SOL", 392.0, "Sol of C"),
            Tone::new("C4", "DO", 261.0, "Do of C"),
            Tone::new("E4", "MI", 329.63, "Mi of C"),
            Tone::new("A4", "LA", 440.0, "La of C"),
        ];
        match Self::new("Ukulele", tones, 200.0, 500.0, 5.0) {
            Ok(catalog) => catalog,
            Err(_) => unreachable!("preset values satisfy the catalog invariants"),
        }
    }

    /// Standard guitar tuning (EADGBE).
    pub fn guitar() -> Self {
        let tones = vec![
            Tone::new("E2", "MI", 82.41, "Low E"),
            Tone::new("A2", "LA", 110.0, "A"),
            Tone::new("D3", "RE", 146.83, "D"),
            Tone::new("G3", "SOL", 196.0, "G"),
            Tone::new("B3", "SI", 246.94, "B"),
            Tone::new("E4", "MI", 329.63, "High E"),
        ];
        match Self::new("Guitar", tones, 70.0, 400.0, 3.0) {
            Ok(catalog) => catalog,
            Err(_) => unreachable!("preset values satisfy the catalog invariants"),
        }
    }
}

/// Raw catalog shape accepted from deserialization, routed through
/// [`ToneCatalog::new`] so the invariants hold for every construction path.
#[derive(Deserialize)]
struct CatalogDef {
    name: String,
    tones: Vec<Tone>,
    valid_band_low_hz: f32,
    valid_band_high_hz: f32,
    match_threshold_hz: f32,
}

impl TryFrom<CatalogDef> for ToneCatalog {
    type Error = CatalogError;

    fn try_from(def: CatalogDef) -> Result<Self, Self::Error> {
        Self::new(
            def.name,
            def.tones,
            def.valid_band_low_hz,
            def.valid_band_high_hz,
            def.match_threshold_hz,
        )
    }
}
