//! Dominant-frequency and loudness estimation
//!
//! Converts one audio buffer into a single (frequency, loudness) observation.
//! The frequency estimate is the peak-magnitude FFT bin; loudness is the RMS
//! level in dBFS.

use rustfft::{num_complex::Complex, FftPlanner};

/// One observation produced per delivered buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSample {
    /// Dominant frequency in Hz (0.0 when the buffer cannot be transformed)
    pub frequency_hz: f32,
    /// RMS level in dBFS (negative infinity for an empty or silent buffer)
    pub loudness_db: f32,
}

/// Turns raw buffers into [`AnalysisSample`]s.
///
/// Pure with respect to observable behavior: identical input always produces
/// the identical sample. The planner caches FFT plans per transform length
/// and the complex scratch buffer is reused across calls, so steady-state
/// analysis allocates nothing.
pub struct SpectralAnalyzer {
    planner: FftPlanner<f32>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralAnalyzer {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            scratch: Vec::new(),
        }
    }

    /// Analyze one buffer captured at `sample_rate_hz`.
    ///
    /// Loudness is `20 * log10(rms)`. An empty buffer reports negative
    /// infinity rather than NaN; callers treat that as the silence sentinel.
    ///
    /// The frequency estimate zero-pads the buffer up to the next power of
    /// two (a power-of-two length is used unchanged, content is never
    /// truncated), runs a forward FFT, and maps the peak-magnitude bin to
    /// `bin * sample_rate / transform_len`. The DC bin is excluded so a
    /// constant offset cannot masquerade as a near-zero pitch. Buffers
    /// shorter than two samples cannot be transformed and report 0.0.
    pub fn analyze(&mut self, samples: &[f32], sample_rate_hz: u32) -> AnalysisSample {
        AnalysisSample {
            frequency_hz: self.dominant_frequency(samples, sample_rate_hz),
            loudness_db: loudness_db(samples),
        }
    }

    fn dominant_frequency(&mut self, samples: &[f32], sample_rate_hz: u32) -> f32 {
        if samples.len() < 2 {
            return 0.0;
        }

        let transform_len = samples.len().next_power_of_two();

        self.scratch.clear();
        self.scratch
            .extend(samples.iter().map(|&x| Complex::new(x, 0.0)));
        self.scratch.resize(transform_len, Complex::new(0.0, 0.0));

        let fft = self.planner.plan_fft_forward(transform_len);
        fft.process(&mut self.scratch);

        // Peak over the half spectrum, skipping DC. The mirrored upper bins
        // are never scanned, so a conjugate twin cannot shadow its lower
        // half. Strict `>` keeps the lowest bin on ties.
        let mut peak_bin = 1usize;
        let mut peak_mag = 0.0f32;
        for (bin, value) in self
            .scratch
            .iter()
            .enumerate()
            .take(transform_len / 2 + 1)
            .skip(1)
        {
            let mag = value.norm_sqr();
            if mag > peak_mag {
                peak_mag = mag;
                peak_bin = bin;
            }
        }

        peak_bin as f32 * sample_rate_hz as f32 / transform_len as f32
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// RMS level in dBFS. Zero or empty input decays to negative infinity,
/// never NaN.
fn loudness_db(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }
    let mean_square = samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32;
    20.0 * mean_square.sqrt().log10()
}
