//! Automatic threshold calibration from a run of resting volume samples.
//!
//! The [`Calibrator`] collects smoothed volumes until it has
//! `calibration_samples` of them, then derives a baseline (median) and a
//! spread (population standard deviation) and places the inhale threshold
//! above the baseline and the exhale threshold below it.
//!
//! Calibration never fails: too few usable samples fall back to fixed
//! defaults, and degenerate statistics (zero median or zero spread) are
//! replaced with conservative values so the thresholds always have width.
//!
//! The collected samples are kept after calibration so a later
//! [`Calibrator::set_sensitivity`] can re-derive thresholds without asking
//! the player to breathe again.  Only [`Calibrator::recalibrate`] clears them.

use serde::{Deserialize, Serialize};

use crate::config::BreathingConfig;

/// Lower bound for the sensitivity multiplier.
pub const MIN_SENSITIVITY: f64 = 0.1;
/// Upper bound for the sensitivity multiplier.
pub const MAX_SENSITIVITY: f64 = 3.0;

const FALLBACK_BASELINE: f64 = 100.0;
const FALLBACK_INHALE: f64 = 150.0;
const FALLBACK_EXHALE: f64 = 50.0;

const DEGENERATE_MIN_BASELINE: f64 = 100.0;
const DEGENERATE_MIN_SPREAD: f64 = 50.0;

const INHALE_SPREAD_FACTOR: f64 = 1.2;
const EXHALE_SPREAD_FACTOR: f64 = 0.8;
const EXHALE_BASELINE_FLOOR: f64 = 0.3;

const MIN_SEPARATION: f64 = 20.0;
const MIN_SEPARATION_RATIO: f64 = 0.4;
const EXHALE_ABSOLUTE_FLOOR: f64 = 1.0;

/// Clamp `value` into `[MIN_SENSITIVITY, MAX_SENSITIVITY]`.
///
/// NaN keeps `current`.
pub fn clamp_sensitivity(value: f64, current: f64) -> f64 {
    if value.is_nan() {
        current
    } else {
        value.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
    }
}

// ---------------------------------------------------------------------------
// CalibrationProfile
// ---------------------------------------------------------------------------

/// Baseline and thresholds used by the classifier.
///
/// Serializable so an external caller can persist it; the core itself never
/// writes it anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub baseline_volume: f64,
    pub inhale_threshold: f64,
    pub exhale_threshold: f64,
    pub sensitivity: f64,
    pub calibrated: bool,
    pub sample_count: usize,
}

impl CalibrationProfile {
    /// An empty, not-yet-calibrated profile.
    pub fn uncalibrated(sensitivity: f64) -> Self {
        Self {
            baseline_volume: 0.0,
            inhale_threshold: 0.0,
            exhale_threshold: 0.0,
            sensitivity: clamp_sensitivity(sensitivity, 1.0),
            calibrated: false,
            sample_count: 0,
        }
    }

    /// Distance between the two thresholds.
    pub fn separation(&self) -> f64 {
        self.inhale_threshold - self.exhale_threshold
    }

    /// Separation the thresholds must keep for this baseline.
    pub fn min_separation(&self) -> f64 {
        min_separation(self.baseline_volume)
    }
}

/// Snapshot reported to callers polling calibration progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationStatus {
    pub calibrated: bool,
    pub baseline: f64,
    pub sample_count: usize,
}

fn min_separation(baseline: f64) -> f64 {
    MIN_SEPARATION.max(baseline * MIN_SEPARATION_RATIO)
}

// ---------------------------------------------------------------------------
// Threshold derivation
// ---------------------------------------------------------------------------

/// Derived `(baseline, inhale_threshold, exhale_threshold)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub baseline: f64,
    pub inhale: f64,
    pub exhale: f64,
}

/// Derive thresholds from `samples`.
///
/// Non-finite and negative samples are discarded first; fewer than
/// `min_valid` survivors yield the fixed fallback thresholds.
pub fn derive_thresholds(samples: &[f64], sensitivity: f64, min_valid: usize) -> Thresholds {
    let valid: Vec<f64> = samples
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();

    if valid.len() < min_valid.max(1) {
        log::warn!(
            "calibration: only {} valid samples (need {}), using defaults",
            valid.len(),
            min_valid
        );
        return Thresholds {
            baseline: FALLBACK_BASELINE,
            inhale: FALLBACK_INHALE,
            exhale: FALLBACK_EXHALE,
        };
    }

    let mut baseline = median(&valid);
    let mut spread = population_std_dev(&valid);

    if baseline == 0.0 || spread == 0.0 {
        baseline = DEGENERATE_MIN_BASELINE.max(mean(&valid));
        spread = DEGENERATE_MIN_SPREAD.max(baseline * 0.5);
    }

    let mut inhale = baseline + spread * sensitivity * INHALE_SPREAD_FACTOR;
    let mut exhale = (baseline * EXHALE_BASELINE_FLOOR)
        .max(baseline - spread * sensitivity * EXHALE_SPREAD_FACTOR);

    let min_sep = min_separation(baseline);
    if inhale - exhale < min_sep {
        let half = min_sep / 2.0;
        // The absolute floor may not lift the exhale threshold above a
        // sub-unit baseline; if it bites, inhale moves up to keep the gap.
        let floor = EXHALE_ABSOLUTE_FLOOR.min(baseline * EXHALE_BASELINE_FLOOR);
        exhale = (baseline - half).max(floor);
        inhale = (baseline + half).max(exhale + min_sep);
    }

    Thresholds {
        baseline,
        inhale,
        exhale,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn population_std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

// ---------------------------------------------------------------------------
// Calibrator
// ---------------------------------------------------------------------------

/// Collects volume samples and maintains the [`CalibrationProfile`].
#[derive(Debug, Clone)]
pub struct Calibrator {
    samples: Vec<f64>,
    required: usize,
    min_valid: usize,
    profile: CalibrationProfile,
}

impl Calibrator {
    /// `required` samples trigger calibration; fewer than `min_valid` usable
    /// ones fall back to defaults.
    pub fn new(required: usize, min_valid: usize, sensitivity: f64) -> Self {
        let required = required.max(1);
        Self {
            samples: Vec::with_capacity(required),
            required,
            min_valid,
            profile: CalibrationProfile::uncalibrated(sensitivity),
        }
    }

    pub fn from_config(config: &BreathingConfig) -> Self {
        Self::new(
            config.calibration_samples,
            config.min_valid_samples,
            config.sensitivity,
        )
    }

    /// Record one sample.  Returns `true` when this sample completed
    /// calibration.  Samples arriving after calibration are ignored.
    pub fn push(&mut self, volume: f64) -> bool {
        if self.profile.calibrated {
            return false;
        }
        self.samples.push(volume);
        self.profile.sample_count = self.samples.len();
        if self.samples.len() >= self.required {
            self.compute_calibration();
            return true;
        }
        false
    }

    /// Derive thresholds from the retained samples and mark calibrated.
    pub fn compute_calibration(&mut self) {
        let t = derive_thresholds(&self.samples, self.profile.sensitivity, self.min_valid);
        self.profile.baseline_volume = t.baseline;
        self.profile.inhale_threshold = t.inhale;
        self.profile.exhale_threshold = t.exhale;
        self.profile.sample_count = self.samples.len();
        self.profile.calibrated = true;

        log::info!(
            "calibrated: baseline {:.2}, inhale threshold {:.2}, exhale threshold {:.2} ({} samples, sensitivity {:.2})",
            t.baseline,
            t.inhale,
            t.exhale,
            self.samples.len(),
            self.profile.sensitivity
        );
    }

    /// Forget everything and start collecting from zero.
    pub fn recalibrate(&mut self) {
        self.samples.clear();
        let sensitivity = self.profile.sensitivity;
        self.profile = CalibrationProfile::uncalibrated(sensitivity);
        log::info!("recalibrating: collecting {} samples", self.required);
    }

    /// Clamp and store `value`; when already calibrated, re-derive the
    /// thresholds from the retained samples.  Returns the applied value.
    pub fn set_sensitivity(&mut self, value: f64) -> f64 {
        let applied = clamp_sensitivity(value, self.profile.sensitivity);
        self.profile.sensitivity = applied;
        if self.profile.calibrated {
            self.compute_calibration();
        }
        applied
    }

    pub fn profile(&self) -> CalibrationProfile {
        self.profile
    }

    pub fn status(&self) -> CalibrationStatus {
        CalibrationStatus {
            calibrated: self.profile.calibrated,
            baseline: self.profile.baseline_volume,
            sample_count: self.samples.len(),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.profile.calibrated
    }

    pub fn required_samples(&self) -> usize {
        self.required
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::from_config(&BreathingConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
