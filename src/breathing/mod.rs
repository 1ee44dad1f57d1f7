//! Breathing detection: volume → calibration → debounced classification.
//!
//! # Flow
//!
//! ```text
//! AudioFrame ──▶ VolumeEstimator (RMS + 4-point moving average)
//!                     │
//!          ┌──────────┴──────────┐
//!          ▼ not calibrated      ▼ calibrated
//!     Calibrator            BreathingClassifier ──▶ BreathingEvent
//!     (median / std-dev)    (debounced FSM)          (Inhale / Exhale only)
//! ```
//!
//! [`BreathingDetector`] owns all three stages behind one lock and is the
//! type the rest of the crate talks to.

pub mod calibration;
pub mod classifier;
pub mod detector;
pub mod volume;

use serde::{Deserialize, Serialize};

pub use calibration::{
    clamp_sensitivity, derive_thresholds, CalibrationProfile, CalibrationStatus, Calibrator,
    Thresholds, MAX_SENSITIVITY, MIN_SENSITIVITY,
};
pub use classifier::{transition, BreathingClassifier, BreathingState, Transition};
pub use detector::{BreathingCallback, BreathingDetector, DetectorState};
pub use volume::{frame_rms, sanitize_volume, VolumeEstimator};

// ---------------------------------------------------------------------------
// BreathType
// ---------------------------------------------------------------------------

/// Discrete breathing classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreathType {
    Inhale,
    Exhale,
    #[default]
    Neutral,
}

impl BreathType {
    /// Inhale and Exhale drive the game; Neutral is a rest label.
    ///
    /// ```
    /// use breath_flap::breathing::BreathType;
    ///
    /// assert!(BreathType::Inhale.is_actionable());
    /// assert!(BreathType::Exhale.is_actionable());
    /// assert!(!BreathType::Neutral.is_actionable());
    /// ```
    pub fn is_actionable(&self) -> bool {
        !matches!(self, BreathType::Neutral)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BreathType::Inhale => "inhale",
            BreathType::Exhale => "exhale",
            BreathType::Neutral => "neutral",
        }
    }
}

// ---------------------------------------------------------------------------
// BreathingEvent
// ---------------------------------------------------------------------------

/// An applied Inhale or Exhale transition and the volume that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreathingEvent {
    pub kind: BreathType,
    pub volume: f64,
}
