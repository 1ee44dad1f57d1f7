//! Owned breathing-detector state shared between the audio and game contexts.
//!
//! [`BreathingDetector`] bundles the volume estimator, the calibrator and
//! the classifier behind a single mutex.  The frame pump calls
//! [`push_audio_frame`](BreathingDetector::push_audio_frame) from the audio
//! side; the session calls the control methods from anywhere.  The
//! registered callback is invoked *after* the lock is released, so a
//! callback may safely call back into the detector.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;

use crate::audio::AudioFrame;
use crate::config::BreathingConfig;

use super::calibration::{CalibrationProfile, CalibrationStatus, Calibrator};
use super::classifier::BreathingClassifier;
use super::volume::VolumeEstimator;
use super::{BreathType, BreathingEvent};

/// Receives `(type, volume)` for every applied Inhale/Exhale transition.
pub type BreathingCallback = Arc<dyn Fn(BreathType, f64) + Send + Sync>;

/// Point-in-time view of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectorState {
    pub state: BreathType,
    /// Most recent smoothed volume (`0.0` before the first frame).
    pub volume: f64,
    pub calibrated: bool,
    pub baseline: f64,
}

struct DetectorInner {
    estimator: VolumeEstimator,
    calibrator: Calibrator,
    classifier: BreathingClassifier,
}

// ---------------------------------------------------------------------------
// BreathingDetector
// ---------------------------------------------------------------------------

pub struct BreathingDetector {
    inner: Mutex<DetectorInner>,
    callback: Mutex<Option<BreathingCallback>>,
}

impl BreathingDetector {
    pub fn new(config: &BreathingConfig) -> Self {
        Self {
            inner: Mutex::new(DetectorInner {
                estimator: VolumeEstimator::from_config(config),
                calibrator: Calibrator::from_config(config),
                classifier: BreathingClassifier::new(config.min_state_duration(), Instant::now()),
            }),
            callback: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DetectorInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Process one frame captured now.
    pub fn push_audio_frame(&self, frame: &AudioFrame) -> Option<BreathingEvent> {
        self.push_audio_frame_at(frame, Instant::now())
    }

    /// Process one frame captured at `now`.
    ///
    /// Until calibrated, the smoothed volume feeds the calibrator; afterwards
    /// it feeds the classifier.  Returns the emitted event, if any, after it
    /// has been delivered to the registered callback.
    pub fn push_audio_frame_at(&self, frame: &AudioFrame, now: Instant) -> Option<BreathingEvent> {
        let event = {
            let mut inner = self.lock();
            let volume = inner.estimator.estimate(frame);
            Self::route(&mut inner, volume, now)
        };
        self.dispatch(event)
    }

    /// Process an already computed raw volume observed at `now`.
    pub fn push_volume_at(&self, raw_volume: f64, now: Instant) -> Option<BreathingEvent> {
        let event = {
            let mut inner = self.lock();
            let volume = inner.estimator.push_raw(raw_volume);
            Self::route(&mut inner, volume, now)
        };
        self.dispatch(event)
    }

    fn route(inner: &mut DetectorInner, volume: f64, now: Instant) -> Option<BreathingEvent> {
        if !inner.calibrator.is_calibrated() {
            if inner.calibrator.push(volume) {
                inner.classifier.reset(now);
            }
            return None;
        }
        let profile = inner.calibrator.profile();
        inner.classifier.observe(volume, &profile, now)
    }

    fn dispatch(&self, event: Option<BreathingEvent>) -> Option<BreathingEvent> {
        let event = event?;
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(cb) = callback {
            cb(event.kind, event.volume);
        }
        Some(event)
    }

    /// Install the breathing-event callback, replacing any previous one.
    pub fn register_breathing_callback<F>(&self, callback: F)
    where
        F: Fn(BreathType, f64) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    pub fn clear_breathing_callback(&self) {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Drop the calibration and start collecting samples again.
    pub fn recalibrate(&self) {
        let mut inner = self.lock();
        inner.calibrator.recalibrate();
        inner.classifier.reset(Instant::now());
    }

    /// Clamp and apply a new sensitivity; returns the applied value.
    pub fn set_sensitivity(&self, sensitivity: f64) -> f64 {
        self.lock().calibrator.set_sensitivity(sensitivity)
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        self.lock().calibrator.status()
    }

    pub fn calibration_profile(&self) -> CalibrationProfile {
        self.lock().calibrator.profile()
    }

    pub fn current_state(&self) -> DetectorState {
        let inner = self.lock();
        let profile = inner.calibrator.profile();
        DetectorState {
            state: inner.classifier.state().state,
            volume: inner.estimator.last().unwrap_or(0.0),
            calibrated: profile.calibrated,
            baseline: profile.baseline_volume,
        }
    }

    /// Smoothed-volume history, oldest first.
    pub fn volume_history(&self) -> Vec<f64> {
        self.lock().estimator.history()
    }
}

impl Default for BreathingDetector {
    fn default() -> Self {
        Self::new(&BreathingConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
