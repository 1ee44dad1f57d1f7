//! Frame loudness estimation with a short moving-average smoother.
//!
//! Each [`AudioFrame`] is reduced to its RMS amplitude (accumulated in `f64`
//! so full-scale `i16` frames cannot overflow).  The raw value is then
//! averaged with the last few *smoothed* values; this is a cheap moving
//! average, not a proper low-pass filter.

use crate::audio::{AudioFrame, RingBuffer};
use crate::config::BreathingConfig;

/// Root-mean-square amplitude of `samples`.
///
/// Returns `0.0` for an empty slice or a non-finite result.
///
/// ```rust
/// use breath_flap::breathing::frame_rms;
///
/// assert_eq!(frame_rms(&[]), 0.0);
/// assert!((frame_rms(&[3, -3, 3, -3]) - 3.0).abs() < 1e-12);
/// ```
pub fn frame_rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();
    sanitize_volume((sum_sq / samples.len() as f64).sqrt())
}

/// Map non-finite or negative readings to `0.0`.
pub fn sanitize_volume(volume: f64) -> f64 {
    if volume.is_finite() && volume >= 0.0 {
        volume
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// VolumeEstimator
// ---------------------------------------------------------------------------

/// Converts frames into smoothed volume samples and keeps a bounded history.
#[derive(Debug, Clone)]
pub struct VolumeEstimator {
    history: RingBuffer<f64>,
    window: usize,
}

impl VolumeEstimator {
    /// `history_len` bounds the retained smoothed values; `window` is how
    /// many of them are averaged with each new reading.
    ///
    /// # Panics
    ///
    /// Panics if `history_len == 0`.
    pub fn new(history_len: usize, window: usize) -> Self {
        Self {
            history: RingBuffer::new(history_len),
            window,
        }
    }

    pub fn from_config(config: &BreathingConfig) -> Self {
        Self::new(config.history_len.max(1), config.smoothing_window)
    }

    /// Estimate the smoothed volume of `frame` and record it.
    pub fn estimate(&mut self, frame: &AudioFrame) -> f64 {
        self.push_raw(frame_rms(frame.samples()))
    }

    /// Smooth an already computed raw volume and record it.
    pub fn push_raw(&mut self, raw: f64) -> f64 {
        let raw = sanitize_volume(raw);
        let smoothed = if self.window > 0 && self.history.len() >= self.window {
            let sum: f64 = self.history.recent(self.window).sum::<f64>() + raw;
            sum / (self.window + 1) as f64
        } else {
            raw
        };
        self.history.push(smoothed);
        smoothed
    }

    /// Most recent smoothed volume.
    pub fn last(&self) -> Option<f64> {
        self.history.last()
    }

    /// Smoothed history, oldest first.
    pub fn history(&self) -> Vec<f64> {
        self.history.iter().collect()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for VolumeEstimator {
    fn default() -> Self {
        Self::from_config(&BreathingConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_constant_frame_is_its_magnitude() {
        assert!((frame_rms(&[-200; 1024]) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn rms_does_not_overflow_at_full_scale() {
        let rms = frame_rms(&[i16::MIN; 1024]);
        assert!((rms - 32_768.0).abs() < 1e-9);
    }

    #[test]
    fn sanitize_rejects_non_finite_and_negative() {
        assert_eq!(sanitize_volume(f64::NAN), 0.0);
        assert_eq!(sanitize_volume(f64::INFINITY), 0.0);
        assert_eq!(sanitize_volume(-4.0), 0.0);
        assert_eq!(sanitize_volume(12.5), 12.5);
    }

    #[test]
    fn first_readings_pass_through_unsmoothed() {
        let mut est = VolumeEstimator::new(20, 3);
        assert_eq!(est.push_raw(10.0), 10.0);
        assert_eq!(est.push_raw(20.0), 20.0);
        assert_eq!(est.push_raw(30.0), 30.0);
    }

    #[test]
    fn fourth_reading_averages_with_last_three() {
        let mut est = VolumeEstimator::new(20, 3);
        est.push_raw(10.0);
        est.push_raw(20.0);
        est.push_raw(30.0);
        // (10 + 20 + 30 + 100) / 4
        assert_eq!(est.push_raw(100.0), 40.0);
        // (20 + 30 + 40 + 0) / 4
        assert_eq!(est.push_raw(0.0), 22.5);
    }

    #[test]
    fn history_is_bounded() {
        let mut est = VolumeEstimator::new(20, 3);
        for i in 0..50 {
            est.push_raw(i as f64);
        }
        assert_eq!(est.history().len(), 20);
    }

    #[test]
    fn estimate_records_frame_volume() {
        let mut est = VolumeEstimator::default();
        let v = est.estimate(&AudioFrame::constant(500, 1024));
        assert!((v - 500.0).abs() < 1e-9);
        assert_eq!(est.last(), Some(v));
    }

    #[test]
    fn empty_frame_is_silence() {
        let mut est = VolumeEstimator::default();
        assert_eq!(est.estimate(&AudioFrame::default()), 0.0);
    }
}
