//! Sample-format conversion between the capture device and the detector.
//!
//! The breathing detector consumes **44.1 kHz mono `i16`** frames while cpal
//! delivers interleaved `f32` at whatever rate the device prefers.  This
//! module provides the three conversion steps:
//!
//! 1. [`downmix_to_mono`] — average interleaved channels.
//! 2. [`resample`] — linear-interpolation rate conversion.
//! 3. [`to_i16`] — scale `[-1.0, 1.0]` floats to signed 16-bit PCM.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging all channels.
///
/// The output length is `samples.len() / channels`; a trailing partial frame
/// is discarded.  `channels == 0` yields an empty vector.
///
/// # Example
///
/// ```rust
/// use breath_flap::audio::downmix_to_mono;
///
/// let stereo = vec![0.5_f32, -0.5, 0.2, 0.4]; // L R L R
/// let mono = downmix_to_mono(&stereo, 2);
/// assert_eq!(mono.len(), 2);
/// assert!((mono[0] - 0.0).abs() < 1e-6);
/// assert!((mono[1] - 0.3).abs() < 1e-6);
/// ```
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `source_rate` to `target_rate` Hz using
/// linear interpolation.
///
/// Equal rates return a copy; an empty input or a zero rate returns an
/// empty vector.  The output length is
/// `ceil(samples.len() * target_rate / source_rate)`.
///
/// # Example
///
/// ```rust
/// use breath_flap::audio::resample;
///
/// let hi = vec![0.5_f32; 480];
/// let lo = resample(&hi, 48_000, 44_100);
/// assert_eq!(lo.len(), 441);
/// ```
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }
    if samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = match (samples.get(idx), samples.get(idx + 1)) {
            (Some(&a), Some(&b)) => a * (1.0 - frac) + b * frac,
            (Some(&a), None) => a,
            _ => 0.0,
        };
        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// to_i16
// ---------------------------------------------------------------------------

/// Convert `[-1.0, 1.0]` float samples to `i16` PCM.
///
/// Out-of-range values saturate; NaN becomes silence.
pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            if s.is_nan() {
                0
            } else {
                (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
