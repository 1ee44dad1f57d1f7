//! Fixed-length PCM frames fed to the breathing detector.

/// Sample rate every [`AudioFrame`] is expressed in (Hz).
pub const FRAME_SAMPLE_RATE: u32 = 44_100;

/// Default number of samples per frame.
pub const DEFAULT_FRAME_SIZE: usize = 1024;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One buffer of mono signed 16-bit samples.
///
/// Frames are transient: the capture side builds them, the detector reads
/// them once and drops them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// A frame of `len` identical samples.  Handy for tests and demos.
    pub fn constant(value: i16, len: usize) -> Self {
        Self {
            samples: vec![value; len],
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<Vec<i16>> for AudioFrame {
    fn from(samples: Vec<i16>) -> Self {
        Self::new(samples)
    }
}

// ---------------------------------------------------------------------------
// FrameAssembler
// ---------------------------------------------------------------------------

/// Re-chunks an arbitrary-length sample stream into fixed-size frames.
///
/// Device callbacks deliver buffers of whatever size the backend picks; the
/// detector wants every frame to cover the same span of time.  Leftover
/// samples are carried into the next call.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    /// # Panics
    ///
    /// Panics if `frame_size == 0`.
    pub fn new(frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame_size must be > 0");
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
        }
    }

    /// Append `samples` and return every frame that is now complete.
    pub fn push(&mut self, samples: &[i16]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(samples);

        let complete = self.pending.len() / self.frame_size;
        if complete == 0 {
            return Vec::new();
        }

        let rest = self.pending.split_off(complete * self.frame_size);
        let full = std::mem::replace(&mut self.pending, rest);
        full.chunks_exact(self.frame_size)
            .map(|chunk| AudioFrame::new(chunk.to_vec()))
            .collect()
    }

    /// Samples waiting for the next frame.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_held_back() {
        let mut asm = FrameAssembler::new(4);
        assert!(asm.push(&[1, 2, 3]).is_empty());
        assert_eq!(asm.pending(), 3);
    }

    #[test]
    fn frames_span_call_boundaries() {
        let mut asm = FrameAssembler::new(4);
        asm.push(&[1, 2, 3]);
        let frames = asm.push(&[4, 5, 6, 7, 8, 9]);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples(), &[1, 2, 3, 4]);
        assert_eq!(frames[1].samples(), &[5, 6, 7, 8]);
        assert_eq!(asm.pending(), 1);
    }

    #[test]
    fn every_frame_has_fixed_length() {
        let mut asm = FrameAssembler::new(DEFAULT_FRAME_SIZE);
        let frames = asm.push(&vec![7; DEFAULT_FRAME_SIZE * 3 + 10]);
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.len() == DEFAULT_FRAME_SIZE));
    }

    #[test]
    fn constant_frame() {
        let frame = AudioFrame::constant(-3, 5);
        assert_eq!(frame.samples(), &[-3; 5]);
        assert!(!frame.is_empty());
        assert!(AudioFrame::default().is_empty());
    }

    #[test]
    #[should_panic(expected = "frame_size must be > 0")]
    fn zero_frame_size_panics() {
        FrameAssembler::new(0);
    }
}
