//! Frame pump: turns raw cpal chunks into fixed-size detector frames.
//!
//! The cpal callback only copies and sends.  The pump thread does the rest
//! (downmix → resample → `i16` → re-chunk) and hands every finished
//! [`AudioFrame`] to a sink, normally
//! [`BreathingDetector::push_audio_frame`](crate::breathing::BreathingDetector::push_audio_frame).
//! The thread exits once every chunk sender has been dropped, which happens
//! when the capture stream is closed.

use std::sync::mpsc;
use std::thread::JoinHandle;

use super::capture::AudioChunk;
use super::convert::{downmix_to_mono, resample, to_i16};
use super::frame::{AudioFrame, FrameAssembler};

/// Converts one chunk and returns the frames it completes.
///
/// Split out of the thread body so it can be driven synchronously in tests.
pub struct FrameConverter {
    target_rate: u32,
    assembler: FrameAssembler,
}

impl FrameConverter {
    pub fn new(target_rate: u32, frame_size: usize) -> Self {
        Self {
            target_rate,
            assembler: FrameAssembler::new(frame_size),
        }
    }

    pub fn convert(&mut self, chunk: &AudioChunk) -> Vec<AudioFrame> {
        let mono = downmix_to_mono(&chunk.samples, chunk.channels);
        let resampled = resample(&mono, chunk.sample_rate, self.target_rate);
        self.assembler.push(&to_i16(&resampled))
    }
}

/// Spawn the `audio-frames` thread.
///
/// # Panics
///
/// Panics if the OS refuses to create the thread.
pub fn spawn_frame_pump<F>(
    chunk_rx: mpsc::Receiver<AudioChunk>,
    mut converter: FrameConverter,
    mut sink: F,
) -> JoinHandle<()>
where
    F: FnMut(AudioFrame) + Send + 'static,
{
    std::thread::Builder::new()
        .name("audio-frames".into())
        .spawn(move || {
            while let Ok(chunk) = chunk_rx.recv() {
                for frame in converter.convert(&chunk) {
                    sink(frame);
                }
            }
            log::debug!("audio-frames: chunk channel closed, pump exiting");
        })
        .expect("failed to spawn audio-frames thread")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
