//! Audio front end — microphone capture → format conversion → fixed frames.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → audio-frames thread
//!           → downmix_to_mono → resample (44.1 kHz) → to_i16
//!           → FrameAssembler → AudioFrame → BreathingDetector
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::mpsc;
//! use breath_flap::audio::{spawn_frame_pump, AudioCapture, AudioChunk, FrameConverter};
//!
//! let (tx, rx) = mpsc::channel::<AudioChunk>();
//! let capture = AudioCapture::new(None).unwrap();
//! let _pump = spawn_frame_pump(rx, FrameConverter::new(44_100, 1024), |frame| {
//!     println!("frame of {} samples", frame.len());
//! });
//! let _handle = capture.start(tx).unwrap(); // dropping the handle stops capture
//! ```

pub mod buffer;
pub mod capture;
pub mod convert;
pub mod frame;
pub mod pump;

pub use buffer::RingBuffer;
pub use capture::{AudioCapture, AudioChunk, CaptureError, StreamHandle};
pub use convert::{downmix_to_mono, resample, to_i16};
pub use frame::{AudioFrame, FrameAssembler, DEFAULT_FRAME_SIZE, FRAME_SAMPLE_RATE};
pub use pump::{spawn_frame_pump, FrameConverter};
