//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device lookup.  Calling
//! [`AudioCapture::start`] consumes it and returns a [`StreamHandle`] that
//! owns both the running stream and the device.  Raw callback buffers are
//! forwarded as [`AudioChunk`]s over an mpsc channel so the real-time audio
//! thread never does more than a copy and a send.
//!
//! Teardown always runs in the same order (stop the stream, close the
//! stream, release the device) and each step is a no-op the second time.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]` at the device rate.  The
/// frame pump converts chunks into detector-ready
/// [`AudioFrame`](crate::audio::AudioFrame)s.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring the microphone.
///
/// The session treats any of these as "breathing input disabled"; the game
/// itself keeps running.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// Owns a running capture stream and the device it was opened on.
///
/// Call [`stop`](Self::stop) for an explicit, logged teardown; dropping the
/// handle performs the same sequence.
pub struct StreamHandle {
    stream: Option<cpal::Stream>,
    device: Option<cpal::Device>,
    stopped: bool,
}

impl StreamHandle {
    /// Stop the stream, close it, then release the device.
    ///
    /// Safe to call any number of times.
    pub fn stop(&mut self) {
        if !self.stopped {
            if let Some(stream) = self.stream.as_ref() {
                if let Err(e) = stream.pause() {
                    log::warn!("capture: failed to stop stream: {e}");
                }
            }
            self.stopped = true;
        }

        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::debug!("capture: stream closed");
        }

        if let Some(device) = self.device.take() {
            drop(device);
            log::debug!("capture: device released");
        }
    }

    /// `true` while the stream has not been stopped.
    pub fn is_active(&self) -> bool {
        !self.stopped
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::mpsc;
/// use breath_flap::audio::{AudioCapture, AudioChunk};
///
/// let (tx, rx) = mpsc::channel::<AudioChunk>();
/// let capture = AudioCapture::new(None).unwrap();
/// let mut handle = capture.start(tx).unwrap();
/// // ... consume `rx` ...
/// handle.stop();
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl AudioCapture {
    /// Open the named input device, or the host default when `device_name`
    /// is `None`.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] / [`CaptureError::DeviceNotFound`] when no
    /// matching device exists, [`CaptureError::DefaultConfig`] when it cannot
    /// report a stream configuration.
    pub fn new(device_name: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();

        let device = match device_name {
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
            Some(wanted) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string()))?,
        };

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Start recording and send [`AudioChunk`]s to `tx`.
    ///
    /// Send errors (receiver dropped) are ignored so the audio thread never
    /// panics.
    pub fn start(self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(StreamHandle {
            stream: Some(stream),
            device: Some(self.device),
            stopped: false,
        })
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in each [`AudioChunk`].
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
