//! Session controller: the single control surface for a game session.
//!
//! [`SessionController`] owns the [`GameLoop`] and, when microphone capture
//! came up, the shared [`BreathingDetector`].  The breathing subsystem is
//! resolved once at construction: `None` means capture failed and the game
//! runs under gravity alone.
//!
//! # Event flow
//!
//! ```text
//! audio-frames thread                       tokio task
//! ───────────────────                       ──────────
//! BreathingDetector ──callback──▶ try_send ──▶ mpsc ──▶ SessionController::run
//!                                  (drop + warn                 │
//!                                   when full)                  ▼
//!                                                 GameLoop::on_breathing_input
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::audio::AudioFrame;
use crate::breathing::{
    BreathType, BreathingDetector, BreathingEvent, CalibrationProfile, CalibrationStatus,
    DetectorState,
};
use crate::config::AppConfig;
use crate::game::{GameLoop, GameSnapshot, GameStats};

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    /// Capture never came up, so there is no detector to talk to.
    #[error("breathing input is disabled")]
    BreathingDisabled,
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

pub struct SessionController {
    game: Arc<GameLoop>,
    detector: Option<Arc<BreathingDetector>>,
    queue_capacity: usize,
}

impl SessionController {
    pub fn new(config: &AppConfig, detector: Option<Arc<BreathingDetector>>) -> Self {
        let game = GameLoop::new(&config.game, config.session.stop_timeout());
        Self::with_game(Arc::new(game), detector, config.session.breathing_queue)
    }

    /// Build around an existing loop (tests use a seeded one).
    pub fn with_game(
        game: Arc<GameLoop>,
        detector: Option<Arc<BreathingDetector>>,
        queue_capacity: usize,
    ) -> Self {
        if detector.is_none() {
            log::warn!("session: breathing input disabled, game runs under gravity only");
        }
        Self {
            game,
            detector,
            queue_capacity: queue_capacity.max(1),
        }
    }

    // -----------------------------------------------------------------------
    // Breathing wiring
    // -----------------------------------------------------------------------

    /// Route detector events into a bounded channel and return its receiver.
    ///
    /// Pass the receiver to [`run`](Self::run).  Events that arrive while
    /// the channel is full are dropped with a warning.  Returns `None` when
    /// breathing input is disabled.
    pub fn connect_breathing(&self) -> Option<mpsc::Receiver<BreathingEvent>> {
        let detector = self.detector.as_ref()?;
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        detector.register_breathing_callback(move |kind, volume| {
            match tx.try_send(BreathingEvent { kind, volume }) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    log::warn!(
                        "session: breathing queue full, dropping {} event",
                        event.kind.label()
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("session: breathing queue closed");
                }
            }
        });
        Some(rx)
    }

    /// Stop routing detector events; a running [`run`](Self::run) then
    /// drains the queue and returns.
    pub fn disconnect_breathing(&self) {
        if let Some(detector) = &self.detector {
            detector.clear_breathing_callback();
        }
    }

    /// Apply breathing events until the channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<BreathingEvent>) {
        while let Some(event) = events.recv().await {
            self.on_breathing_input(event.kind, event.volume);
        }
        log::info!("session: breathing channel closed");
    }

    /// Returns `true` if the impulse was applied (only while running).
    pub fn on_breathing_input(&self, kind: BreathType, volume: f64) -> bool {
        self.game.on_breathing_input(kind, volume)
    }

    // -----------------------------------------------------------------------
    // Detector control
    // -----------------------------------------------------------------------

    pub fn breathing_enabled(&self) -> bool {
        self.detector.is_some()
    }

    fn detector(&self) -> Result<&BreathingDetector, SessionError> {
        self.detector.as_deref().ok_or(SessionError::BreathingDisabled)
    }

    /// Feed one frame to the detector directly.
    pub fn push_audio_frame(
        &self,
        frame: &AudioFrame,
    ) -> Result<Option<BreathingEvent>, SessionError> {
        Ok(self.detector()?.push_audio_frame(frame))
    }

    pub fn recalibrate(&self) -> Result<(), SessionError> {
        self.detector()?.recalibrate();
        log::info!("session: recalibrating");
        Ok(())
    }

    /// Returns the sensitivity actually applied after clamping.
    pub fn set_sensitivity(&self, sensitivity: f64) -> Result<f64, SessionError> {
        let applied = self.detector()?.set_sensitivity(sensitivity);
        log::info!("session: sensitivity {applied:.2}");
        Ok(applied)
    }

    pub fn calibration_status(&self) -> Result<CalibrationStatus, SessionError> {
        Ok(self.detector()?.calibration_status())
    }

    pub fn calibration_profile(&self) -> Result<CalibrationProfile, SessionError> {
        Ok(self.detector()?.calibration_profile())
    }

    pub fn detector_state(&self) -> Result<DetectorState, SessionError> {
        Ok(self.detector()?.current_state())
    }

    // -----------------------------------------------------------------------
    // Game control
    // -----------------------------------------------------------------------

    pub fn start(&self) {
        self.game.start();
    }

    pub fn stop(&self) {
        self.game.stop();
    }

    pub fn pause(&self) -> bool {
        self.game.pause()
    }

    pub fn resume(&self) -> bool {
        self.game.resume()
    }

    pub fn toggle_pause(&self) -> bool {
        self.game.toggle_pause()
    }

    pub fn reset(&self) {
        self.game.reset();
    }

    pub fn adjust_difficulty(&self, multiplier: f64) -> f64 {
        self.game.adjust_difficulty(multiplier)
    }

    pub fn game_state(&self) -> GameSnapshot {
        self.game.game_state()
    }

    pub fn stats(&self) -> GameStats {
        self.game.stats()
    }

    pub fn subscribe(&self) -> watch::Receiver<GameSnapshot> {
        self.game.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.game.is_running()
    }

    pub fn tick_interval(&self) -> Duration {
        self.game.tick_interval()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
