//! Debounced tri-state breathing classifier.
//!
//! Every smoothed volume is first mapped to a *target* state using the
//! calibrated thresholds, then run through a small transition table keyed
//! by `(current, target, settled)` where `settled` means the current state
//! has been held for longer than `min_state_duration`.
//!
//! ```text
//!              volume > inhale        volume < exhale       in between
//! target  →    Inhale                 Exhale                Neutral if settled,
//!                                                           else current
//!
//! (current, target, settled)           result
//! (_,       _,      false)             hold
//! (s,       s,      true)              hold
//! (_,       Inhale, true)              enter Inhale, emit
//! (_,       Exhale, true)              enter Exhale, emit
//! (_,       Neutral, true)             enter Neutral, silent
//! ```
//!
//! Two applied transitions are therefore always more than
//! `min_state_duration` apart.

use std::time::{Duration, Instant};

use super::calibration::CalibrationProfile;
use super::{BreathType, BreathingEvent};

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Outcome of one classifier step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keep the current state.
    Hold,
    /// Switch to `to`; `emit` is set for actionable states only.
    Enter { to: BreathType, emit: bool },
}

/// The transition table.
pub fn transition(current: BreathType, target: BreathType, settled: bool) -> Transition {
    use BreathType::*;

    match (current, target, settled) {
        (_, _, false) => Transition::Hold,
        (Inhale, Inhale, true) | (Exhale, Exhale, true) | (Neutral, Neutral, true) => {
            Transition::Hold
        }
        (_, Inhale, true) => Transition::Enter {
            to: Inhale,
            emit: true,
        },
        (_, Exhale, true) => Transition::Enter {
            to: Exhale,
            emit: true,
        },
        (_, Neutral, true) => Transition::Enter {
            to: Neutral,
            emit: false,
        },
    }
}

/// Map a volume onto the state it argues for.
pub fn target_state(
    volume: f64,
    profile: &CalibrationProfile,
    current: BreathType,
    settled: bool,
) -> BreathType {
    if volume > profile.inhale_threshold {
        BreathType::Inhale
    } else if volume < profile.exhale_threshold {
        BreathType::Exhale
    } else if settled {
        BreathType::Neutral
    } else {
        current
    }
}

// ---------------------------------------------------------------------------
// BreathingState
// ---------------------------------------------------------------------------

/// Current label and when it was last changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreathingState {
    pub state: BreathType,
    pub last_change: Instant,
}

// ---------------------------------------------------------------------------
// BreathingClassifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BreathingClassifier {
    current: BreathingState,
    min_state_duration: Duration,
}

impl BreathingClassifier {
    /// Starts in `Neutral`, with `now` as the last change.
    pub fn new(min_state_duration: Duration, now: Instant) -> Self {
        Self {
            current: BreathingState {
                state: BreathType::Neutral,
                last_change: now,
            },
            min_state_duration,
        }
    }

    /// Feed one smoothed volume observed at `now`.
    ///
    /// Returns an event when an Inhale or Exhale transition was applied.
    pub fn observe(
        &mut self,
        volume: f64,
        profile: &CalibrationProfile,
        now: Instant,
    ) -> Option<BreathingEvent> {
        let elapsed = now.saturating_duration_since(self.current.last_change);
        let settled = elapsed > self.min_state_duration;
        let target = target_state(volume, profile, self.current.state, settled);

        match transition(self.current.state, target, settled) {
            Transition::Hold => None,
            Transition::Enter { to, emit } => {
                log::debug!(
                    "breathing: {} → {} (volume {volume:.1})",
                    self.current.state.label(),
                    to.label()
                );
                self.current = BreathingState {
                    state: to,
                    last_change: now,
                };
                emit.then_some(BreathingEvent { kind: to, volume })
            }
        }
    }

    pub fn state(&self) -> BreathingState {
        self.current
    }

    pub fn min_state_duration(&self) -> Duration {
        self.min_state_duration
    }

    /// Back to `Neutral` as of `now`.
    pub fn reset(&mut self, now: Instant) {
        self.current = BreathingState {
            state: BreathType::Neutral,
            last_change: now,
        };
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
