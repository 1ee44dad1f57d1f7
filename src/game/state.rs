//! Game phase machine and the read-only views published to callers.
//!
//! [`GamePhase`] drives the loop.  [`GameSnapshot`] is what a renderer or
//! transport sees each tick; [`GameStats`] is the condensed summary.

use serde::Serialize;

use crate::breathing::BreathType;

use super::entities::{Obstacle, PhysicsBody};

// ---------------------------------------------------------------------------
// GamePhase
// ---------------------------------------------------------------------------

/// Phases of a game session.
///
/// ```text
/// Idle ──start──▶ Running ──collision / floor──▶ GameOver
///                 Running ──pause──▶ Paused ──resume──▶ Running
/// any phase ──reset──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Fresh entities, waiting for `start`.
    #[default]
    Idle,
    /// Ticks advance the world and breathing input is applied.
    Running,
    /// World frozen; breathing input ignored.
    Paused,
    /// Collision or floor contact; only `reset` leaves this phase.
    GameOver,
}

impl GamePhase {
    /// `true` while the simulation is advancing.
    ///
    /// ```
    /// use breath_flap::game::GamePhase;
    ///
    /// assert!(GamePhase::Running.is_active());
    /// assert!(!GamePhase::Idle.is_active());
    /// assert!(!GamePhase::Paused.is_active());
    /// assert!(!GamePhase::GameOver.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        matches!(self, GamePhase::Running)
    }

    pub fn label(&self) -> &'static str {
        match self {
            GamePhase::Idle => "Idle",
            GamePhase::Running => "Running",
            GamePhase::Paused => "Paused",
            GamePhase::GameOver => "Game over",
        }
    }
}

// ---------------------------------------------------------------------------
// GameSnapshot
// ---------------------------------------------------------------------------

/// Immutable copy of the world, built under the world lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSnapshot {
    pub phase: GamePhase,
    pub body: PhysicsBody,
    pub obstacles: Vec<Obstacle>,
    pub score: u32,
    pub high_score: u32,
    pub game_over: bool,
    pub paused: bool,
    /// Label shown while an impulse is active; `Neutral` otherwise.
    pub breathing_state: BreathType,
    pub impulse_active: bool,
    /// Seconds since the session was last reset.
    pub elapsed_time: f64,
    pub width: f64,
    pub height: f64,
}

impl GameSnapshot {
    /// Serialize for an external renderer.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// GameStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GameStats {
    pub current_score: u32,
    pub high_score: u32,
    pub elapsed_time: f64,
    pub obstacles_passed: u32,
    pub game_over: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
