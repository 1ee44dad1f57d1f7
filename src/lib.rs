//! Breath Flap, a side-scroller steered by breathing into a microphone.
//!
//! ```text
//! audio     cpal capture → mono 44.1 kHz i16 → 1024-sample frames
//! breathing volume → calibration → debounced inhale / exhale events
//! game      fixed-rate physics, obstacles, scoring, snapshots
//! session   wiring and the control surface
//! config    TOML settings
//! ```

pub mod audio;
pub mod breathing;
pub mod config;
pub mod game;
pub mod session;
