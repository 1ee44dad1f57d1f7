//! Configuration module for breath-flap.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the audio,
//! breathing, game and session subsystems, `AppPaths` for cross-platform
//! directories, and TOML persistence via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, AudioConfig, BreathingConfig, GameConfig, SessionConfig};
