//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every struct is `#[serde(default)]`, so a partial `settings.toml` only
//! overrides the keys it names.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and frame assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the frames handed to the breathing detector (Hz).
    /// Device audio is resampled to this rate.
    pub sample_rate: u32,
    /// Samples per [`crate::audio::AudioFrame`].
    pub frame_size: usize,
    /// Audio input device name; `None` means the system default.
    pub input_device: Option<String>,
}

impl AudioConfig {
    /// Replace unusable values with defaults; returns how many were replaced.
    pub fn sanitize(&mut self) -> usize {
        let d = Self::default();
        [
            replace_if("audio.sample_rate", &mut self.sample_rate, d.sample_rate, |v| v == 0),
            replace_if("audio.frame_size", &mut self.frame_size, d.frame_size, |v| v == 0),
        ]
        .into_iter()
        .filter(|&replaced| replaced)
        .count()
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            frame_size: 1024,
            input_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// BreathingConfig
// ---------------------------------------------------------------------------

/// Settings for volume smoothing, calibration and classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreathingConfig {
    /// Threshold multiplier, clamped to `[0.1, 3.0]`.
    pub sensitivity: f64,
    /// Minimum dwell time between two applied state transitions (seconds).
    pub min_state_duration_secs: f64,
    /// Number of volume samples collected before calibration runs.
    pub calibration_samples: usize,
    /// Minimum number of valid samples for a measured calibration; fewer
    /// valid samples fall back to fixed defaults.
    pub min_valid_samples: usize,
    /// Capacity of the smoothed-volume history.
    pub history_len: usize,
    /// Number of previous smoothed values averaged with the current reading.
    pub smoothing_window: usize,
}

impl BreathingConfig {
    /// [`min_state_duration_secs`](Self::min_state_duration_secs) as a
    /// [`Duration`]; negative or non-finite values become zero.
    pub fn min_state_duration(&self) -> Duration {
        secs_to_duration(self.min_state_duration_secs)
    }

    /// Replace unusable values with defaults; returns how many were replaced.
    ///
    /// Out-of-range but finite sensitivities are left to the detector's
    /// own clamp.
    pub fn sanitize(&mut self) -> usize {
        let d = Self::default();
        [
            replace_if("breathing.sensitivity", &mut self.sensitivity, d.sensitivity, not_finite),
            replace_if(
                "breathing.min_state_duration_secs",
                &mut self.min_state_duration_secs,
                d.min_state_duration_secs,
                |v| !v.is_finite() || v < 0.0,
            ),
            replace_if(
                "breathing.calibration_samples",
                &mut self.calibration_samples,
                d.calibration_samples,
                |v| v == 0,
            ),
            replace_if("breathing.history_len", &mut self.history_len, d.history_len, |v| v == 0),
        ]
        .into_iter()
        .filter(|&replaced| replaced)
        .count()
    }
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            min_state_duration_secs: 0.3,
            calibration_samples: 100,
            min_valid_samples: 10,
            history_len: 20,
            smoothing_window: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Physics and playfield constants.
///
/// `gravity` and `pipe_speed` are the *base* values; the difficulty
/// multiplier is always applied on top of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Playfield width in game units.
    pub width: f64,
    /// Playfield height in game units.
    pub height: f64,
    /// Downward acceleration added to the body's velocity each tick.
    pub gravity: f64,
    /// Velocity impulse applied on an inhale (negative = up).
    pub inhale_force: f64,
    /// Velocity impulse applied on an exhale (positive = down).
    pub exhale_force: f64,
    /// Absolute bound on the body's vertical velocity.
    pub max_velocity: f64,
    /// Horizontal obstacle movement per tick.
    pub pipe_speed: f64,
    /// Horizontal distance between consecutive obstacles.
    pub pipe_spawn_distance: f64,
    /// Height of the passable gap.
    pub pipe_gap_height: u32,
    /// Obstacle width.
    pub pipe_width: u32,
    /// Lowest allowed gap top.
    pub min_gap_y: f64,
    /// Distance from the floor below which no gap top is placed.
    pub gap_floor_margin: f64,
    /// Obstacles seeded on reset.
    pub initial_obstacles: usize,
    /// Fixed horizontal position of the body.
    pub bird_x: f64,
    /// Vertical position of the body after reset.
    pub bird_start_y: f64,
    /// Body radius.
    pub bird_radius: u32,
    /// Tick cadence in Hz.
    pub target_fps: u32,
    /// How long a breathing impulse stays active (seconds).
    pub impulse_duration_secs: f64,
}

impl GameConfig {
    /// Minimum real time between two ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }

    /// [`impulse_duration_secs`](Self::impulse_duration_secs) as a [`Duration`].
    pub fn impulse_duration(&self) -> Duration {
        secs_to_duration(self.impulse_duration_secs)
    }

    /// Replace unusable values with defaults; returns how many were replaced.
    ///
    /// Dimensions, `max_velocity` and `pipe_spawn_distance` must be finite
    /// and positive (`max_velocity` may be zero), every other float finite,
    /// and `target_fps` non-zero.
    pub fn sanitize(&mut self) -> usize {
        let d = Self::default();
        let not_positive = |v: f64| !v.is_finite() || v <= 0.0;
        [
            replace_if("game.width", &mut self.width, d.width, not_positive),
            replace_if("game.height", &mut self.height, d.height, not_positive),
            replace_if("game.gravity", &mut self.gravity, d.gravity, not_finite),
            replace_if("game.inhale_force", &mut self.inhale_force, d.inhale_force, not_finite),
            replace_if("game.exhale_force", &mut self.exhale_force, d.exhale_force, not_finite),
            replace_if("game.max_velocity", &mut self.max_velocity, d.max_velocity, |v| {
                !v.is_finite() || v < 0.0
            }),
            replace_if("game.pipe_speed", &mut self.pipe_speed, d.pipe_speed, not_finite),
            replace_if(
                "game.pipe_spawn_distance",
                &mut self.pipe_spawn_distance,
                d.pipe_spawn_distance,
                not_positive,
            ),
            replace_if("game.min_gap_y", &mut self.min_gap_y, d.min_gap_y, not_finite),
            replace_if(
                "game.gap_floor_margin",
                &mut self.gap_floor_margin,
                d.gap_floor_margin,
                not_finite,
            ),
            replace_if("game.bird_x", &mut self.bird_x, d.bird_x, not_finite),
            replace_if("game.bird_start_y", &mut self.bird_start_y, d.bird_start_y, not_finite),
            replace_if("game.target_fps", &mut self.target_fps, d.target_fps, |v| v == 0),
            replace_if(
                "game.impulse_duration_secs",
                &mut self.impulse_duration_secs,
                d.impulse_duration_secs,
                |v| !v.is_finite() || v < 0.0,
            ),
        ]
        .into_iter()
        .filter(|&replaced| replaced)
        .count()
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            gravity: 0.5,
            inhale_force: -8.0,
            exhale_force: 4.0,
            max_velocity: 10.0,
            pipe_speed: 3.0,
            pipe_spawn_distance: 300.0,
            pipe_gap_height: 120,
            pipe_width: 50,
            min_gap_y: 100.0,
            gap_floor_margin: 200.0,
            initial_obstacles: 3,
            bird_x: 100.0,
            bird_start_y: 250.0,
            bird_radius: 20,
            target_fps: 60,
            impulse_duration_secs: 0.3,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Session wiring and lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the bounded breathing-event channel between the audio
    /// context and the game loop.
    pub breathing_queue: usize,
    /// Upper bound on how long `stop` waits for the loop thread (ms).
    pub stop_timeout_ms: u64,
    /// Interval at which the binary logs a snapshot summary (ms).
    pub report_interval_ms: u64,
    /// Start a game as soon as the binary is up.
    pub auto_start: bool,
}

impl SessionConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms.max(1))
    }

    /// Replace unusable values with defaults; returns how many were replaced.
    pub fn sanitize(&mut self) -> usize {
        let d = Self::default();
        usize::from(replace_if(
            "session.breathing_queue",
            &mut self.breathing_queue,
            d.breathing_queue,
            |v| v == 0,
        ))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            breathing_queue: 32,
            stop_timeout_ms: 1000,
            report_interval_ms: 1000,
            auto_start: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use breath_flap::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capture / frame settings.
    pub audio: AudioConfig,
    /// Smoothing, calibration and classifier settings.
    pub breathing: BreathingConfig,
    /// Physics and playfield constants.
    pub game: GameConfig,
    /// Session wiring settings.
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    ///
    /// Values the game cannot run with are replaced by their defaults with
    /// a warning (see [`sanitize`](Self::sanitize)).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        let replaced = config.sanitize();
        if replaced > 0 {
            log::warn!(
                "config: {replaced} invalid value(s) in {} replaced by defaults",
                path.display()
            );
        }
        Ok(config)
    }

    /// Sanitize every section; returns how many values were replaced.
    pub fn sanitize(&mut self) -> usize {
        self.audio.sanitize()
            + self.breathing.sanitize()
            + self.game.sanitize()
            + self.session.sanitize()
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Reset `value` to `fallback` with a warning when `invalid` holds.
fn replace_if<T: Copy + std::fmt::Debug>(
    key: &str,
    value: &mut T,
    fallback: T,
    invalid: impl Fn(T) -> bool,
) -> bool {
    if !invalid(*value) {
        return false;
    }
    log::warn!("config: {key} = {:?} is not usable, using {:?}", *value, fallback);
    *value = fallback;
    true
}

fn not_finite(v: f64) -> bool {
    !v.is_finite()
}

fn secs_to_duration(secs: f64) -> Duration {
    // Whole microseconds, so 0.3 is exactly 300 ms.
    if secs.is_finite() && secs > 0.0 {
        Duration::from_micros((secs * 1e6).round() as u64)
    } else {
        Duration::ZERO
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut original = AppConfig::default();
        original.breathing.sensitivity = 1.7;
        original.game.pipe_speed = 4.5;
        original.audio.input_device = Some("USB Mic".into());
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.breathing.sensitivity, 1.7);
        assert_eq!(loaded.game.pipe_speed, 4.5);
        assert_eq!(loaded.audio.input_device.as_deref(), Some("USB Mic"));
        assert_eq!(loaded.audio.frame_size, original.audio.frame_size);
        assert_eq!(loaded.game.bird_radius, original.game.bird_radius);
        assert_eq!(loaded.session.breathing_queue, original.session.breathing_queue);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");

        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.breathing.calibration_samples, 100);
        assert_eq!(config.game.gravity, 0.5);
        assert!(config.session.auto_start);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[game]\ngravity = 0.8\n").expect("write");

        let config = AppConfig::load_from(&path).expect("load");

        assert_eq!(config.game.gravity, 0.8);
        assert_eq!(config.game.max_velocity, 10.0);
        assert_eq!(config.breathing.sensitivity, 1.0);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "this is = = not toml").expect("write");

        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn hostile_values_fall_back_to_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[audio]\nframe_size = 0\n\n\
             [breathing]\nsensitivity = nan\nhistory_len = 0\n\n\
             [game]\nmax_velocity = -1.0\ntarget_fps = 0\nheight = inf\ngravity = 0.9\n\n\
             [session]\nbreathing_queue = 0\n",
        )
        .expect("write");

        let config = AppConfig::load_from(&path).expect("load");

        assert_eq!(config.audio.frame_size, 1024);
        assert_eq!(config.breathing.sensitivity, 1.0);
        assert_eq!(config.breathing.history_len, 20);
        assert_eq!(config.game.max_velocity, 10.0);
        assert_eq!(config.game.target_fps, 60);
        assert_eq!(config.game.height, 600.0);
        assert_eq!(config.session.breathing_queue, 32);
        // Valid neighbours are kept.
        assert_eq!(config.game.gravity, 0.9);
    }

    #[test]
    fn sanitize_counts_replacements_and_keeps_valid_values() {
        let mut config = AppConfig::default();
        assert_eq!(config.sanitize(), 0);

        config.game.max_velocity = f64::NAN;
        config.game.inhale_force = f64::NEG_INFINITY;
        config.game.pipe_speed = -2.0;
        config.audio.sample_rate = 0;
        assert_eq!(config.sanitize(), 3);
        assert_eq!(config.game.max_velocity, 10.0);
        assert_eq!(config.game.inhale_force, -8.0);
        assert_eq!(config.game.pipe_speed, -2.0);
        assert_eq!(config.audio.sample_rate, 44_100);
    }

    #[test]
    fn duration_helpers() {
        let config = AppConfig::default();
        assert_eq!(config.breathing.min_state_duration(), Duration::from_millis(300));
        assert_eq!(config.game.impulse_duration(), Duration::from_millis(300));
        let tick = config.game.tick_interval();
        assert!((tick.as_secs_f64() - 1.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn negative_duration_becomes_zero() {
        let breathing = BreathingConfig {
            min_state_duration_secs: -1.0,
            ..BreathingConfig::default()
        };
        assert_eq!(breathing.min_state_duration(), Duration::ZERO);
    }
}
