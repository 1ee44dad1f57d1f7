//! The simulation proper: one body, one obstacle track, one score.
//!
//! [`World`] holds no clock of its own.  Every time-dependent call takes the
//! `Instant` it should act at, so the engine passes real time and tests pass
//! synthetic time.

use std::time::Instant;

use rand::rngs::StdRng;

use crate::breathing::BreathType;
use crate::config::GameConfig;

use super::entities::{ObstacleTrack, PhysicsBody};
use super::state::{GamePhase, GameSnapshot, GameStats};

/// Accepted range for the difficulty multiplier.
pub const MIN_DIFFICULTY: f64 = 0.1;
pub const MAX_DIFFICULTY: f64 = 5.0;

/// Misbehaviour a test can force on the next ticks.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) enum TickFault {
    Panic,
    Stall(std::time::Duration),
}

pub struct World {
    config: GameConfig,
    body: PhysicsBody,
    track: ObstacleTrack,
    phase: GamePhase,
    score: u32,
    high_score: u32,
    gravity: f64,
    pipe_speed: f64,
    impulse_start: Option<Instant>,
    label: BreathType,
    started_at: Instant,
    ended_at: Option<Instant>,
    #[cfg(test)]
    fault: Option<TickFault>,
}

impl World {
    /// A fresh world in the `Idle` phase.  Unusable config values are
    /// replaced by their defaults first.
    pub fn new(mut config: GameConfig, rng: StdRng, now: Instant) -> Self {
        config.sanitize();
        let mut world = Self {
            body: PhysicsBody::from_config(&config),
            track: ObstacleTrack::new(&config, rng),
            phase: GamePhase::Idle,
            score: 0,
            high_score: 0,
            gravity: config.gravity,
            pipe_speed: config.pipe_speed,
            impulse_start: None,
            label: BreathType::Neutral,
            started_at: now,
            ended_at: None,
            #[cfg(test)]
            fault: None,
            config,
        };
        world.reset(now);
        world
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Back to `Idle` with fresh entities.  High score and difficulty survive.
    pub fn reset(&mut self, now: Instant) {
        self.body = PhysicsBody::from_config(&self.config);
        self.track.seed(self.config.initial_obstacles);
        self.phase = GamePhase::Idle;
        self.score = 0;
        self.impulse_start = None;
        self.label = BreathType::Neutral;
        self.started_at = now;
        self.ended_at = None;
    }

    /// `Idle → Running`.  Returns `false` in any other phase.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.phase != GamePhase::Idle {
            return false;
        }
        self.phase = GamePhase::Running;
        self.started_at = now;
        log::info!("game: started");
        true
    }

    /// `Running → Paused`.
    pub fn pause(&mut self) -> bool {
        if self.phase != GamePhase::Running {
            return false;
        }
        self.phase = GamePhase::Paused;
        log::info!("game: paused");
        true
    }

    /// `Paused → Running`.
    pub fn resume(&mut self) -> bool {
        if self.phase != GamePhase::Paused {
            return false;
        }
        self.phase = GamePhase::Running;
        log::info!("game: resumed");
        true
    }

    /// Flip between `Running` and `Paused`; other phases are left alone.
    pub fn toggle_pause(&mut self) -> bool {
        match self.phase {
            GamePhase::Running => self.pause(),
            GamePhase::Paused => self.resume(),
            _ => false,
        }
    }

    fn finish(&mut self, now: Instant, cause: &str) {
        self.phase = GamePhase::GameOver;
        self.high_score = self.high_score.max(self.score);
        self.ended_at = Some(now);
        log::info!(
            "game: over ({cause}), score {} / high score {}",
            self.score,
            self.high_score
        );
    }

    // -----------------------------------------------------------------------
    // Simulation
    // -----------------------------------------------------------------------

    /// Advance one step.  Returns `false` without touching anything unless
    /// the world is `Running`.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.phase.is_active() {
            return false;
        }

        #[cfg(test)]
        match self.fault {
            Some(TickFault::Panic) => panic!("tick fault"),
            Some(TickFault::Stall(pause)) => std::thread::sleep(pause),
            None => {}
        }

        self.body.velocity_y += self.gravity;

        if let Some(start) = self.impulse_start {
            if now.saturating_duration_since(start) > self.config.impulse_duration() {
                self.impulse_start = None;
                self.label = BreathType::Neutral;
            }
        }

        let max = self.config.max_velocity;
        self.body.velocity_y = self.body.velocity_y.clamp(-max, max);

        self.body.y += self.body.velocity_y;
        let radius = self.body.radius as f64;
        let floor = self.config.height - radius;
        if self.body.y >= floor {
            self.body.y = floor;
            self.body.velocity_y = 0.0;
            self.finish(now, "floor contact");
            return true;
        }
        if self.body.y < radius {
            self.body.y = radius;
            self.body.velocity_y = 0.0;
        }

        self.track.advance(self.pipe_speed);

        if self.track.collides(&self.body) {
            self.finish(now, "collision");
            return true;
        }

        self.score += self.track.mark_passed(&self.body);
        true
    }

    /// Apply a breathing impulse.  Ignored unless `Running`; `Neutral` is
    /// never an impulse.
    pub fn on_breathing_input(&mut self, kind: BreathType, volume: f64, now: Instant) -> bool {
        if !self.phase.is_active() {
            return false;
        }

        let v = self.body.velocity_y;
        self.body.velocity_y = match kind {
            // inhale_force is negative: cap the upward speed at the force itself
            BreathType::Inhale => (v + self.config.inhale_force).max(self.config.inhale_force),
            BreathType::Exhale => (v + self.config.exhale_force).min(self.config.exhale_force),
            BreathType::Neutral => return false,
        };

        self.impulse_start = Some(now);
        self.label = kind;
        log::debug!(
            "game: {} impulse (volume {volume:.1}) → velocity {:.2}",
            kind.label(),
            self.body.velocity_y
        );
        true
    }

    /// Scale pipe speed and gravity from their configured values.
    ///
    /// Non-finite multipliers are ignored; others are clamped to
    /// [`MIN_DIFFICULTY`, `MAX_DIFFICULTY`].  Returns the multiplier in effect.
    pub fn adjust_difficulty(&mut self, multiplier: f64) -> f64 {
        if !multiplier.is_finite() {
            log::warn!("game: ignoring non-finite difficulty {multiplier}");
            return self.difficulty();
        }
        let m = multiplier.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        self.pipe_speed = self.config.pipe_speed * m;
        self.gravity = self.config.gravity * m;
        log::info!(
            "game: difficulty ×{m:.2} (pipe speed {:.2}, gravity {:.2})",
            self.pipe_speed,
            self.gravity
        );
        m
    }

    fn difficulty(&self) -> f64 {
        if self.config.pipe_speed != 0.0 {
            self.pipe_speed / self.config.pipe_speed
        } else {
            1.0
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn body(&self) -> &PhysicsBody {
        &self.body
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn gravity(&self) -> f64 {
        self.gravity
    }

    pub fn pipe_speed(&self) -> f64 {
        self.pipe_speed
    }

    fn elapsed_secs(&self, now: Instant) -> f64 {
        self.ended_at
            .unwrap_or(now)
            .saturating_duration_since(self.started_at)
            .as_secs_f64()
    }

    pub fn snapshot(&self, now: Instant) -> GameSnapshot {
        GameSnapshot {
            phase: self.phase,
            body: self.body,
            obstacles: self.track.obstacles().to_vec(),
            score: self.score,
            high_score: self.high_score,
            game_over: self.phase == GamePhase::GameOver,
            paused: self.phase == GamePhase::Paused,
            breathing_state: self.label,
            impulse_active: self.impulse_start.is_some(),
            elapsed_time: self.elapsed_secs(now),
            width: self.config.width,
            height: self.config.height,
        }
    }

    pub fn stats(&self, now: Instant) -> GameStats {
        GameStats {
            current_score: self.score,
            high_score: self.high_score.max(self.score),
            elapsed_time: self.elapsed_secs(now),
            obstacles_passed: self.track.obstacles().iter().filter(|o| o.passed).count() as u32,
            game_over: self.phase == GamePhase::GameOver,
        }
    }

    #[cfg(test)]
    pub(crate) fn track_mut(&mut self) -> &mut ObstacleTrack {
        &mut self.track
    }

    #[cfg(test)]
    pub(crate) fn body_mut(&mut self) -> &mut PhysicsBody {
        &mut self.body
    }

    #[cfg(test)]
    pub(crate) fn set_fault(&mut self, fault: Option<TickFault>) {
        self.fault = fault;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::Obstacle;
    use rand::{Rng, SeedableRng};
    use std::time::Duration;

    fn world(t0: Instant) -> World {
        World::new(GameConfig::default(), StdRng::seed_from_u64(3), t0)
    }

    fn running(t0: Instant) -> World {
        let mut w = world(t0);
        assert!(w.start(t0));
        w
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn pipe(x: f64, gap_y: f64) -> Obstacle {
        Obstacle {
            x,
            gap_y,
            gap_height: 120,
            width: 50,
            passed: false,
        }
    }

    // ---- lifecycle ---

    #[test]
    fn new_world_is_idle_with_seeded_obstacles() {
        let w = world(Instant::now());
        assert_eq!(w.phase(), GamePhase::Idle);
        assert_eq!(w.body().y, 250.0);
        let xs: Vec<f64> = w.snapshot(Instant::now()).obstacles.iter().map(|o| o.x).collect();
        assert_eq!(xs, vec![800.0, 1100.0, 1400.0]);
    }

    #[test]
    fn idle_world_does_not_tick() {
        let t0 = Instant::now();
        let mut w = world(t0);
        assert!(!w.tick(t0 + ms(16)));
        assert_eq!(w.body().velocity_y, 0.0);
    }

    #[test]
    fn start_only_from_idle() {
        let t0 = Instant::now();
        let mut w = running(t0);
        assert!(!w.start(t0));
        assert!(w.pause());
        assert!(!w.start(t0));
        assert_eq!(w.phase(), GamePhase::Paused);
    }

    #[test]
    fn pause_freezes_world_and_input() {
        let t0 = Instant::now();
        let mut w = running(t0);
        w.pause();
        let before = *w.body();

        assert!(!w.tick(t0 + ms(16)));
        assert!(!w.on_breathing_input(BreathType::Inhale, 200.0, t0));
        assert_eq!(*w.body(), before);

        assert!(w.resume());
        assert!(w.tick(t0 + ms(32)));
    }

    #[test]
    fn toggle_pause_flips_running_and_paused() {
        let t0 = Instant::now();
        let mut w = world(t0);
        assert!(!w.toggle_pause());
        w.start(t0);
        assert!(w.toggle_pause());
        assert_eq!(w.phase(), GamePhase::Paused);
        assert!(w.toggle_pause());
        assert_eq!(w.phase(), GamePhase::Running);
    }

    #[test]
    fn reset_keeps_high_score_and_clears_round() {
        let t0 = Instant::now();
        let mut w = running(t0);
        w.score = 4;
        w.body_mut().y = 579.0;
        w.body_mut().velocity_y = 5.0;
        w.tick(t0 + ms(16));
        assert_eq!(w.phase(), GamePhase::GameOver);
        assert_eq!(w.high_score(), 4);

        w.reset(t0 + ms(100));
        assert_eq!(w.phase(), GamePhase::Idle);
        assert_eq!(w.score(), 0);
        assert_eq!(w.high_score(), 4);
        assert_eq!(w.body().y, 250.0);
        assert_eq!(w.snapshot(t0 + ms(100)).obstacles.len(), 3);
    }

    // ---- physics ---

    #[test]
    fn free_fall_reaches_terminal_velocity_after_20_ticks() {
        let t0 = Instant::now();
        let mut w = running(t0);
        for i in 1..=20 {
            w.tick(t0 + ms(17 * i));
        }
        assert_eq!(w.body().velocity_y, 10.0);
        assert_eq!(w.body().y, 250.0 + 105.0);

        for i in 21..=30 {
            w.tick(t0 + ms(17 * i));
            assert_eq!(w.body().velocity_y, 10.0);
        }
    }

    #[test]
    fn two_quick_inhales_do_not_stack() {
        let t0 = Instant::now();
        let mut w = running(t0);

        assert!(w.on_breathing_input(BreathType::Inhale, 200.0, t0));
        assert_eq!(w.body().velocity_y, -8.0);
        assert!(w.on_breathing_input(BreathType::Inhale, 200.0, t0 + ms(50)));
        assert_eq!(w.body().velocity_y, -8.0);

        w.tick(t0 + ms(60));
        assert_eq!(w.body().velocity_y, -7.5);
    }

    #[test]
    fn exhale_caps_downward_push() {
        let t0 = Instant::now();
        let mut w = running(t0);
        w.body_mut().velocity_y = 3.0;
        w.on_breathing_input(BreathType::Exhale, 10.0, t0);
        assert_eq!(w.body().velocity_y, 4.0);

        w.body_mut().velocity_y = -6.0;
        w.on_breathing_input(BreathType::Exhale, 10.0, t0);
        assert_eq!(w.body().velocity_y, -2.0);
    }

    #[test]
    fn neutral_is_not_an_impulse() {
        let t0 = Instant::now();
        let mut w = running(t0);
        assert!(!w.on_breathing_input(BreathType::Neutral, 100.0, t0));
        assert!(!w.snapshot(t0).impulse_active);
    }

    #[test]
    fn impulse_label_decays_after_duration() {
        let t0 = Instant::now();
        let mut w = running(t0);
        w.on_breathing_input(BreathType::Inhale, 200.0, t0);

        w.tick(t0 + ms(300));
        let s = w.snapshot(t0 + ms(300));
        assert!(s.impulse_active);
        assert_eq!(s.breathing_state, BreathType::Inhale);

        w.tick(t0 + ms(301));
        let s = w.snapshot(t0 + ms(301));
        assert!(!s.impulse_active);
        assert_eq!(s.breathing_state, BreathType::Neutral);
    }

    #[test]
    fn ceiling_clamps_position_and_zeroes_velocity() {
        let t0 = Instant::now();
        let mut w = running(t0);
        w.body_mut().y = 25.0;
        w.body_mut().velocity_y = -10.0;
        w.tick(t0 + ms(16));
        assert_eq!(w.body().y, 20.0);
        assert_eq!(w.body().velocity_y, 0.0);
        assert_eq!(w.phase(), GamePhase::Running);
    }

    #[test]
    fn floor_contact_ends_the_game() {
        let t0 = Instant::now();
        let mut w = running(t0);
        w.body_mut().y = 575.0;
        w.body_mut().velocity_y = 4.5;
        w.tick(t0 + ms(16));
        assert_eq!(w.body().y, 580.0);
        assert_eq!(w.body().velocity_y, 0.0);
        assert_eq!(w.phase(), GamePhase::GameOver);
        let s = w.snapshot(t0);
        assert!(s.game_over);
        assert_eq!(s.body.velocity_y, 0.0);
        assert!(!w.tick(t0 + ms(32)));
    }

    #[test]
    fn gap_violation_while_overlapping_ends_the_game() {
        let t0 = Instant::now();
        let mut w = running(t0);
        let obstacles = w.track_mut().obstacles_mut();
        obstacles.clear();
        obstacles.push(pipe(103.0, 400.0));

        w.tick(t0 + ms(16));
        assert_eq!(w.phase(), GamePhase::GameOver);
    }

    #[test]
    fn body_inside_gap_survives_and_scores_once() {
        let t0 = Instant::now();
        let mut w = running(t0);
        let obstacles = w.track_mut().obstacles_mut();
        obstacles.clear();
        obstacles.push(pipe(48.0, 200.0));

        w.tick(t0 + ms(16));
        assert_eq!(w.phase(), GamePhase::Running);
        assert_eq!(w.score(), 1);

        w.tick(t0 + ms(32));
        assert_eq!(w.score(), 1);
        assert_eq!(w.stats(t0 + ms(32)).obstacles_passed, 1);
    }

    #[test]
    fn bounds_hold_under_random_input() {
        let mut rng = StdRng::seed_from_u64(11);
        let t0 = Instant::now();
        let mut w = running(t0);
        let mut now = t0;
        let mut last_score = 0;

        for _ in 0..10_000 {
            now += ms(16);
            if rng.gen_bool(0.1) {
                let kind = if rng.gen_bool(0.6) {
                    BreathType::Inhale
                } else {
                    BreathType::Exhale
                };
                w.on_breathing_input(kind, 150.0, now);
            }
            w.tick(now);

            let body = *w.body();
            assert!(body.velocity_y.abs() <= 10.0);
            assert!(body.y >= 20.0 && body.y <= 580.0);
            assert!(w.score() >= last_score);
            last_score = w.score();

            if w.phase() == GamePhase::GameOver {
                w.reset(now);
                w.start(now);
                last_score = 0;
            }
        }
    }

    #[test]
    fn unusable_config_is_replaced_before_ticking() {
        let config = GameConfig {
            max_velocity: -1.0,
            height: f64::NAN,
            gravity: f64::INFINITY,
            ..GameConfig::default()
        };
        let t0 = Instant::now();
        let mut w = World::new(config, StdRng::seed_from_u64(3), t0);
        assert!(w.start(t0));
        assert_eq!(w.snapshot(t0).height, 600.0);

        for i in 1..=30 {
            assert!(w.tick(t0 + ms(17 * i)));
            assert!(w.body().velocity_y.abs() <= 10.0);
        }
        assert_eq!(w.body().velocity_y, 10.0);
    }

    // ---- difficulty ---

    #[test]
    fn difficulty_scales_from_base_values() {
        let mut w = world(Instant::now());
        assert_eq!(w.adjust_difficulty(2.0), 2.0);
        assert_eq!(w.adjust_difficulty(2.0), 2.0);
        assert_eq!(w.pipe_speed(), 6.0);
        assert_eq!(w.gravity(), 1.0);
    }

    #[test]
    fn difficulty_is_clamped_and_nan_ignored() {
        let mut w = world(Instant::now());
        assert_eq!(w.adjust_difficulty(100.0), MAX_DIFFICULTY);
        assert_eq!(w.adjust_difficulty(f64::NAN), MAX_DIFFICULTY);
        assert_eq!(w.adjust_difficulty(0.0), MIN_DIFFICULTY);
        assert!((w.gravity() - 0.05).abs() < 1e-12);
    }

    // ---- queries ---

    #[test]
    fn elapsed_time_freezes_at_game_over() {
        let t0 = Instant::now();
        let mut w = running(t0);
        w.body_mut().y = 579.0;
        w.body_mut().velocity_y = 5.0;
        w.tick(t0 + ms(500));
        assert_eq!(w.stats(t0 + ms(5_000)).elapsed_time, 0.5);
        assert!(w.stats(t0).game_over);
    }
}
