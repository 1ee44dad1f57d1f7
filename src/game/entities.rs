//! Simulation entities: the player body and the obstacle track.

use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;

use crate::config::GameConfig;

// ---------------------------------------------------------------------------
// PhysicsBody
// ---------------------------------------------------------------------------

/// The player-controlled body.  `x` never changes during a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhysicsBody {
    pub x: f64,
    pub y: f64,
    pub velocity_y: f64,
    pub radius: u32,
}

impl PhysicsBody {
    pub fn new(x: f64, y: f64, radius: u32) -> Self {
        Self {
            x,
            y,
            velocity_y: 0.0,
            radius,
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.bird_x, config.bird_start_y, config.bird_radius)
    }

    fn r(&self) -> f64 {
        self.radius as f64
    }

    pub fn left(&self) -> f64 {
        self.x - self.r()
    }

    pub fn right(&self) -> f64 {
        self.x + self.r()
    }

    pub fn top(&self) -> f64 {
        self.y - self.r()
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.r()
    }
}

// ---------------------------------------------------------------------------
// Obstacle
// ---------------------------------------------------------------------------

/// A pipe pair with a passable gap `[gap_y, gap_y + gap_height]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Obstacle {
    pub x: f64,
    pub gap_y: f64,
    pub gap_height: u32,
    pub width: u32,
    pub passed: bool,
}

impl Obstacle {
    pub fn right(&self) -> f64 {
        self.x + self.width as f64
    }

    pub fn gap_bottom(&self) -> f64 {
        self.gap_y + self.gap_height as f64
    }

    /// `true` when the body's bounding box overlaps this obstacle's columns.
    pub fn overlaps(&self, body: &PhysicsBody) -> bool {
        body.right() > self.x && body.left() < self.right()
    }

    /// `true` when the body overlaps horizontally and pokes out of the gap.
    pub fn hits(&self, body: &PhysicsBody) -> bool {
        self.overlaps(body) && (body.top() < self.gap_y || body.bottom() > self.gap_bottom())
    }
}

// ---------------------------------------------------------------------------
// ObstacleTrack
// ---------------------------------------------------------------------------

/// Ordered obstacles (ascending `x`) plus the spawn rules.
#[derive(Debug, Clone)]
pub struct ObstacleTrack {
    obstacles: Vec<Obstacle>,
    rng: StdRng,
    field_width: f64,
    spawn_distance: f64,
    gap_height: u32,
    width: u32,
    gap_range: (i64, i64),
}

impl ObstacleTrack {
    pub fn new(config: &GameConfig, rng: StdRng) -> Self {
        let lo = config.min_gap_y.ceil() as i64;
        let hi = ((config.height - config.gap_floor_margin).floor() as i64).max(lo);
        Self {
            obstacles: Vec::new(),
            rng,
            field_width: config.width,
            spawn_distance: config.pipe_spawn_distance,
            gap_height: config.pipe_gap_height,
            width: config.pipe_width,
            gap_range: (lo, hi),
        }
    }

    /// Replace the track with `count` obstacles spaced one spawn distance
    /// apart, starting at the right edge.
    pub fn seed(&mut self, count: usize) {
        self.obstacles.clear();
        for i in 0..count {
            self.spawn_at(self.field_width + i as f64 * self.spawn_distance);
        }
    }

    /// Append an obstacle at `x` with a random gap.
    pub fn spawn_at(&mut self, x: f64) {
        let (lo, hi) = self.gap_range;
        let gap_y = self.rng.gen_range(lo..=hi) as f64;
        self.obstacles.push(Obstacle {
            x,
            gap_y,
            gap_height: self.gap_height,
            width: self.width,
            passed: false,
        });
    }

    /// Move every obstacle left by `speed`, drop the ones fully off-screen,
    /// and spawn at the right edge once the last one has travelled a spawn
    /// distance.
    pub fn advance(&mut self, speed: f64) {
        for obstacle in &mut self.obstacles {
            obstacle.x -= speed;
        }
        self.obstacles.retain(|o| o.right() >= 0.0);

        let due = self
            .obstacles
            .last()
            .map_or(true, |last| last.x < self.field_width - self.spawn_distance);
        if due {
            self.spawn_at(self.field_width);
        }
    }

    /// `true` if any obstacle blocks `body`.
    pub fn collides(&self, body: &PhysicsBody) -> bool {
        self.obstacles.iter().any(|o| o.hits(body))
    }

    /// Mark obstacles whose right edge is behind the body as passed and
    /// return how many were newly passed.
    pub fn mark_passed(&mut self, body: &PhysicsBody) -> u32 {
        let mut newly = 0;
        for obstacle in self.obstacles.iter_mut().filter(|o| !o.passed) {
            if obstacle.right() < body.x {
                obstacle.passed = true;
                newly += 1;
            }
        }
        newly
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    #[cfg(test)]
    pub(crate) fn obstacles_mut(&mut self) -> &mut Vec<Obstacle> {
        &mut self.obstacles
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn track() -> ObstacleTrack {
        ObstacleTrack::new(&GameConfig::default(), StdRng::seed_from_u64(1))
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

    #[test]
    fn seed_spaces_obstacles_from_right_edge() {
        let mut t = track();
        t.seed(3);
        let xs: Vec<f64> = t.obstacles().iter().map(|o| o.x).collect();
        assert_eq!(xs, vec![800.0, 1100.0, 1400.0]);
    }

    #[test]
    fn gaps_are_drawn_from_allowed_band() {
        let mut t = track();
        for _ in 0..500 {
            t.spawn_at(800.0);
        }
        assert!(t
            .obstacles()
            .iter()
            .all(|o| (100.0..=400.0).contains(&o.gap_y) && o.gap_y.fract() == 0.0));
    }

    #[test]
    fn obstacle_reaches_left_edge_after_267_ticks() {
        let mut t = track();
        t.spawn_at(800.0);
        for _ in 0..267 {
            t.advance(3.0);
        }
        let first = t.obstacles()[0];
        assert!((first.x - (800.0 - 801.0)).abs() < 1e-9);
        assert!(first.x.abs() <= 3.0);
    }

    #[test]
    fn obstacle_removed_once_fully_off_screen() {
        let mut t = track();
        t.spawn_at(800.0);
        // x + 50 < 0 first holds at tick 284 (x = -52)
        for _ in 0..283 {
            t.advance(3.0);
        }
        assert_eq!(t.obstacles()[0].x, -49.0);
        t.advance(3.0);
        assert!(t.obstacles().iter().all(|o| o.x > 0.0));
    }

    #[test]
    fn spawns_when_last_obstacle_moves_past_spawn_distance() {
        let mut t = track();
        t.spawn_at(800.0);
        // Needs last.x < 500 → after 101 ticks (x = 497)
        for _ in 0..100 {
            t.advance(3.0);
        }
        assert_eq!(t.obstacles().len(), 1);
        t.advance(3.0);
        assert_eq!(t.obstacles().len(), 2);
        assert_eq!(t.obstacles()[1].x, 800.0);
    }

    #[test]
    fn empty_track_spawns_immediately() {
        let mut t = track();
        t.advance(3.0);
        assert_eq!(t.obstacles().len(), 1);
    }

    #[test]
    fn obstacles_stay_ordered_by_x() {
        let mut t = track();
        t.seed(3);
        for _ in 0..2_000 {
            t.advance(3.0);
            let xs: Vec<f64> = t.obstacles().iter().map(|o| o.x).collect();
            assert!(xs.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn collision_requires_horizontal_overlap() {
        let body = PhysicsBody::new(100.0, 50.0, 20);
        // Gap 200..320, body spans 30..70 vertically → outside gap.
        assert!(pipe(110.0, 200.0).hits(&body));
        assert!(!pipe(120.0, 200.0).hits(&body)); // touching edge only
        assert!(!pipe(30.0, 200.0).hits(&body)); // right edge at 80 == body.left
    }

    #[test]
    fn body_inside_gap_does_not_collide() {
        let body = PhysicsBody::new(100.0, 260.0, 20);
        assert!(!pipe(90.0, 200.0).hits(&body)); // 240..280 within 200..320
        let low = PhysicsBody::new(100.0, 305.0, 20);
        assert!(pipe(90.0, 200.0).hits(&low)); // bottom 325 > 320
    }

    #[test]
    fn passing_counts_each_obstacle_once() {
        let mut t = track();
        t.obstacles_mut().push(pipe(40.0, 200.0));
        let body = PhysicsBody::new(100.0, 260.0, 20);

        assert_eq!(t.mark_passed(&body), 1);
        assert_eq!(t.mark_passed(&body), 0);
        assert!(t.obstacles()[0].passed);
    }

    #[test]
    fn right_edge_level_with_body_is_not_yet_passed() {
        let mut t = track();
        t.obstacles_mut().push(pipe(50.0, 200.0));
        let body = PhysicsBody::new(100.0, 260.0, 20);
        assert_eq!(t.mark_passed(&body), 0);
    }
}
