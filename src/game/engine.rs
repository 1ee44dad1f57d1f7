//! Fixed-cadence driver for the [`World`].
//!
//! [`GameLoop`] owns the world behind a mutex and a dedicated `game-loop`
//! thread that polls the clock every millisecond.  A tick runs only once a
//! full tick interval has elapsed since the previous one; missed ticks are
//! skipped, never replayed.
//!
//! After every tick (and every control call) a [`GameSnapshot`] built under
//! the lock is published on a `tokio::sync::watch` channel.
//!
//! A panic inside a tick is caught at the tick boundary and logged; the
//! loop keeps going and the poisoned lock is recovered on the next access.
//!
//! At most one loop thread exists at a time.  A thread that is still inside
//! a tick when [`GameLoop::stop`] gives up stays owned by the loop, and
//! [`GameLoop::start`] will not spawn a replacement until it has exited.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;

use crate::breathing::BreathType;
use crate::config::GameConfig;

use super::state::{GameSnapshot, GameStats};
use super::world::World;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

type SharedWorld = Arc<Mutex<World>>;

fn lock_world(world: &Mutex<World>) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// One spawned loop thread and the flag that stops it.
struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    /// Not asked to stop and not exited.
    fn is_live(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.handle.is_finished()
    }
}

// ---------------------------------------------------------------------------
// GameLoop
// ---------------------------------------------------------------------------

pub struct GameLoop {
    world: SharedWorld,
    worker: Mutex<Option<Worker>>,
    snapshots: Arc<watch::Sender<GameSnapshot>>,
    tick_interval: Duration,
    stop_timeout: Duration,
}

impl GameLoop {
    /// Obstacle gaps drawn from an entropy-seeded RNG.
    pub fn new(config: &GameConfig, stop_timeout: Duration) -> Self {
        Self::with_rng(config, stop_timeout, StdRng::from_entropy())
    }

    pub fn with_rng(config: &GameConfig, stop_timeout: Duration, rng: StdRng) -> Self {
        let now = Instant::now();
        let world = World::new(config.clone(), rng, now);
        let (snapshots, _) = watch::channel(world.snapshot(now));
        Self {
            world: Arc::new(Mutex::new(world)),
            worker: Mutex::new(None),
            snapshots: Arc::new(snapshots),
            tick_interval: config.tick_interval(),
            stop_timeout,
        }
    }

    // -----------------------------------------------------------------------
    // Thread management
    // -----------------------------------------------------------------------

    /// Spawn the loop thread if it is not alive, then move an `Idle` world
    /// to `Running`.  Calling it again is harmless.
    ///
    /// A previous thread that was stopped but is still finishing a tick is
    /// given up to the stop timeout to exit.  If it is still busy after
    /// that, no new thread is spawned.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread.
    pub fn start(&self) {
        {
            let mut slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
            *slot = match slot.take() {
                Some(worker) if worker.is_live() => Some(worker),
                Some(worker) => match self.retire(worker) {
                    Some(busy) => {
                        log::warn!(
                            "game loop: previous thread has not exited, not spawning another"
                        );
                        Some(busy)
                    }
                    None => Some(self.spawn_worker()),
                },
                None => Some(self.spawn_worker()),
            };
        }
        self.update(|world, now| world.start(now));
    }

    fn spawn_worker(&self) -> Worker {
        let running = Arc::new(AtomicBool::new(true));
        let world = Arc::clone(&self.world);
        let snapshots = Arc::clone(&self.snapshots);
        let flag = Arc::clone(&running);
        let interval = self.tick_interval;

        let handle = thread::Builder::new()
            .name("game-loop".into())
            .spawn(move || run_loop(&world, &flag, &snapshots, interval))
            .expect("failed to spawn game-loop thread");

        log::info!(
            "game loop: started ({:.0} Hz)",
            1.0 / interval.as_secs_f64().max(f64::EPSILON)
        );
        Worker { running, handle }
    }

    /// Stop the loop thread and wait for it, up to the stop timeout.
    ///
    /// An in-flight tick completes first.  A thread that outlives the
    /// timeout is kept with a warning and exits once its tick returns.
    /// The world keeps its phase.
    pub fn stop(&self) {
        let mut slot = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(worker) = slot.take() else {
            return;
        };

        match self.retire(worker) {
            None => log::info!("game loop: stopped"),
            Some(busy) => {
                log::warn!(
                    "game loop: thread still busy after {:?}, it exits after its tick",
                    self.stop_timeout
                );
                *slot = Some(busy);
            }
        }
    }

    /// Clear the worker's flag and join it if it exits within the stop
    /// timeout.  Hands the worker back when it is still busy.
    fn retire(&self, worker: Worker) -> Option<Worker> {
        worker.running.store(false, Ordering::Release);
        let deadline = Instant::now() + self.stop_timeout;
        while !worker.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }

        if !worker.handle.is_finished() {
            return Some(worker);
        }
        if worker.handle.join().is_err() {
            log::error!("game loop: thread exited with a panic");
        }
        None
    }

    /// `true` while a loop thread is alive and not asked to stop.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(Worker::is_live)
    }

    #[cfg(test)]
    fn worker_thread(&self) -> Option<thread::ThreadId> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|w| w.handle.thread().id())
    }

    // -----------------------------------------------------------------------
    // World control
    // -----------------------------------------------------------------------

    /// Run `f` under the world lock, then publish a fresh snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut World, Instant) -> R) -> R {
        let now = Instant::now();
        let (result, snapshot) = {
            let mut world = lock_world(&self.world);
            let result = f(&mut world, now);
            (result, world.snapshot(now))
        };
        self.snapshots.send_replace(snapshot);
        result
    }

    pub fn pause(&self) -> bool {
        self.update(|world, _| world.pause())
    }

    pub fn resume(&self) -> bool {
        self.update(|world, _| world.resume())
    }

    pub fn toggle_pause(&self) -> bool {
        self.update(|world, _| world.toggle_pause())
    }

    /// Back to `Idle` with fresh entities; the loop thread keeps running.
    pub fn reset(&self) {
        self.update(|world, now| world.reset(now));
        log::info!("game: reset");
    }

    /// Returns the multiplier in effect.
    pub fn adjust_difficulty(&self, multiplier: f64) -> f64 {
        self.update(|world, _| world.adjust_difficulty(multiplier))
    }

    /// Returns `true` if the impulse was applied.
    pub fn on_breathing_input(&self, kind: BreathType, volume: f64) -> bool {
        self.update(|world, now| world.on_breathing_input(kind, volume, now))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn game_state(&self) -> GameSnapshot {
        lock_world(&self.world).snapshot(Instant::now())
    }

    pub fn stats(&self) -> GameStats {
        lock_world(&self.world).stats(Instant::now())
    }

    /// Receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<GameSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}

impl Drop for GameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    world: &Mutex<World>,
    running: &AtomicBool,
    snapshots: &watch::Sender<GameSnapshot>,
    interval: Duration,
) {
    let mut last_tick = Instant::now();

    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now.duration_since(last_tick) >= interval {
            last_tick = now;

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut world = lock_world(world);
                world.tick(now).then(|| world.snapshot(now))
            }));

            match outcome {
                Ok(Some(snapshot)) => {
                    snapshots.send_replace(snapshot);
                }
                Ok(None) => {}
                Err(payload) => {
                    log::error!("game loop: tick panicked: {}", panic_message(&*payload));
                }
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::TickFault;
    use crate::game::GamePhase;

    fn game() -> GameLoop {
        GameLoop::with_rng(
            &GameConfig::default(),
            Duration::from_secs(1),
            StdRng::seed_from_u64(5),
        )
    }

    #[test]
    fn new_loop_is_idle_and_not_running() {
        let g = game();
        assert!(!g.is_running());
        assert_eq!(g.game_state().phase, GamePhase::Idle);
    }

    #[test]
    fn start_runs_ticks_and_stop_joins() {
        let g = game();
        g.start();
        assert!(g.is_running());
        assert_eq!(g.game_state().phase, GamePhase::Running);

        thread::sleep(Duration::from_millis(120));
        let state = g.game_state();
        assert!(state.body.velocity_y > 0.0);
        assert!(state.obstacles[0].x < 800.0);

        let started = Instant::now();
        g.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!g.is_running());
    }

    #[test]
    fn start_twice_keeps_one_thread() {
        let g = game();
        g.start();
        g.start();
        assert!(g.is_running());
        g.stop();
        g.stop();
        assert!(!g.is_running());
    }

    #[test]
    fn tick_count_never_exceeds_elapsed_intervals() {
        let g = game();
        let began = Instant::now();
        g.start();
        thread::sleep(Duration::from_millis(200));
        g.stop();
        let elapsed = began.elapsed();

        // Falling from rest gains 0.5 per tick; catch-up would overshoot.
        let max_ticks = (elapsed.as_secs_f64() / g.tick_interval().as_secs_f64()).floor();
        let state = g.game_state();
        assert!(state.body.velocity_y <= 0.5 * max_ticks);
    }

    #[test]
    fn paused_world_does_not_advance() {
        let g = game();
        g.start();
        thread::sleep(Duration::from_millis(50));
        assert!(g.pause());
        let frozen = g.game_state().body;

        thread::sleep(Duration::from_millis(80));
        assert_eq!(g.game_state().body, frozen);
        assert!(g.game_state().paused);

        assert!(g.toggle_pause());
        assert_eq!(g.game_state().phase, GamePhase::Running);
        g.stop();
    }

    #[test]
    fn reset_returns_to_idle_while_thread_lives() {
        let g = game();
        g.start();
        thread::sleep(Duration::from_millis(40));
        g.reset();

        let state = g.game_state();
        assert_eq!(state.phase, GamePhase::Idle);
        assert_eq!(state.body.y, 250.0);
        assert!(g.is_running());

        g.start();
        assert_eq!(g.game_state().phase, GamePhase::Running);
        g.stop();
    }

    #[test]
    fn breathing_input_only_applies_while_running() {
        let g = game();
        assert!(!g.on_breathing_input(BreathType::Inhale, 200.0));
        g.start();
        assert!(g.on_breathing_input(BreathType::Inhale, 200.0));
        assert!(g.game_state().impulse_active);
        g.stop();
    }

    #[test]
    fn control_calls_publish_snapshots() {
        let g = game();
        let mut rx = g.subscribe();

        g.adjust_difficulty(2.0);
        assert!(rx.has_changed().unwrap());
        g.start();
        assert_eq!(rx.borrow_and_update().phase, GamePhase::Running);
        g.stop();
    }

    #[test]
    fn tick_panic_is_contained_and_ticks_resume() {
        let g = game();
        lock_world(&g.world).set_fault(Some(TickFault::Panic));
        g.start();
        thread::sleep(Duration::from_millis(100));

        assert!(g.is_running());
        assert!(g.world.is_poisoned());
        let stuck = g.game_state();
        assert_eq!(stuck.phase, GamePhase::Running);
        assert_eq!(stuck.body.velocity_y, 0.0);
        assert_eq!(stuck.obstacles[0].x, 800.0);

        lock_world(&g.world).set_fault(None);
        thread::sleep(Duration::from_millis(100));
        let state = g.game_state();
        assert!(state.body.velocity_y > 0.0);
        assert!(state.obstacles[0].x < 800.0);

        g.stop();
        assert!(!g.is_running());
    }

    #[test]
    fn restart_never_runs_two_loop_threads() {
        let g = GameLoop::with_rng(
            &GameConfig::default(),
            Duration::from_millis(10),
            StdRng::seed_from_u64(5),
        );
        lock_world(&g.world).set_fault(Some(TickFault::Stall(Duration::from_millis(300))));
        g.start();
        let first = g.worker_thread().expect("loop thread spawned");

        // Wait until the first tick holds the world lock.
        let deadline = Instant::now() + Duration::from_secs(1);
        while g.world.try_lock().is_ok() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }

        g.stop();
        assert!(!g.is_running());
        assert_eq!(g.worker_thread(), Some(first));

        g.start();
        assert_eq!(g.worker_thread(), Some(first));

        lock_world(&g.world).set_fault(None);
        thread::sleep(Duration::from_millis(50));
        g.start();
        let second = g.worker_thread().expect("loop thread respawned");
        assert_ne!(second, first);
        assert!(g.is_running());

        g.stop();
        assert!(!g.is_running());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(&*payload), "boom");
        let payload = panic::catch_unwind(|| panic!("{}", String::from("owned"))).unwrap_err();
        assert_eq!(panic_message(&*payload), "owned");
    }

    #[test]
    fn game_loop_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GameLoop>();
    }
}
