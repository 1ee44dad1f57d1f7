//! The breathing-driven side-scroller.
//!
//! [`World`] holds the simulation and is advanced one tick at a time;
//! [`GameLoop`] drives it from a dedicated thread at the configured rate and
//! publishes a [`GameSnapshot`] after every change.

pub mod engine;
pub mod entities;
pub mod state;
pub mod world;

pub use engine::GameLoop;
pub use entities::{Obstacle, ObstacleTrack, PhysicsBody};
pub use state::{GamePhase, GameSnapshot, GameStats};
pub use world::{World, MAX_DIFFICULTY, MIN_DIFFICULTY};
