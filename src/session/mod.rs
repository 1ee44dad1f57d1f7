//! Session lifecycle: ties the breathing detector to the game loop.

pub mod controller;

pub use controller::{SessionController, SessionError};
