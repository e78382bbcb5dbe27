//! tandem-core - two-deck DJ mixing engine
//!
//! Two independent transport decks (gain, speed, seek, loop), an additive
//! mixer, a crossfader, per-deck play queues with end-of-track advance,
//! and a flat-text track library. The audio callback owns the engine;
//! the control domain talks to it through a lock-free command queue and
//! reads state back through per-deck atomics.

pub mod audio;
pub mod config;
pub mod engine;
pub mod library;
pub mod queue;
pub mod session;
pub mod track;
pub mod types;

pub use types::*;
