//! Core session data.
//!
//! Plain values shared by every layer: the stats a session tracks and the
//! configuration it starts from. Nothing here does I/O except reading the
//! environment.

pub mod config;
pub mod stats;

// Re-export core types
pub use config::{ConfigError, SessionConfig};
pub use stats::{GameOutcome, GameOverSummary, SessionStats, StatsSeed};
