//! Session Statistics
//!
//! The numbers a session tracks between menu entries: how long the current
//! run has lasted, what it scored, and the best score known for the player.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics owned by the session controller.
///
/// `score <= best_score` is only reconciled at game over; during a run the
/// score is free to overtake the best.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Elapsed time of the current run, in seconds.
    pub elapsed_time: f64,
    /// Score of the current run.
    pub score: u32,
    /// Best score known for the player.
    pub best_score: u32,
}

impl SessionStats {
    /// Zero-valued stats, as created at startup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build stats hydrated from a transport load.
    pub fn from_seed(seed: StatsSeed) -> Self {
        Self {
            elapsed_time: seed.elapsed_time,
            score: 0,
            best_score: seed.best_score,
        }
    }

    /// The seed handed to the running scene.
    pub fn seed(&self) -> StatsSeed {
        StatsSeed {
            elapsed_time: self.elapsed_time,
            best_score: self.best_score,
        }
    }

    /// Update the in-run numbers.
    pub fn record_progress(&mut self, score: u32, elapsed_time: f64) {
        self.score = score;
        self.elapsed_time = sanitize_elapsed(elapsed_time);
    }

    /// Apply a finished run. Returns true if the run set a new best.
    pub fn apply_outcome(&mut self, outcome: GameOutcome) -> bool {
        self.record_progress(outcome.score, outcome.elapsed_time);
        if self.score > self.best_score {
            self.best_score = self.score;
            true
        } else {
            false
        }
    }

    /// Clear the per-run numbers before returning to the menu.
    ///
    /// The best score survives the reset.
    pub fn reset_run(&mut self) {
        self.elapsed_time = 0.0;
        self.score = 0;
    }
}

/// `{ elapsedTime, bestScore }` pair: the result of a stats load and the
/// payload of the running scene.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSeed {
    /// Elapsed time, in seconds.
    pub elapsed_time: f64,
    /// Best score.
    pub best_score: u32,
}

impl StatsSeed {
    /// Create a seed.
    pub fn new(elapsed_time: f64, best_score: u32) -> Self {
        Self {
            elapsed_time: sanitize_elapsed(elapsed_time),
            best_score,
        }
    }
}

/// Final numbers reported by the running scene when the game ends.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GameOutcome {
    /// Final score.
    pub score: u32,
    /// Final elapsed time, in seconds.
    pub elapsed_time: f64,
}

impl GameOutcome {
    /// Create an outcome.
    pub fn new(score: u32, elapsed_time: f64) -> Self {
        Self {
            score,
            elapsed_time: sanitize_elapsed(elapsed_time),
        }
    }
}

/// What the game-over scene renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameOverSummary {
    /// Final score.
    pub score: u32,
    /// Final elapsed time, in seconds.
    pub elapsed_time: f64,
    /// Best score after reconciling with this run.
    pub best_score: u32,
    /// Whether this run raised the best score.
    pub new_best: bool,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
}

/// Elapsed time is non-negative and finite.
fn sanitize_elapsed(elapsed_time: f64) -> f64 {
    if elapsed_time.is_finite() && elapsed_time > 0.0 {
        elapsed_time
    } else {
        0.0
    }
}

// =============================================================================
// TESTS
// =============================================================================
