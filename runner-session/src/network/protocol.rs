//! Protocol Messages
//!
//! Wire format for the stats store. Both the primary and the fallback store
//! speak the same JSON schema over HTTP.

use serde::{Deserialize, Serialize};

use crate::core::stats::StatsSeed;

/// Path segments of the save endpoint (`POST /game/saveGameData`).
pub const SAVE_SEGMENTS: [&str; 2] = ["game", "saveGameData"];

/// Path segments of the load endpoint, before the game name
/// (`GET /game/loadGameData/{gameName}`).
pub const LOAD_SEGMENTS: [&str; 2] = ["game", "loadGameData"];

/// Header carrying the selected subject.
pub const SELECTED_CHILD_HEADER: &str = "selectedchild";

// =============================================================================
// CLIENT -> STORE
// =============================================================================

/// Body of a save request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveGameRequest {
    /// Game the stats belong to.
    pub game_name: String,
    /// Elapsed time of the run, in seconds.
    pub duration: f64,
    /// Final score of the run.
    pub score: u32,
    /// Level the run was played at.
    pub level: u32,
}

impl SaveGameRequest {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// STORE -> CLIENT
// =============================================================================

/// Body of a load response.
///
/// Numbers arrive as JSON numbers of unknown flavor, so both fields are read
/// as floats and checked in [`LoadGameResponse::into_seed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadGameResponse {
    /// Stored elapsed time, in seconds.
    pub duration: f64,
    /// Stored (best) score.
    pub score: f64,
}

impl LoadGameResponse {
    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Map `{ duration, score }` to `{ elapsedTime, bestScore }`.
    ///
    /// Fails on negative, non-finite or out-of-range values. A fractional
    /// score is truncated.
    pub fn into_seed(self) -> Result<StatsSeed, String> {
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(format!("invalid duration {}", self.duration));
        }
        if !self.score.is_finite() || self.score < 0.0 || self.score > u32::MAX as f64 {
            return Err(format!("invalid score {}", self.score));
        }
        Ok(StatsSeed::new(self.duration, self.score.trunc() as u32))
    }
}

// =============================================================================
// TESTS
// =============================================================================
