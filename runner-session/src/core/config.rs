//! Session Configuration
//!
//! Everything the session needs from its host: stats store endpoints, the
//! identity to present, asset locations and timings. Built from defaults and
//! overridden from `RUNNER_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::network::identity::Identity;

/// Default game name used in stats store paths and payloads.
pub const DEFAULT_GAME_NAME: &str = "endless-runner";

/// Default delay before the game-over scene returns to the menu.
pub const DEFAULT_GAME_OVER_DELAY: Duration = Duration::from_secs(3);

/// Default per-request timeout for stats store calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Session configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Base URL of the primary stats store.
    pub primary_url: String,
    /// Base URL of the fallback stats store.
    pub fallback_url: String,
    /// Bearer credential presented to the stats store.
    pub session_token: String,
    /// Selected subject (child profile) presented to the stats store.
    pub selected_subject_id: String,
    /// Game name used in paths and payloads.
    pub game_name: String,
    /// Level reported with every save.
    pub level: u32,
    /// Root directory for filesystem assets.
    pub asset_root: PathBuf,
    /// Optional JSON manifest replacing the built-in one.
    pub manifest_path: Option<PathBuf>,
    /// Delay before game over returns to the menu.
    pub game_over_delay: Duration,
    /// Timeout applied to each stats store request.
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            primary_url: "http://127.0.0.1:8080".to_string(),
            fallback_url: "http://127.0.0.1:8081".to_string(),
            session_token: String::new(),
            selected_subject_id: String::new(),
            game_name: DEFAULT_GAME_NAME.to_string(),
            level: 1,
            asset_root: PathBuf::from("assets"),
            manifest_path: None,
            game_over_delay: DEFAULT_GAME_OVER_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("RUNNER_PRIMARY_URL") {
            config.primary_url = url;
        }
        if let Some(url) = lookup("RUNNER_FALLBACK_URL") {
            config.fallback_url = url;
        }
        if let Some(token) = lookup("RUNNER_TOKEN") {
            config.session_token = token;
        }
        if let Some(child) = lookup("RUNNER_SELECTED_CHILD") {
            config.selected_subject_id = child;
        }
        if let Some(name) = lookup("RUNNER_GAME_NAME") {
            if name.trim().is_empty() {
                return Err(ConfigError::Empty("RUNNER_GAME_NAME"));
            }
            config.game_name = name;
        }
        if let Some(level) = lookup("RUNNER_LEVEL") {
            config.level = parse_number("RUNNER_LEVEL", &level)?;
        }
        if let Some(root) = lookup("RUNNER_ASSET_ROOT") {
            config.asset_root = PathBuf::from(root);
        }
        if let Some(manifest) = lookup("RUNNER_MANIFEST") {
            config.manifest_path = Some(PathBuf::from(manifest));
        }
        if let Some(ms) = lookup("RUNNER_GAME_OVER_DELAY_MS") {
            config.game_over_delay = Duration::from_millis(parse_number("RUNNER_GAME_OVER_DELAY_MS", &ms)?);
        }
        if let Some(ms) = lookup("RUNNER_REQUEST_TIMEOUT_MS") {
            let ms: u64 = parse_number("RUNNER_REQUEST_TIMEOUT_MS", &ms)?;
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    key: "RUNNER_REQUEST_TIMEOUT_MS",
                    value: "0".into(),
                });
            }
            config.request_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Identity presented on every stats store request.
    pub fn identity(&self) -> Identity {
        Identity::new(self.session_token.clone(), self.selected_subject_id.clone())
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable held a value that could not be used.
    #[error("invalid value for {key}: {value:?}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
    },
    /// A variable that must not be blank was blank.
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

// =============================================================================
// TESTS
// =============================================================================
