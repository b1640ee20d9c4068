//! Scenes
//!
//! The three phases a player sees. Scenes form a closed set, so every
//! activation is dispatched through one exhaustive match and there is no
//! such thing as an unregistered scene at runtime.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::stats::{GameOverSummary, StatsSeed};
use crate::game::assets::LoadedAssets;
use crate::game::session::RunSignal;

/// Scene identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SceneKind {
    /// Main menu.
    Menu,
    /// The game itself.
    Running,
    /// Final stats, shown before returning to the menu.
    GameOver,
}

impl SceneKind {
    /// External name of the scene.
    pub fn name(&self) -> &'static str {
        match self {
            SceneKind::Menu => "menu",
            SceneKind::Running => "running",
            SceneKind::GameOver => "game-over",
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SceneKind {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "menu" => Ok(SceneKind::Menu),
            "running" => Ok(SceneKind::Running),
            "game-over" => Ok(SceneKind::GameOver),
            other => Err(SceneError::Unknown(other.to_string())),
        }
    }
}

/// Scene errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SceneError {
    /// Name does not match any scene.
    #[error("unknown scene {0:?}")]
    Unknown(String),
}

/// Payload of the menu scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MenuView {
    /// Best score known for the player.
    pub best_score: u32,
    /// Runs started in this session.
    pub runs: u64,
}

/// Payload of the running scene.
pub struct RunStart {
    /// Stats handed to the game runtime.
    pub seed: StatsSeed,
    /// Loaded media.
    pub assets: Arc<LoadedAssets>,
    /// Channel back to the session for progress and the end of the run.
    pub signal: RunSignal,
}

impl fmt::Debug for RunStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunStart")
            .field("seed", &self.seed)
            .field("run", &self.signal.run())
            .finish()
    }
}

/// A scene activation with its payload.
#[derive(Debug)]
pub enum Scene {
    /// Show the menu.
    Menu(MenuView),
    /// Start the game runtime.
    Running(RunStart),
    /// Show final stats.
    GameOver(GameOverSummary),
}

impl Scene {
    /// Which scene this activates.
    pub fn kind(&self) -> SceneKind {
        match self {
            Scene::Menu(_) => SceneKind::Menu,
            Scene::Running(_) => SceneKind::Running,
            Scene::GameOver(_) => SceneKind::GameOver,
        }
    }
}

/// Behavior of every scene, provided by the host.
///
/// Scene methods run on the session task and must not block; a running
/// scene hands the [`RunSignal`] to its game runtime and returns.
pub trait SceneHandler: Send + 'static {
    /// Menu entered.
    fn menu(&mut self, view: &MenuView);

    /// Run started.
    fn running(&mut self, start: RunStart);

    /// Run ended.
    fn game_over(&mut self, summary: &GameOverSummary);

    /// Scene left, either for another scene or because the session closed.
    fn leave(&mut self, _scene: SceneKind) {}
}

/// Holds the scene behaviors and the currently active scene.
pub struct SceneRegistry {
    handler: Box<dyn SceneHandler>,
    active: Option<SceneKind>,
    activations: u64,
}

impl SceneRegistry {
    /// Create a registry with every scene registered.
    pub fn new<H: SceneHandler>(handler: H) -> Self {
        Self {
            handler: Box::new(handler),
            active: None,
            activations: 0,
        }
    }

    /// Replace the registered behaviors.
    pub fn register<H: SceneHandler>(&mut self, handler: H) {
        warn!("Scene handler replaced");
        self.handler = Box::new(handler);
    }

    /// Activate a scene, leaving the current one first.
    pub fn activate(&mut self, scene: Scene) {
        self.deactivate();

        let kind = scene.kind();
        info!(scene = %kind, "Activating scene");

        match scene {
            Scene::Menu(view) => self.handler.menu(&view),
            Scene::Running(start) => self.handler.running(start),
            Scene::GameOver(summary) => self.handler.game_over(&summary),
        }

        self.active = Some(kind);
        self.activations += 1;
    }

    /// Leave the active scene, if any.
    pub fn deactivate(&mut self) {
        if let Some(previous) = self.active.take() {
            self.handler.leave(previous);
        }
    }

    /// Currently active scene.
    pub fn active(&self) -> Option<SceneKind> {
        self.active
    }

    /// Number of activations so far.
    pub fn activations(&self) -> u64 {
        self.activations
    }
}

// =============================================================================
// TESTS
// =============================================================================
