//! Game Session Module
//!
//! Everything between startup and teardown of one player's session.
//!
//! ## Module Structure
//!
//! - `assets`: Asset manifest and the all-or-nothing loader
//! - `scene`: The menu, running and game-over scenes
//! - `session`: Session controller and the host handle

pub mod assets;
pub mod scene;
pub mod session;

// Re-export key types
pub use assets::{AssetError, AssetLoader, AssetManifest, AssetSource, DefaultAssetSource, LoadedAssets};
pub use scene::{MenuView, RunStart, Scene, SceneHandler, SceneKind, SceneRegistry};
pub use session::{RunSignal, SessionController, SessionError, SessionHandle, SessionPhase, SessionSnapshot};
