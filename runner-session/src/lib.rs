//! # Runner Session
//!
//! Session lifecycle manager for an endless-runner game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RUNNER SESSION                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Session data                              │
//! │  ├── stats.rs    - Elapsed time, score, best score           │
//! │  └── config.rs   - Environment configuration                 │
//! │                                                              │
//! │  game/           - Session lifecycle                         │
//! │  ├── assets.rs   - Manifest and concurrent asset loading     │
//! │  ├── scene.rs    - Menu, running and game-over scenes        │
//! │  └── session.rs  - Controller task and host handle           │
//! │                                                              │
//! │  network/        - Outside world                             │
//! │  ├── transport.rs- Primary/fallback stats stores             │
//! │  ├── http.rs     - HTTP stats backend                        │
//! │  ├── protocol.rs - Wire types                                │
//! │  ├── identity.rs - Session token and selected child          │
//! │  └── access.rs   - Access gate                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Policy
//!
//! - Stats store failures are absorbed: loads fall back to zeros, saves are
//!   logged and dropped. They never change which scene is shown.
//! - Asset failures are fatal at startup; the menu is never shown.
//! - The return to the menu after a game over never waits on a save.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::config::SessionConfig;
pub use core::stats::{GameOutcome, SessionStats, StatsSeed};
pub use game::assets::{AssetLoader, AssetManifest};
pub use game::scene::{SceneHandler, SceneKind};
pub use game::session::{SessionController, SessionError, SessionHandle, SessionPhase};
pub use network::transport::StatsTransport;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
