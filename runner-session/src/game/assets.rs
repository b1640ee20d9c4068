//! Asset Loading
//!
//! The manifest of media the running scene needs and the loader that fetches
//! all of it as one join. There is no fallback for missing media: any failed
//! fetch fails the whole load.

use async_trait::async_trait;
use futures_util::future::{try_join3, try_join_all};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

// =============================================================================
// MANIFEST
// =============================================================================

/// Everything the running scene needs loaded before it can start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    /// Sprite sheets by name.
    pub sprite_sheets: BTreeMap<String, SpriteSheetSpec>,
    /// The single font.
    pub font: FontSpec,
    /// Audio clips by name, each a path or URL.
    #[serde(default)]
    pub audio: BTreeMap<String, String>,
}

/// One sprite sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSheetSpec {
    /// Path or URL of the image.
    pub path: String,
    /// Frame grid, if the image is sliced.
    #[serde(default)]
    pub grid: Option<FrameGrid>,
    /// Named animation ranges over the grid's frames.
    #[serde(default)]
    pub animations: BTreeMap<String, AnimationRange>,
}

/// Slicing of a sheet into equally sized frames, numbered row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGrid {
    /// Frames per row.
    pub columns: u32,
    /// Rows of frames.
    pub rows: u32,
}

/// Named range of frames played as an animation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationRange {
    /// First frame, inclusive.
    pub start: u32,
    /// Last frame, inclusive.
    pub end: u32,
    /// Whether playback wraps around.
    #[serde(default)]
    pub looping: bool,
    /// Playback speed in frames per second.
    pub frame_rate: f32,
}

/// The font resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    /// Name the scenes refer to the font by.
    pub name: String,
    /// Path or URL of the font file.
    pub path: String,
}

impl SpriteSheetSpec {
    /// Number of frames in the sheet; an unsliced sheet is one frame.
    pub fn frame_count(&self) -> u32 {
        self.grid.map(|g| g.columns.saturating_mul(g.rows)).unwrap_or(1)
    }
}

impl AssetManifest {
    /// Parse a manifest from JSON.
    pub fn from_json(json: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON manifest from disk.
    pub async fn from_file(path: &Path) -> Result<Self, AssetError> {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| AssetError::Io {
                location: path.display().to_string(),
                source: Arc::new(source),
            })?;
        Self::from_json(&json)
    }

    /// The manifest the runner ships with.
    pub fn runner_default() -> Self {
        let mut sprite_sheets = BTreeMap::new();

        let mut player_animations = BTreeMap::new();
        player_animations.insert(
            "run".to_string(),
            AnimationRange { start: 0, end: 5, looping: true, frame_rate: 12.0 },
        );
        player_animations.insert(
            "jump".to_string(),
            AnimationRange { start: 6, end: 7, looping: false, frame_rate: 8.0 },
        );
        sprite_sheets.insert(
            "player".to_string(),
            SpriteSheetSpec {
                path: "sprites/player.png".into(),
                grid: Some(FrameGrid { columns: 8, rows: 1 }),
                animations: player_animations,
            },
        );
        sprite_sheets.insert(
            "obstacle".to_string(),
            SpriteSheetSpec {
                path: "sprites/obstacle.png".into(),
                grid: None,
                animations: BTreeMap::new(),
            },
        );
        sprite_sheets.insert(
            "background".to_string(),
            SpriteSheetSpec {
                path: "sprites/background.png".into(),
                grid: None,
                animations: BTreeMap::new(),
            },
        );

        let audio = [
            ("jump", "audio/jump.mp3"),
            ("hit", "audio/hit.mp3"),
            ("theme", "audio/theme.mp3"),
        ]
        .into_iter()
        .map(|(name, path)| (name.to_string(), path.to_string()))
        .collect();

        Self {
            sprite_sheets,
            font: FontSpec {
                name: "runner".into(),
                path: "fonts/runner.ttf".into(),
            },
            audio,
        }
    }

    /// Check grids and animation ranges.
    pub fn validate(&self) -> Result<(), AssetError> {
        for (name, sheet) in &self.sprite_sheets {
            if let Some(grid) = sheet.grid {
                if grid.columns == 0 || grid.rows == 0 {
                    return Err(AssetError::InvalidManifest(format!(
                        "sheet {} has an empty {}x{} grid",
                        name, grid.columns, grid.rows
                    )));
                }
            }

            let frames = sheet.frame_count();
            for (anim, range) in &sheet.animations {
                if range.start > range.end {
                    return Err(AssetError::InvalidManifest(format!(
                        "{}.{}: start {} after end {}",
                        name, anim, range.start, range.end
                    )));
                }
                if range.end >= frames {
                    return Err(AssetError::InvalidManifest(format!(
                        "{}.{}: frame {} outside {} frames",
                        name, anim, range.end, frames
                    )));
                }
                if !(range.frame_rate.is_finite() && range.frame_rate > 0.0) {
                    return Err(AssetError::InvalidManifest(format!(
                        "{}.{}: frame rate must be positive",
                        name, anim
                    )));
                }
            }
        }
        Ok(())
    }

    /// Number of individual fetches a load performs.
    pub fn resource_count(&self) -> usize {
        self.sprite_sheets.len() + self.audio.len() + 1
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Asset loading errors. Any of these is fatal for the session attempt.
#[derive(Debug, Clone, Error)]
pub enum AssetError {
    /// Manifest is inconsistent.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Manifest JSON could not be parsed.
    #[error("manifest parse error: {0}")]
    Parse(Arc<serde_json::Error>),

    /// Filesystem read failed.
    #[error("failed to read {location}: {source}")]
    Io {
        /// Path that failed.
        location: String,
        /// Underlying error.
        source: Arc<std::io::Error>,
    },

    /// Remote fetch failed.
    #[error("failed to fetch {location}: {source}")]
    Http {
        /// URL that failed.
        location: String,
        /// Underlying error.
        source: Arc<reqwest::Error>,
    },

    /// HTTP client could not be built.
    #[error("http client error: {0}")]
    Client(Arc<reqwest::Error>),

    /// Remote fetch answered with a non-2xx status.
    #[error("failed to fetch {location}: status {status}")]
    Status {
        /// URL that failed.
        location: String,
        /// HTTP status.
        status: u16,
    },
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        AssetError::Parse(Arc::new(err))
    }
}

// =============================================================================
// SOURCES
// =============================================================================

/// Where resource bytes come from.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the bytes at a manifest location.
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, AssetError>;
}

/// `http(s)://` locations over HTTP, anything else from disk under a root.
pub struct DefaultAssetSource {
    root: PathBuf,
    http: reqwest::Client,
}

impl DefaultAssetSource {
    /// Create a source rooted at `root`. Each remote fetch gives up after
    /// `timeout`.
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Result<Self, AssetError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssetError::Client(Arc::new(e)))?;

        Ok(Self {
            root: root.into(),
            http,
        })
    }

    fn is_remote(location: &str) -> bool {
        location.starts_with("http://") || location.starts_with("https://")
    }
}

#[async_trait]
impl AssetSource for DefaultAssetSource {
    async fn fetch(&self, location: &str) -> Result<Vec<u8>, AssetError> {
        if Self::is_remote(location) {
            let http_err = |source| AssetError::Http {
                location: location.to_string(),
                source: Arc::new(source),
            };
            let response = self.http.get(location).send().await.map_err(http_err)?;
            if !response.status().is_success() {
                return Err(AssetError::Status {
                    location: location.to_string(),
                    status: response.status().as_u16(),
                });
            }
            let bytes = response.bytes().await.map_err(http_err)?;
            Ok(bytes.to_vec())
        } else {
            let path = self.root.join(location.trim_start_matches('/'));
            tokio::fs::read(&path).await.map_err(|source| AssetError::Io {
                location: path.display().to_string(),
                source: Arc::new(source),
            })
        }
    }
}

// =============================================================================
// LOADED ASSETS
// =============================================================================

/// A fetched sprite sheet.
#[derive(Debug, Clone)]
pub struct SpriteSheet {
    /// Raw image bytes.
    pub data: Vec<u8>,
    /// Frames in the sheet.
    pub frame_count: u32,
    /// Animations over the frames.
    pub animations: BTreeMap<String, AnimationRange>,
}

/// The fetched font.
#[derive(Debug, Clone)]
pub struct FontAsset {
    /// Font name.
    pub name: String,
    /// Raw font bytes.
    pub data: Vec<u8>,
}

/// Result of a completed load.
#[derive(Debug, Clone)]
pub struct LoadedAssets {
    sheets: BTreeMap<String, SpriteSheet>,
    font: FontAsset,
    clips: BTreeMap<String, Vec<u8>>,
}

impl LoadedAssets {
    /// Sprite sheet by name.
    pub fn sheet(&self, name: &str) -> Option<&SpriteSheet> {
        self.sheets.get(name)
    }

    /// Audio clip by name.
    pub fn clip(&self, name: &str) -> Option<&[u8]> {
        self.clips.get(name).map(Vec::as_slice)
    }

    /// The font.
    pub fn font(&self) -> &FontAsset {
        &self.font
    }

    /// Total bytes held.
    pub fn total_bytes(&self) -> usize {
        self.sheets.values().map(|s| s.data.len()).sum::<usize>()
            + self.clips.values().map(Vec::len).sum::<usize>()
            + self.font.data.len()
    }
}

// =============================================================================
// LOADER
// =============================================================================

/// Fetches a manifest as one joined operation.
#[derive(Clone)]
pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
}

impl AssetLoader {
    /// Create a loader over a source.
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self { source }
    }

    /// Validate and fetch everything in `manifest`.
    ///
    /// Resolves only once every resource is in; the first failure cancels
    /// the remaining fetches and is returned.
    #[instrument(skip_all, fields(resources = manifest.resource_count()))]
    pub async fn load(&self, manifest: &AssetManifest) -> Result<LoadedAssets, AssetError> {
        manifest.validate()?;

        let sheets = manifest.sprite_sheets.iter().map(|(name, spec)| async move {
            let data = self.source.fetch(&spec.path).await?;
            debug!(sheet = %name, bytes = data.len(), "Sprite sheet loaded");
            Ok::<_, AssetError>((
                name.clone(),
                SpriteSheet {
                    data,
                    frame_count: spec.frame_count(),
                    animations: spec.animations.clone(),
                },
            ))
        });

        let clips = manifest.audio.iter().map(|(name, path)| async move {
            let data = self.source.fetch(path).await?;
            debug!(clip = %name, bytes = data.len(), "Audio clip loaded");
            Ok::<_, AssetError>((name.clone(), data))
        });

        let font = async {
            let data = self.source.fetch(&manifest.font.path).await?;
            Ok::<_, AssetError>(FontAsset {
                name: manifest.font.name.clone(),
                data,
            })
        };

        let (sheets, clips, font) = try_join3(try_join_all(sheets), try_join_all(clips), font).await?;

        let assets = LoadedAssets {
            sheets: sheets.into_iter().collect(),
            font,
            clips: clips.into_iter().collect(),
        };
        info!("Assets loaded ({} bytes)", assets.total_bytes());
        Ok(assets)
    }
}

// =============================================================================
// TEST SOURCE
// =============================================================================

/// In-memory source with an optional per-fetch delay.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct MemorySource {
        files: HashMap<String, Vec<u8>>,
        delay: Duration,
        fetched: AtomicUsize,
    }

    impl MemorySource {
        /// Serve every location in `manifest` with a few bytes.
        pub fn for_manifest(manifest: &AssetManifest, delay: Duration) -> Arc<Self> {
            let mut files = HashMap::new();
            for sheet in manifest.sprite_sheets.values() {
                files.insert(sheet.path.clone(), vec![1, 2, 3]);
            }
            for path in manifest.audio.values() {
                files.insert(path.clone(), vec![4, 5]);
            }
            files.insert(manifest.font.path.clone(), vec![6]);
            Arc::new(Self { files, delay, fetched: AtomicUsize::new(0) })
        }

        /// Serve `manifest` except for one missing location.
        pub fn missing(manifest: &AssetManifest, location: &str, delay: Duration) -> Arc<Self> {
            let mut source = Arc::try_unwrap(Self::for_manifest(manifest, delay)).ok().unwrap();
            source.files.remove(location);
            Arc::new(source)
        }

        pub fn fetched(&self) -> usize {
            self.fetched.load(Ordering::SeqCst)
        }
    }

    pub fn empty_assets() -> LoadedAssets {
        LoadedAssets {
            sheets: BTreeMap::new(),
            font: FontAsset { name: "test".into(), data: Vec::new() },
            clips: BTreeMap::new(),
        }
    }

    #[async_trait]
    impl AssetSource for MemorySource {
        async fn fetch(&self, location: &str) -> Result<Vec<u8>, AssetError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let data = self.files.get(location).cloned().ok_or_else(|| AssetError::Io {
                location: location.to_string(),
                source: Arc::new(std::io::Error::from(std::io::ErrorKind::NotFound)),
            })?;
            self.fetched.fetch_add(1, Ordering::SeqCst);
            Ok(data)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
