//! Runner Session Demo Host
//!
//! Mounts one session behind the access gate and plays a few scripted runs
//! against the configured stats stores.

use anyhow::Context;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use runner_session::{
    core::stats::{GameOutcome, GameOverSummary},
    game::{
        assets::{AssetLoader, AssetManifest, DefaultAssetSource},
        scene::{MenuView, RunStart, SceneHandler, SceneKind},
        session::{SessionController, SessionPhase},
    },
    network::{
        access::{AccessContext, Requirement},
        transport::StatsTransport,
    },
    SessionConfig, VERSION,
};

/// Runs played before the demo tears the session down.
const DEMO_RUNS: u64 = 3;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Runner Session v{}", VERSION);

    let access = AccessContext::from_env();
    if let Err(denied) = access.admit(&Requirement::roles(["user"])) {
        warn!(role = %access.role, "Session not mounted: {}", denied);
        return Ok(());
    }

    let config = SessionConfig::from_env().context("invalid configuration")?;
    info!(
        primary = %config.primary_url,
        fallback = %config.fallback_url,
        game = %config.game_name,
        "Configuration loaded"
    );

    demo_session(config).await
}

/// Console scenes. The running scene simulates a run on its own task.
struct ConsoleScenes;

impl SceneHandler for ConsoleScenes {
    fn menu(&mut self, view: &MenuView) {
        info!("MENU  best={} runs={}", view.best_score, view.runs);
    }

    fn running(&mut self, start: RunStart) {
        info!(
            "RUN   #{} best={} ({} bytes of assets)",
            start.signal.run(),
            start.seed.best_score,
            start.assets.total_bytes()
        );

        let signal = start.signal;
        tokio::spawn(async move {
            let (ticks, per_tick) = {
                let mut rng = rand::thread_rng();
                (rng.gen_range(3..8u32), rng.gen_range(1..20u32))
            };

            let mut score = 0;
            let mut elapsed = 0.0;
            for _ in 0..ticks {
                tokio::time::sleep(Duration::from_millis(250)).await;
                score += per_tick;
                elapsed += 0.25;
                if !signal.progress(score, elapsed) {
                    return;
                }
            }
            signal.finish(GameOutcome::new(score, elapsed));
        });
    }

    fn game_over(&mut self, summary: &GameOverSummary) {
        info!(
            "OVER  score={} time={:.2}s best={}{}",
            summary.score,
            summary.elapsed_time,
            summary.best_score,
            if summary.new_best { " (new best)" } else { "" }
        );
    }

    fn leave(&mut self, scene: SceneKind) {
        tracing::debug!("Leaving {}", scene);
    }
}

/// Play a few runs and tear down.
async fn demo_session(config: SessionConfig) -> anyhow::Result<()> {
    info!("=== Starting Demo Session ===");

    let transport = StatsTransport::http(&config).context("building stats transport")?;
    let manifest = match &config.manifest_path {
        Some(path) => AssetManifest::from_file(path)
            .await
            .with_context(|| format!("reading manifest {}", path.display()))?,
        None => AssetManifest::runner_default(),
    };
    let source = DefaultAssetSource::new(config.asset_root.clone(), config.request_timeout)
        .context("building asset source")?;
    let loader = AssetLoader::new(Arc::new(source));

    let handle = SessionController::new(transport, loader, manifest, ConsoleScenes)
        .with_game_over_delay(config.game_over_delay)
        .spawn();
    info!("Session ID: {}", handle.id());

    let seed = handle.ready().await.context("session startup")?;
    info!("Loaded stats: elapsed={:.2}s best={}", seed.elapsed_time, seed.best_score);

    let mut snapshots = handle.subscribe();
    for run in 1..=DEMO_RUNS {
        handle.play().await?;
        snapshots
            .wait_for(|s| (s.runs == run && s.phase == SessionPhase::Menu) || s.phase.is_terminal())
            .await?;
    }
    let last = handle.snapshot();

    handle.teardown().await;

    info!("=== Session Results ===");
    info!("Runs: {}", last.runs);
    info!("Best score: {}", last.stats.best_score);

    Ok(())
}
