//! Session Controller
//!
//! Drives a game session from startup to teardown:
//!
//! ```text
//! INITIALIZING ──(assets ∥ stats load)──▶ MENU ──play──▶ RUNNING
//!                                          ▲                │ finish
//!                                          └──(delay)── GAME_OVER ──▶ save (own task)
//! ```
//!
//! The controller runs as a single task that owns the session stats. Hosts
//! talk to it through a [`SessionHandle`]; the running scene reports back
//! through a [`RunSignal`]. Stats store failures never change which phase is
//! reached, only the numbers; an asset failure stops the session at startup.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::core::config::DEFAULT_GAME_OVER_DELAY;
use crate::core::stats::{GameOutcome, GameOverSummary, SessionStats, StatsSeed};
use crate::game::assets::{AssetError, AssetLoader, AssetManifest, LoadedAssets};
use crate::game::scene::{MenuView, RunStart, Scene, SceneHandler, SceneRegistry};
use crate::network::transport::StatsTransport;

/// Unique session identifier.
pub type SessionId = Uuid;

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Loading assets and stats.
    Initializing,
    /// Menu shown, waiting for play.
    Menu,
    /// Run in progress.
    Running,
    /// Final stats shown, returning to the menu after the delay.
    GameOver,
    /// Startup failed; the session is gone.
    Failed,
    /// Torn down.
    Closed,
}

impl SessionPhase {
    /// Whether the session has stopped for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Failed | SessionPhase::Closed)
    }
}

/// State published to observers on every transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSnapshot {
    /// Current phase.
    pub phase: SessionPhase,
    /// Current stats.
    pub stats: SessionStats,
    /// Runs started so far.
    pub runs: u64,
}

/// Session errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Asset loading failed at startup.
    #[error("asset loading failed: {0}")]
    Assets(#[from] AssetError),

    /// Operation not allowed in the current phase.
    #[error("not allowed while {0:?}")]
    InvalidPhase(SessionPhase),

    /// Session has been torn down.
    #[error("session closed")]
    Closed,
}

type StartupResult = Option<Result<StatsSeed, SessionError>>;

pub(crate) enum Command {
    Play {
        reply: oneshot::Sender<Result<StatsSeed, SessionError>>,
    },
    Progress {
        run: u64,
        score: u32,
        elapsed_time: f64,
    },
    Finish {
        run: u64,
        outcome: GameOutcome,
    },
    Teardown,
}

// =============================================================================
// RUN SIGNAL
// =============================================================================

/// Link from the running scene back to its session.
///
/// Bound to one run: anything sent after that run has ended, or from an
/// older run, is ignored by the controller. Only the first `finish` of a run
/// counts.
#[derive(Clone, Debug)]
pub struct RunSignal {
    run: u64,
    tx: mpsc::UnboundedSender<Command>,
}

impl RunSignal {
    /// Run this signal belongs to.
    pub fn run(&self) -> u64 {
        self.run
    }

    /// Report in-run numbers. Returns false if the session is gone.
    pub fn progress(&self, score: u32, elapsed_time: f64) -> bool {
        self.tx
            .send(Command::Progress { run: self.run, score, elapsed_time })
            .is_ok()
    }

    /// End the run. Returns false if the session is gone.
    pub fn finish(self, outcome: GameOutcome) -> bool {
        self.tx.send(Command::Finish { run: self.run, outcome }).is_ok()
    }

    #[cfg(test)]
    pub(crate) fn detached(run: u64) -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { run, tx }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Host-side handle to a running session. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    startup: watch::Receiver<StartupResult>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionHandle {
    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait for startup to settle. Resolves with the loaded seed once the
    /// menu is first reached, or with the startup error.
    pub async fn ready(&self) -> Result<StatsSeed, SessionError> {
        let mut startup = self.startup.clone();
        let settled = startup
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SessionError::Closed)?;
        settled.clone().unwrap_or(Err(SessionError::Closed))
    }

    /// Start a run from the menu. Resolves with the seed the running scene
    /// received.
    pub async fn play(&self) -> Result<StatsSeed, SessionError> {
        let (reply, response) = oneshot::channel();
        if self.tx.send(Command::Play { reply }).is_err() {
            return Err(self.gone());
        }
        match response.await {
            Ok(result) => result,
            Err(_) => Err(self.gone()),
        }
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshot.borrow()
    }

    /// Receiver of every published state.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Wait until the session reaches `phase`.
    ///
    /// Fails with [`SessionError::Closed`] if the session stops first.
    pub async fn wait_for_phase(&self, phase: SessionPhase) -> Result<SessionSnapshot, SessionError> {
        let mut snapshots = self.snapshot.clone();
        let snapshot = *snapshots
            .wait_for(|s| s.phase == phase || s.phase.is_terminal())
            .await
            .map_err(|_| SessionError::Closed)?;
        if snapshot.phase == phase {
            Ok(snapshot)
        } else {
            Err(SessionError::Closed)
        }
    }

    /// Tear the session down and wait for its task to finish.
    ///
    /// Every caller waits, on any clone of the handle. A pending
    /// return-to-menu never fires after this. Stats saves still in flight are
    /// awaited before the task ends.
    pub async fn teardown(&self) {
        let _ = self.tx.send(Command::Teardown);

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Session task ended abnormally: {}", e);
            }
        }

        // Another caller owns the task; the final snapshot marks its end.
        let mut snapshots = self.snapshot.clone();
        let _ = snapshots.wait_for(|s| s.phase.is_terminal()).await;
    }

    fn gone(&self) -> SessionError {
        match &*self.startup.borrow() {
            Some(Err(e)) => e.clone(),
            _ => SessionError::Closed,
        }
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Owns a session's stats and drives its phases.
pub struct SessionController {
    id: SessionId,
    transport: StatsTransport,
    loader: AssetLoader,
    manifest: AssetManifest,
    scenes: SceneRegistry,
    game_over_delay: Duration,
    phase: SessionPhase,
    stats: SessionStats,
    run: u64,
    assets: Option<Arc<LoadedAssets>>,
    return_at: Option<Instant>,
    saves: Vec<JoinHandle<()>>,
    signal_tx: Option<mpsc::WeakUnboundedSender<Command>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    startup_tx: watch::Sender<StartupResult>,
}

impl SessionController {
    /// Create a controller. Every scene is registered here, before any
    /// loading starts.
    pub fn new<H: SceneHandler>(
        transport: StatsTransport,
        loader: AssetLoader,
        manifest: AssetManifest,
        handler: H,
    ) -> Self {
        let stats = SessionStats::new();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot {
            phase: SessionPhase::Initializing,
            stats,
            runs: 0,
        });
        let (startup_tx, _) = watch::channel(None);

        Self {
            id: Uuid::new_v4(),
            transport,
            loader,
            manifest,
            scenes: SceneRegistry::new(handler),
            game_over_delay: DEFAULT_GAME_OVER_DELAY,
            phase: SessionPhase::Initializing,
            stats,
            run: 0,
            assets: None,
            return_at: None,
            saves: Vec::new(),
            signal_tx: None,
            snapshot_tx,
            startup_tx,
        }
    }

    /// Set the delay between game over and the return to the menu.
    pub fn with_game_over_delay(mut self, delay: Duration) -> Self {
        self.game_over_delay = delay;
        self
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Start the session task.
    pub fn spawn(mut self) -> SessionHandle {
        let id = self.id;
        let (tx, rx) = mpsc::unbounded_channel();
        self.signal_tx = Some(tx.downgrade());
        let snapshot = self.snapshot_tx.subscribe();
        let startup = self.startup_tx.subscribe();

        let task = tokio::spawn(self.run(rx).instrument(info_span!("session", id = %id)));

        SessionHandle {
            id,
            tx,
            snapshot,
            startup,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!("Session starting");

        // Own task: teardown detaches the stats request, never aborts it.
        let transport = self.transport.clone();
        let stats_load = tokio::spawn(async move { transport.load().await }.in_current_span());

        let startup = tokio::select! {
            settled = async {
                let (assets, seed) = tokio::join!(self.loader.load(&self.manifest), stats_load);
                let seed = seed.unwrap_or_else(|e| {
                    error!("Stats load task ended abnormally, using defaults: {}", e);
                    StatsSeed::default()
                });
                (assets, seed)
            } => Some(settled),
            _ = Self::until_teardown(&mut rx) => None,
        };

        let Some((assets, seed)) = startup else {
            info!("Session torn down during startup");
            self.close().await;
            return;
        };

        match assets {
            Ok(assets) => {
                self.assets = Some(Arc::new(assets));
                self.stats = SessionStats::from_seed(seed);
                self.startup_tx.send_replace(Some(Ok(seed)));
                info!(elapsed = seed.elapsed_time, best = seed.best_score, "Session ready");
                self.enter_menu();
            }
            Err(e) => {
                error!("Session startup failed: {}", e);
                self.phase = SessionPhase::Failed;
                self.startup_tx.send_replace(Some(Err(SessionError::Assets(e))));
                self.publish();
                return;
            }
        }

        loop {
            let deadline = self.return_at;
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Teardown) | None => break,
                    Some(command) => self.handle(command),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.return_to_menu();
                }
            }
        }

        self.close().await;
    }

    /// Answer commands until teardown while startup is in progress.
    async fn until_teardown(rx: &mut mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Teardown => return,
                Command::Play { reply } => {
                    let _ = reply.send(Err(SessionError::InvalidPhase(SessionPhase::Initializing)));
                }
                Command::Progress { .. } | Command::Finish { .. } => {}
            }
        }
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Play { reply } => {
                let _ = reply.send(self.start_run());
            }
            Command::Progress { run, score, elapsed_time } => {
                if self.accepts_signal(run) {
                    self.stats.record_progress(score, elapsed_time);
                    self.publish();
                } else {
                    debug!(run, current = self.run, "Ignoring stale progress");
                }
            }
            Command::Finish { run, outcome } => {
                if self.accepts_signal(run) {
                    self.game_over(outcome);
                } else {
                    debug!(run, current = self.run, "Ignoring stale finish");
                }
            }
            Command::Teardown => {}
        }
    }

    fn accepts_signal(&self, run: u64) -> bool {
        self.phase == SessionPhase::Running && run == self.run
    }

    fn start_run(&mut self) -> Result<StatsSeed, SessionError> {
        if self.phase != SessionPhase::Menu {
            warn!(phase = ?self.phase, "Play ignored");
            return Err(SessionError::InvalidPhase(self.phase));
        }
        let tx = self.signal_tx.as_ref().and_then(mpsc::WeakUnboundedSender::upgrade);
        let (Some(assets), Some(tx)) = (self.assets.clone(), tx) else {
            return Err(SessionError::Closed);
        };

        self.run += 1;
        self.stats.score = 0;
        let seed = self.stats.seed();
        self.phase = SessionPhase::Running;

        info!(run = self.run, best = seed.best_score, "Run started");
        self.scenes.activate(Scene::Running(RunStart {
            seed,
            assets,
            signal: RunSignal { run: self.run, tx },
        }));
        self.publish();

        Ok(seed)
    }

    fn game_over(&mut self, outcome: GameOutcome) {
        let new_best = self.stats.apply_outcome(outcome);
        let SessionStats { elapsed_time, score, best_score } = self.stats;
        self.phase = SessionPhase::GameOver;

        info!(run = self.run, score, elapsed = elapsed_time, new_best, "Run ended");
        self.scenes.activate(Scene::GameOver(GameOverSummary {
            score,
            elapsed_time,
            best_score,
            new_best,
            finished_at: Utc::now(),
        }));

        let transport = self.transport.clone();
        self.saves.retain(|save| !save.is_finished());
        self.saves.push(tokio::spawn(
            async move { transport.save(elapsed_time, score).await }.in_current_span(),
        ));

        self.return_at = Some(Instant::now() + self.game_over_delay);
        self.publish();
    }

    fn return_to_menu(&mut self) {
        self.return_at = None;
        self.stats.reset_run();
        self.enter_menu();
    }

    fn enter_menu(&mut self) {
        self.phase = SessionPhase::Menu;
        self.scenes.activate(Scene::Menu(MenuView {
            best_score: self.stats.best_score,
            runs: self.run,
        }));
        self.publish();
    }

    async fn close(&mut self) {
        self.return_at = None;
        self.scenes.deactivate();
        if self.startup_tx.borrow().is_none() {
            self.startup_tx.send_replace(Some(Err(SessionError::Closed)));
        }

        let pending: Vec<_> = self.saves.drain(..).filter(|save| !save.is_finished()).collect();
        if !pending.is_empty() {
            debug!(pending = pending.len(), "Waiting for stats saves");
        }
        for save in pending {
            if let Err(e) = save.await {
                warn!("Stats save task ended abnormally: {}", e);
            }
        }

        self.phase = SessionPhase::Closed;
        self.publish();
        info!(runs = self.run, "Session closed");
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            phase: self.phase,
            stats: self.stats,
            runs: self.run,
        });
    }
}

// =============================================================================
// TESTS
// =============================================================================
