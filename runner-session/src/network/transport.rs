//! Stats Transport
//!
//! Load and save of session statistics with a primary/fallback policy.
//! Neither operation can fail from the caller's point of view: a load that
//! exhausts both stores yields zeros, a save that exhausts both is dropped.
//! Every failure is logged.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

use crate::core::config::SessionConfig;
use crate::core::stats::StatsSeed;
use crate::network::http::HttpStatsBackend;
use crate::network::protocol::SaveGameRequest;

/// One stats store.
#[async_trait]
pub trait StatsBackend: Send + Sync {
    /// Fetch the stored stats for `game_name`.
    async fn load_stats(&self, game_name: &str) -> Result<StatsSeed, TransportError>;

    /// Store the stats of a finished run.
    async fn save_stats(&self, request: &SaveGameRequest) -> Result<(), TransportError>;
}

/// Failure of a single stats store call.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, timeout or other client-side failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Store answered with a non-2xx status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// Store answered with a body that does not fit the schema.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Base URL could not be used.
    #[error("invalid endpoint {0}")]
    Endpoint(String),
}

/// Which store served a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The primary store.
    Primary,
    /// The fallback store.
    Fallback,
}

/// Gateway to the stats stores.
///
/// Holds nothing mutable, so clones can load and save concurrently.
#[derive(Clone)]
pub struct StatsTransport {
    primary: Arc<dyn StatsBackend>,
    fallback: Arc<dyn StatsBackend>,
    game_name: Arc<str>,
    level: u32,
}

impl StatsTransport {
    /// Create a transport over two backends.
    pub fn new(
        primary: Arc<dyn StatsBackend>,
        fallback: Arc<dyn StatsBackend>,
        game_name: impl Into<String>,
        level: u32,
    ) -> Self {
        Self {
            primary,
            fallback,
            game_name: Arc::from(game_name.into()),
            level,
        }
    }

    /// Create an HTTP transport from configuration.
    ///
    /// The identity is resolved here, once, and shared by both stores.
    pub fn http(config: &SessionConfig) -> Result<Self, TransportError> {
        let identity = config.identity();
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        debug!(
            token = %identity.fingerprint(),
            child = %identity.selected_subject_id(),
            "Stats transport identity resolved"
        );

        let primary = HttpStatsBackend::new(&config.primary_url, identity.clone(), client.clone())?;
        let fallback = HttpStatsBackend::new(&config.fallback_url, identity, client)?;

        Ok(Self::new(
            Arc::new(primary),
            Arc::new(fallback),
            config.game_name.clone(),
            config.level,
        ))
    }

    /// Game name used by this transport.
    pub fn game_name(&self) -> &str {
        &self.game_name
    }

    /// Load the stored stats, falling back to zeros.
    #[instrument(skip(self), fields(game = %self.game_name))]
    pub async fn load(&self) -> StatsSeed {
        match self.try_load().await {
            Ok((seed, route)) => {
                debug!(?route, elapsed = seed.elapsed_time, best = seed.best_score, "Stats loaded");
                seed
            }
            Err(e) => {
                error!("Stats load failed on both stores, using defaults: {}", e);
                StatsSeed::default()
            }
        }
    }

    /// Load with the fallback policy, reporting which store answered.
    ///
    /// The error returned is the fallback store's.
    pub async fn try_load(&self) -> Result<(StatsSeed, Route), TransportError> {
        match self.primary.load_stats(&self.game_name).await {
            Ok(seed) => Ok((seed, Route::Primary)),
            Err(e) => {
                warn!("Primary stats load failed, trying fallback: {}", e);
                let seed = self.fallback.load_stats(&self.game_name).await?;
                Ok((seed, Route::Fallback))
            }
        }
    }

    /// Save the stats of a finished run. Failures are logged and dropped.
    #[instrument(skip(self), fields(game = %self.game_name))]
    pub async fn save(&self, elapsed_time: f64, score: u32) {
        match self.try_save(elapsed_time, score).await {
            Ok(route) => debug!(?route, "Stats saved"),
            Err(e) => error!("Stats save failed on both stores, dropping it: {}", e),
        }
    }

    /// Save with the fallback policy, reporting which store accepted it.
    pub async fn try_save(&self, elapsed_time: f64, score: u32) -> Result<Route, TransportError> {
        let request = SaveGameRequest {
            game_name: self.game_name.to_string(),
            duration: elapsed_time,
            score,
            level: self.level,
        };

        match self.primary.save_stats(&request).await {
            Ok(()) => Ok(Route::Primary),
            Err(e) => {
                warn!("Primary stats save failed, trying fallback: {}", e);
                self.fallback.save_stats(&request).await?;
                Ok(Route::Fallback)
            }
        }
    }
}

// =============================================================================
// TEST BACKEND
// =============================================================================


// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::fake::{Call, FakeBackend};
    use super::*;
    use proptest::prelude::*;

    fn transport(primary: Arc<FakeBackend>, fallback: Arc<FakeBackend>) -> StatsTransport {
        StatsTransport::new(primary, fallback, "endless-runner", 2)
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[tokio::test]
    async fn test_load_from_primary() {
        let primary = FakeBackend::serving(StatsSeed::new(42.0, 7));
        let fallback = FakeBackend::serving(StatsSeed::new(1.0, 1));
        let transport = transport(primary.clone(), fallback.clone());

        assert_eq!(transport.load().await, StatsSeed::new(42.0, 7));
        assert_eq!(primary.calls(), vec![Call::Load("endless-runner".into())]);
        assert!(fallback.calls().is_empty());
    }

    #[tokio::test]
    async fn test_load_falls_back() {
        let primary = FakeBackend::failing();
        let fallback = FakeBackend::serving(StatsSeed::new(5.0, 11));
        let transport = transport(primary.clone(), fallback.clone());

        let (seed, route) = transport.try_load().await.unwrap();
        assert_eq!(seed, StatsSeed::new(5.0, 11));
        assert_eq!(route, Route::Fallback);
        assert_eq!(primary.calls().len(), 1);
        assert_eq!(fallback.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_load_defaults_when_both_fail() {
        let transport = transport(FakeBackend::failing(), FakeBackend::failing());
        assert_eq!(transport.load().await, StatsSeed::default());
    }

    #[tokio::test]
    async fn test_save_primary_500_goes_to_fallback_with_same_payload() {
        let primary = FakeBackend::failing();
        let fallback = FakeBackend::serving(StatsSeed::default());
        let transport = transport(primary.clone(), fallback.clone());

        transport.save(12.5, 30).await;

        let expected = SaveGameRequest {
            game_name: "endless-runner".into(),
            duration: 12.5,
            score: 30,
            level: 2,
        };
        assert_eq!(primary.saves(), vec![expected.clone()]);
        assert_eq!(fallback.saves(), vec![expected]);
    }

    #[tokio::test]
    async fn test_save_absorbs_total_failure() {
        let primary = FakeBackend::failing();
        let fallback = FakeBackend::failing();
        let transport = transport(primary.clone(), fallback.clone());

        transport.save(1.0, 1).await;
        assert!(transport.try_save(1.0, 1).await.is_err());
        assert_eq!(primary.saves().len(), 2);
        assert_eq!(fallback.saves().len(), 2);
    }

    #[test]
    fn test_http_transport_rejects_bad_url() {
        let config = SessionConfig {
            primary_url: "not a url".into(),
            ..Default::default()
        };
        assert!(matches!(StatsTransport::http(&config), Err(TransportError::Endpoint(_))));
    }

    proptest! {
        #[test]
        fn prop_load_returns_first_healthy_store(
            elapsed in 0.0f64..1.0e6,
            best in any::<u32>(),
            primary_up in any::<bool>(),
            fallback_up in any::<bool>(),
        ) {
            let seed = StatsSeed::new(elapsed, best);
            let other = StatsSeed::new(elapsed + 1.0, best / 2);
            let primary = if primary_up { FakeBackend::serving(seed) } else { FakeBackend::failing() };
            let fallback = if fallback_up { FakeBackend::serving(other) } else { FakeBackend::failing() };
            let transport = transport(primary, fallback);

            let loaded = block_on(transport.load());
            let expected = match (primary_up, fallback_up) {
                (true, _) => seed,
                (false, true) => other,
                (false, false) => StatsSeed::default(),
            };
            prop_assert_eq!(loaded, expected);
        }

        #[test]
        fn prop_save_uses_fallback_iff_primary_fails(
            elapsed in 0.0f64..1.0e6,
            score in any::<u32>(),
            primary_up in any::<bool>(),
        ) {
            let primary = if primary_up { FakeBackend::serving(StatsSeed::default()) } else { FakeBackend::failing() };
            let fallback = FakeBackend::serving(StatsSeed::default());
            let transport = transport(primary.clone(), fallback.clone());

            block_on(transport.save(elapsed, score));

            prop_assert_eq!(primary.saves().len(), 1);
            prop_assert_eq!(fallback.saves().len(), if primary_up { 0 } else { 1 });
        }
    }
}
