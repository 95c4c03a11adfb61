//! Proxied-versus-direct GET race.
//!
//! Two tasks fetch the same URL, one through the proxy and one direct, and
//! publish their outcome on a shared channel. The coordinator returns the
//! first success, or once both paths have failed or the deadline passes.
//! The losing task is left to finish on its own; its outcome is dropped.

use crate::client::{build_client, parse_proxy};
use crate::configuration::FetchConfig;
use crate::error::{AttemptFailure, FetchError};
use crate::request::{get, parse_target, with_default_user_agent};
use crate::response::{FetchResult, Path};

use log::{debug, error, info, warn};
use reqwest::header::HeaderMap;
use reqwest::Url;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, Sender};

/// What one attempt reports back to the coordinator.
#[derive(Debug)]
enum FetchOutcome {
    Success(FetchResult),
    Failure(AttemptFailure),
}

#[derive(Debug)]
enum RaceEvent {
    Finished(FetchOutcome),
    DeadlineElapsed,
}

#[derive(Debug)]
enum RaceState {
    Waiting,
    OneFailed(AttemptFailure),
    Done,
}

/// Coordinator state machine. Returns `Some` exactly once; every event after
/// that is discarded.
#[derive(Debug)]
struct Race {
    state: RaceState,
    deadline: Duration,
    // Route of each attempt; both are `Direct` when no proxy was given
    paths: [Path; 2],
}

impl Race {
    fn new(deadline: Duration, paths: [Path; 2]) -> Self {
        Self {
            state: RaceState::Waiting,
            deadline,
            paths,
        }
    }

    fn pending_path(&self, failed: Path) -> Path {
        if self.paths[0] == failed {
            self.paths[1]
        } else {
            self.paths[0]
        }
    }

    fn is_done(&self) -> bool {
        matches!(self.state, RaceState::Done)
    }

    fn on_event(&mut self, event: RaceEvent) -> Option<Result<FetchResult, FetchError>> {
        let state = std::mem::replace(&mut self.state, RaceState::Done);
        match (state, event) {
            (RaceState::Done, _) => None,

            (_, RaceEvent::Finished(FetchOutcome::Success(result))) => Some(Ok(result)),

            (RaceState::Waiting, RaceEvent::Finished(FetchOutcome::Failure(failure))) => {
                self.state = RaceState::OneFailed(failure);
                None
            }

            (RaceState::OneFailed(first), RaceEvent::Finished(FetchOutcome::Failure(second))) => {
                Some(Err(FetchError::Aggregated(vec![first, second])))
            }

            (RaceState::Waiting, RaceEvent::DeadlineElapsed) => {
                Some(Err(FetchError::Timeout(self.deadline)))
            }

            (RaceState::OneFailed(first), RaceEvent::DeadlineElapsed) => {
                let pending = AttemptFailure {
                    path: self.pending_path(first.path),
                    error: FetchError::Timeout(self.deadline),
                };
                Some(Err(FetchError::Aggregated(vec![first, pending])))
            }
        }
    }
}

/// Races a proxied and a direct GET. Stateless across calls.
#[derive(Debug, Clone, Default)]
pub struct RaceFetcher {
    config: FetchConfig,
}

impl RaceFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetches `url` through `proxy` and directly at the same time and
    /// returns whichever yields a non-empty body first. An empty `proxy`
    /// makes both attempts direct, and both are tagged [`Path::Direct`].
    ///
    /// Inputs are validated before anything is spawned: a malformed proxy is
    /// a [`FetchError::Config`], a malformed URL or header a
    /// [`FetchError::RequestBuild`].
    pub async fn fetch_racing(
        &self,
        url: &str,
        headers: &HeaderMap,
        proxy: &str,
    ) -> Result<FetchResult, FetchError> {
        if !proxy.is_empty() {
            parse_proxy(proxy)?;
        }
        let target = parse_target(url)?;
        let headers = with_default_user_agent(headers, &self.config.user_agent)?;

        let started = Instant::now();
        let deadline = tokio::time::sleep(self.config.race_deadline);
        tokio::pin!(deadline);

        // Capacity 2: neither worker can ever block on send
        let (tx, mut rx) = mpsc::channel(2);
        let proxied = if proxy.is_empty() { Path::Direct } else { Path::Proxied };
        self.spawn_attempt(proxied, Some(proxy), &target, &headers, tx.clone());
        self.spawn_attempt(Path::Direct, None, &target, &headers, tx);

        let mut race = Race::new(self.config.race_deadline, [proxied, Path::Direct]);
        loop {
            let event = tokio::select! {
                outcome = rx.recv() => match outcome {
                    Some(outcome) => RaceEvent::Finished(outcome),
                    None => {
                        error!("race for {} lost its workers", url);
                        RaceEvent::DeadlineElapsed
                    }
                },
                _ = &mut deadline => RaceEvent::DeadlineElapsed,
            };

            if let Some(result) = race.on_event(event) {
                match &result {
                    Ok(res) => info!("{} won race for {} in {:?}", res.path, url, started.elapsed()),
                    Err(e) => warn!("race for {} failed: {}", url, e),
                }
                return result;
            }
            debug_assert!(!race.is_done());
        }
    }

    fn spawn_attempt(
        &self,
        path: Path,
        proxy: Option<&str>,
        url: &Url,
        headers: &HeaderMap,
        tx: Sender<FetchOutcome>,
    ) {
        let proxy = proxy.map(str::to_string);
        let url = url.clone();
        let headers = headers.clone();
        let timeout = self.config.request_timeout;
        let dial_timeout = self.config.dial_timeout;

        tokio::spawn(async move {
            let result = match build_client(proxy.as_deref(), timeout, dial_timeout) {
                Ok(client) => get(&client, path, url, headers, true).await,
                Err(e) => Err(e),
            };

            let outcome = match result {
                Ok(res) => FetchOutcome::Success(res),
                Err(error) => {
                    debug!("{} attempt failed: {}", path, error);
                    FetchOutcome::Failure(AttemptFailure { path, error })
                }
            };

            // The coordinator may already have returned
            let _ = tx.send(outcome).await;
        });
    }
}

/// [`RaceFetcher::fetch_racing`] with default timeouts.
pub async fn fetch_racing(
    url: &str,
    headers: &HeaderMap,
    proxy: &str,
) -> Result<FetchResult, FetchError> {
    RaceFetcher::default().fetch_racing(url, headers, proxy).await
}
