//! Run coordinator: one refresh at a time, with queryable status.
//!
//! The coordinator owns the pipeline's run state. Starting a refresh while
//! one is in flight is rejected synchronously — never queued, never merged
//! into the running one.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use siterag_index::Embedder;
use siterag_shared::RunStatus;

use crate::refresh::{ProgressReporter, RefreshConfig, run_refresh};

/// Outcome of asking the coordinator to start a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The run was started on a background task.
    Started,
    /// A run is already in flight; the request was rejected.
    AlreadyRunning,
}

/// Owns the refresh run state and serializes runs.
pub struct Coordinator {
    config: RefreshConfig,
    embedder: Arc<dyn Embedder>,
    state: Arc<Mutex<RunStatus>>,
}

impl Coordinator {
    /// Create a coordinator for the given run configuration.
    pub fn new(config: RefreshConfig, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config,
            embedder,
            state: Arc::new(Mutex::new(RunStatus::default())),
        }
    }

    /// Snapshot of the current run state.
    pub fn status(&self) -> RunStatus {
        lock_state(&self.state).clone()
    }

    /// Start a refresh on a background task, unless one is already running.
    ///
    /// Must be called within a tokio runtime. The spawned run executes to
    /// completion; there is no mid-run cancellation.
    pub fn start_refresh(&self) -> StartOutcome {
        {
            let mut state = lock_state(&self.state);
            if state.running {
                warn!("refresh already in flight, rejecting start");
                return StartOutcome::AlreadyRunning;
            }
            state.running = true;
            state.progress = "Starting".into();
        }

        let config = self.config.clone();
        let embedder = Arc::clone(&self.embedder);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let reporter = SharedProgress {
                state: Arc::clone(&state),
            };

            let result = run_refresh(&config, embedder.as_ref(), &reporter).await;

            let mut st = lock_state(&state);
            if let Err(e) = result {
                warn!(error = %e, "refresh run failed");
                st.progress = format!("ERROR: {e}");
            }
            st.running = false;
        });

        info!("refresh started");
        StartOutcome::Started
    }
}

/// Lock the shared state, recovering from a poisoned mutex.
fn lock_state(state: &Arc<Mutex<RunStatus>>) -> MutexGuard<'_, RunStatus> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reports run progress into the coordinator's shared state.
struct SharedProgress {
    state: Arc<Mutex<RunStatus>>,
}

impl ProgressReporter for SharedProgress {
    fn phase(&self, message: &str) {
        lock_state(&self.state).progress = message.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use url::Url;
    use uuid::Uuid;

    use siterag_index::HashedEmbedder;
    use siterag_shared::{CrawlConfig, IndexConfig};

    fn coordinator_for(server_uri: &str) -> Coordinator {
        let root = std::env::temp_dir().join(format!("siterag_coord_test_{}", Uuid::now_v7()));
        let config = RefreshConfig {
            seed_url: Url::parse(server_uri).unwrap(),
            crawl: CrawlConfig {
                skip_patterns: vec![],
                request_timeout_secs: 5,
                settle_poll_ms: 0,
                settle_max_polls: 0,
            },
            index: IndexConfig {
                chunk_max_chars: 1000,
                chunk_overlap_chars: 200,
                embedder: "hashed".into(),
                top_k: 3,
            },
            db_path: root.join("siterag.db"),
            index_root: root.join("indexes"),
        };
        Coordinator::new(config, Arc::new(HashedEmbedder::default()))
    }

    async fn wait_until_idle(coordinator: &Coordinator) {
        for _ in 0..200 {
            if !coordinator.status().running {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("refresh did not finish in time");
    }

    #[tokio::test]
    async fn idle_by_default() {
        let coordinator = coordinator_for("http://127.0.0.1:9/");
        let status = coordinator.status();
        assert!(!status.running);
        assert!(status.progress.is_empty());
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>Consulting services</p></body></html>")
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let coordinator = coordinator_for(&server.uri());

        assert_eq!(coordinator.start_refresh(), StartOutcome::Started);
        assert!(coordinator.status().running);
        // Rejected, and the first run's state is untouched.
        assert_eq!(coordinator.start_refresh(), StartOutcome::AlreadyRunning);
        assert!(coordinator.status().running);

        wait_until_idle(&coordinator).await;
        let status = coordinator.status();
        assert!(status.progress.contains("Completed"));

        // A new run can start once the first has finished.
        assert_eq!(coordinator.start_refresh(), StartOutcome::Started);
        wait_until_idle(&coordinator).await;
    }

    #[tokio::test]
    async fn failed_run_reports_error_and_unlocks() {
        // Nothing is listening here, so the crawl yields no pages.
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let coordinator = coordinator_for(&server.uri());
        assert_eq!(coordinator.start_refresh(), StartOutcome::Started);
        wait_until_idle(&coordinator).await;

        let status = coordinator.status();
        assert!(!status.running);
        assert!(status.progress.contains("no pages"));
    }
}
