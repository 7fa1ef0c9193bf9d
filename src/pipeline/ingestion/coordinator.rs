use crate::apis::base::EventSource;
use crate::common::error::DiscoveryError;
use crate::common::types::Event;
use crate::observability::metrics;
use crate::storage::{EventStore, UpsertOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

/// Outcome of the most recent completed run
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScrapeRunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// True whenever the run completed, even if individual sources failed
    pub success: bool,
    pub events_inserted: usize,
    pub events_updated: usize,
    pub sources_failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub base_url: String,
    pub last_run_time: Option<DateTime<Utc>>,
    pub last_run_success: bool,
    pub error_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionStatus {
    pub running: bool,
    pub source_count: usize,
    pub sources: Vec<SourceStatus>,
    pub last_run: Option<ScrapeRunSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Another run held the flag; nothing was done
    AlreadyRunning,
    Completed(ScrapeRunSummary),
}

/// Clears the running flag when dropped, whether the run finished or unwound
pub(crate) struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct PersistCounts {
    inserted: usize,
    updated: usize,
}

/// Runs every registered source one after another and persists the results.
///
/// At most one run is active at a time. A trigger that arrives while a run is
/// in progress returns immediately instead of queueing.
pub struct IngestionCoordinator {
    sources: Vec<Arc<dyn EventSource>>,
    store: Arc<dyn EventStore>,
    running: Arc<AtomicBool>,
    last_run: RwLock<Option<ScrapeRunSummary>>,
}

impl IngestionCoordinator {
    pub fn new(sources: Vec<Arc<dyn EventSource>>, store: Arc<dyn EventStore>) -> Self {
        Self {
            sources,
            store,
            running: Arc::new(AtomicBool::new(false)),
            last_run: RwLock::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the running flag; None when a run already holds it
    pub(crate) fn try_begin(&self) -> Option<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                running: Arc::clone(&self.running),
            })
    }

    /// Run all sources now, or return `AlreadyRunning` if a run is active
    pub async fn run_all(&self) -> RunOutcome {
        match self.try_begin() {
            Some(guard) => RunOutcome::Completed(self.run_claimed(guard).await),
            None => {
                info!("Ingestion run already in progress, skipping trigger");
                metrics::ingestion::run_skipped();
                RunOutcome::AlreadyRunning
            }
        }
    }

    /// Claim the run flag and run in a background task.
    /// Returns false when a run was already active.
    pub fn trigger_in_background(self: &Arc<Self>) -> bool {
        let Some(guard) = self.try_begin() else {
            info!("Ingestion run already in progress, skipping trigger");
            metrics::ingestion::run_skipped();
            return false;
        };
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_claimed(guard).await;
        });
        true
    }

    #[instrument(skip(self, _guard), fields(sources = self.sources.len()))]
    async fn run_claimed(&self, _guard: RunGuard) -> ScrapeRunSummary {
        let started_at = Utc::now();
        let t_run = Instant::now();
        metrics::ingestion::run_started();
        info!("🚀 Starting ingestion run over {} sources", self.sources.len());

        let mut counts = PersistCounts::default();
        let mut sources_failed = 0usize;

        for source in &self.sources {
            let name = source.name();
            let t_source = Instant::now();

            // Spawned so a panicking source cannot take the whole run down
            let task_source = Arc::clone(source);
            let result = tokio::spawn(async move { task_source.scrape().await })
                .await
                .unwrap_or_else(|join_err| {
                    Err(DiscoveryError::source_failure(
                        name,
                        format!("scrape task aborted: {}", join_err),
                    ))
                });
            metrics::ingestion::source_duration(name, t_source.elapsed().as_secs_f64());

            match result {
                Ok(events) => {
                    let fetched = events.len();
                    self.persist(name, events, &mut counts).await;
                    source.health().record_success();
                    metrics::ingestion::source_success(name, fetched);
                    info!("✅ {}: {} events", name, fetched);
                }
                Err(e) => {
                    sources_failed += 1;
                    source.health().record_failure();
                    metrics::ingestion::source_error(name);
                    error!("❌ {} failed: {}", name, e);
                }
            }
        }

        let summary = ScrapeRunSummary {
            started_at,
            finished_at: Utc::now(),
            success: true,
            events_inserted: counts.inserted,
            events_updated: counts.updated,
            sources_failed,
        };
        metrics::ingestion::run_duration(t_run.elapsed().as_secs_f64());
        info!(
            "Ingestion run finished: {} inserted, {} updated, {} sources failed",
            summary.events_inserted, summary.events_updated, summary.sources_failed
        );
        *self.last_run.write().await = Some(summary.clone());
        summary
    }

    async fn persist(&self, source: &str, events: Vec<Event>, counts: &mut PersistCounts) {
        for mut event in events {
            match self.store.upsert(&mut event).await {
                Ok(UpsertOutcome::Inserted) => {
                    counts.inserted += 1;
                    metrics::ingestion::event_inserted();
                }
                Ok(UpsertOutcome::Updated) => {
                    counts.updated += 1;
                    metrics::ingestion::event_updated();
                }
                Err(e) => {
                    warn!("{}: failed to persist '{}': {}", source, event.name, e);
                    metrics::ingestion::persist_error();
                }
            }
        }
    }

    pub async fn status(&self) -> IngestionStatus {
        let sources = self
            .sources
            .iter()
            .map(|s| {
                let health = s.health().snapshot();
                SourceStatus {
                    name: s.name().to_string(),
                    base_url: s.base_url().to_string(),
                    last_run_time: health.last_run_time,
                    last_run_success: health.last_run_success,
                    error_count: health.error_count,
                }
            })
            .collect();
        IngestionStatus {
            running: self.is_running(),
            source_count: self.sources.len(),
            sources,
            last_run: self.last_run.read().await.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::base::SourceHealth;
    use crate::common::error::Result;
    use crate::storage::InMemoryEventStore;

    struct PanickingSource {
        health: SourceHealth,
    }

    #[async_trait::async_trait]
    impl EventSource for PanickingSource {
        fn name(&self) -> &'static str {
            "panicky"
        }
        fn base_url(&self) -> &str {
            "mock://panicky"
        }
        async fn scrape(&self) -> Result<Vec<Event>> {
            panic!("parser blew up");
        }
        fn health(&self) -> &SourceHealth {
            &self.health
        }
    }

    #[tokio::test]
    async fn test_panicking_source_counts_as_failure() {
        let source: Arc<dyn EventSource> = Arc::new(PanickingSource {
            health: SourceHealth::new(),
        });
        let store = Arc::new(InMemoryEventStore::new());
        let coordinator = IngestionCoordinator::new(vec![source], store);

        let RunOutcome::Completed(summary) = coordinator.run_all().await else {
            panic!("expected a completed run");
        };
        assert!(summary.success);
        assert_eq!(summary.sources_failed, 1);
        assert!(!coordinator.is_running());

        let status = coordinator.status().await;
        assert_eq!(status.sources[0].error_count, 1);
        assert!(!status.sources[0].last_run_success);
    }

    #[tokio::test]
    async fn test_status_before_first_run() {
        let coordinator =
            IngestionCoordinator::new(Vec::new(), Arc::new(InMemoryEventStore::new()));
        let status = coordinator.status().await;
        assert!(!status.running);
        assert_eq!(status.source_count, 0);
        assert!(status.last_run.is_none());
    }
}
