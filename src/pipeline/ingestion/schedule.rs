use crate::common::error::{DiscoveryError, Result};
use crate::pipeline::ingestion::coordinator::{IngestionCoordinator, RunOutcome};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

/// Start a cron job (six fields, UTC) that calls `run_all`.
///
/// Shares the coordinator's run flag with on-demand triggers, so a scheduled
/// run that fires during a manual one is skipped.
pub async fn start_schedule(
    coordinator: Arc<IngestionCoordinator>,
    cron: &str,
) -> Result<JobScheduler> {
    let sched = JobScheduler::new()
        .await
        .map_err(|e| DiscoveryError::Scheduler(format!("creating scheduler: {:?}", e)))?;

    let job = Job::new_async(cron, move |_uuid, _l| {
        let coordinator = Arc::clone(&coordinator);
        Box::pin(async move {
            scheduled_run(&coordinator).await;
        })
    })
    .map_err(|e| DiscoveryError::Scheduler(format!("bad cron '{}': {:?}", cron, e)))?;

    sched
        .add(job)
        .await
        .map_err(|e| DiscoveryError::Scheduler(format!("adding job: {:?}", e)))?;
    sched
        .start()
        .await
        .map_err(|e| DiscoveryError::Scheduler(format!("starting scheduler: {:?}", e)))?;

    info!("Ingestion scheduled with cron '{}' (UTC)", cron);
    Ok(sched)
}

/// Body of the cron job
async fn scheduled_run(coordinator: &IngestionCoordinator) -> RunOutcome {
    info!("⏰ Scheduled ingestion triggered");
    let outcome = coordinator.run_all().await;
    if outcome == RunOutcome::AlreadyRunning {
        info!("Scheduled ingestion skipped, a run is already active");
    }
    outcome
}
