// Ingestion: sequential source runs, dedup-on-persist and the daily schedule

pub mod coordinator;
pub mod schedule;

pub use coordinator::{IngestionCoordinator, IngestionStatus, RunOutcome, ScrapeRunSummary};
pub use schedule::start_schedule;
