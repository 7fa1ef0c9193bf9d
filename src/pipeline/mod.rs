pub mod ingestion;

pub use ingestion::{IngestionCoordinator, IngestionStatus, RunOutcome};
