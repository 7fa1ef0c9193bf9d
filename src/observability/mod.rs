// Observability: Prometheus metrics grouped by phase

pub mod metrics;

pub use metrics::{init, render};
