pub mod apis;
pub mod app;
pub mod common;
pub mod config;
pub mod discovery;
pub mod infra;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod storage;

pub use common::error::{DiscoveryError, Result};
