// Shared types, errors and constants used across the engine

pub mod constants;
pub mod error;
pub mod types;

pub use error::{DiscoveryError, Result};
