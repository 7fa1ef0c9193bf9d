// Application layer: the operations the server and CLI call into

pub mod discovery_service;

pub use discovery_service::{DiscoveryService, GeneratedPlaylist};
