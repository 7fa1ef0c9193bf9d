// Outbound adapters for external services

pub mod spotify;

pub use spotify::SpotifyClient;
