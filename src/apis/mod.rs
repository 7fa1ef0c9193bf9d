pub mod bandsintown;
pub mod base;
pub mod factory;
pub mod ticketmaster;
pub mod venue_pages;

pub use base::{EventSource, SourceHealth};
pub use factory::create_sources;
