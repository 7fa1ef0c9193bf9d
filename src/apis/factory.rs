use crate::apis::bandsintown::BandsintownSource;
use crate::apis::base::{http_client, EventSource, MetroArea};
use crate::apis::ticketmaster::TicketmasterSource;
use crate::apis::venue_pages::VenuePagesSource;
use crate::common::constants::{BANDSINTOWN_SOURCE, TICKETMASTER_SOURCE, VENUE_PAGES_SOURCE};
use crate::common::error::Result;
use crate::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Names of every source the factory knows, in run order
pub const SOURCE_NAMES: [&str; 3] = [TICKETMASTER_SOURCE, BANDSINTOWN_SOURCE, VENUE_PAGES_SOURCE];

/// Build every configured source, sharing one HTTP client.
///
/// Sources without credentials are still constructed; they return no events
/// when scraped, so they show up in status output.
pub fn create_sources(config: &Config) -> Result<Vec<Arc<dyn EventSource>>> {
    let client = http_client(Duration::from_secs(config.ingestion.timeout_seconds))?;
    let metro = MetroArea::from_config(&config.metro);

    let sources: Vec<Arc<dyn EventSource>> = vec![
        Arc::new(TicketmasterSource::new(
            &config.ticketmaster,
            metro,
            client.clone(),
        )),
        Arc::new(BandsintownSource::new(
            &config.bandsintown,
            metro,
            client.clone(),
        )),
        Arc::new(VenuePagesSource::new(&config.venue_pages, metro, client)),
    ];
    info!(
        "Registered {} event sources for {}",
        sources.len(),
        config.metro.name
    );
    Ok(sources)
}
