use anyhow::Context;
use clap::{Parser, Subcommand};
use sms_discovery::app::DiscoveryService;
use sms_discovery::config::Config;
use sms_discovery::discovery::mood::mood_catalog;
use sms_discovery::pipeline::ingestion::{start_schedule, RunOutcome};
use sms_discovery::{logging, observability, server};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "sms_discovery")]
#[command(about = "Live-music event discovery, personalization and playlists")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every event source once and print the resulting status
    Ingest,
    /// Run the HTTP server with the daily ingestion schedule
    Serve {
        /// Port to listen on (overrides config and SMS_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Skip the daily ingestion schedule
        #[arg(long)]
        no_schedule: bool,
        /// Run one ingestion in the background at startup
        #[arg(long)]
        ingest_on_start: bool,
    },
    /// Print the mood catalog
    Moods,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;

    match cli.command {
        Commands::Ingest => {
            let service = DiscoveryService::from_config(&config)?;
            println!("🔄 Running ingestion for {}...", config.metro.name);
            match service.run_ingestion_now().await {
                RunOutcome::Completed(summary) => {
                    println!("\n📊 Ingestion results:");
                    println!("   Inserted: {}", summary.events_inserted);
                    println!("   Updated: {}", summary.events_updated);
                    println!("   Failed sources: {}", summary.sources_failed);
                }
                RunOutcome::AlreadyRunning => println!("⚠️  A run is already in progress"),
            }
            let status = service.get_ingestion_status().await;
            for source in &status.sources {
                let mark = if source.last_run_success { "✅" } else { "❌" };
                println!(
                    "   {} {} (errors: {})",
                    mark, source.name, source.error_count
                );
            }
        }
        Commands::Serve {
            port,
            no_schedule,
            ingest_on_start,
        } => {
            observability::init()?;
            let service = Arc::new(DiscoveryService::from_config(&config)?);

            // Keep the scheduler handle alive while serving
            let _scheduler = if config.ingestion.schedule_enabled && !no_schedule {
                Some(start_schedule(service.coordinator(), &config.ingestion.schedule).await?)
            } else {
                warn!("Daily ingestion schedule disabled");
                None
            };
            if ingest_on_start && service.run_ingestion() {
                info!("Startup ingestion started");
            }

            server::start_server(service, port.unwrap_or(config.server.port)).await?;
        }
        Commands::Moods => {
            println!("🎧 Moods:");
            for mood in mood_catalog() {
                println!(
                    "   {:<12} {} ({})",
                    mood.mood.as_str(),
                    mood.description,
                    mood.keywords
                );
            }
        }
    }

    Ok(())
}
