#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the fire response ingestion tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fire_response_analytics::report::{render_report, source_sections, write_report};
use fire_response_database::{paths, store};
use fire_response_database_models::StoreMode;
use fire_response_ingest::{all_sources, enabled_sources, sync_source};
use fire_response_ingest_models::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_ROWS, IngestConfig};
use fire_response_source::FetchOptions;
use fire_response_source::source_def::SourceDefinition;

#[derive(Parser)]
#[command(
    name = "fire_response_ingest",
    about = "Fire incident ingestion and response-time reporting tool"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all configured data sources
    Sources,
    /// Create the store schema
    Init {
        /// `append` keeps existing rows, `reset` drops and recreates every table
        #[arg(long, default_value = "append", value_parser = parse_mode)]
        mode: StoreMode,
    },
    /// Fetch and ingest a specific source
    Sync {
        /// Source identifier (e.g., "`la_fd`")
        source: String,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Fetch and ingest every configured source
    SyncAll {
        /// Comma-separated list of source IDs to sync (overrides `FIRE_RESPONSE_SOURCES` env var)
        #[arg(long)]
        sources: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Write the response-time and locality report
    Report {
        /// Only report on this source. Defaults to one section pair per source.
        #[arg(long)]
        source: Option<String>,
        /// Report file path (default: `calculations.txt` in the data directory)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Append to the report file instead of overwriting it
        #[arg(long)]
        append: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Maximum number of fact rows stored per source
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
    max_rows: u64,
    /// Number of rows committed per transaction
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// `append` keeps existing rows, `reset` drops and recreates every table
    #[arg(long, default_value = "append", value_parser = parse_mode)]
    mode: StoreMode,
    /// Skip fetching and ingest only what is already in the raw cache
    #[arg(long)]
    offline: bool,
    /// Maximum number of raw records to fetch (default: `--max-rows`)
    #[arg(long)]
    fetch_limit: Option<u64>,
}

impl RunArgs {
    const fn config(&self) -> IngestConfig {
        IngestConfig {
            max_rows: self.max_rows,
            batch_size: self.batch_size,
            mode: self.mode,
        }
    }

    fn fetch_options(&self) -> Option<FetchOptions> {
        (!self.offline).then(|| FetchOptions {
            limit: Some(self.fetch_limit.unwrap_or(self.max_rows)),
            offset: 0,
        })
    }
}

fn parse_mode(s: &str) -> Result<StoreMode, String> {
    s.parse()
        .map_err(|_| format!("invalid mode '{s}' (expected 'append' or 'reset')"))
}

fn find_source(id: &str) -> Result<SourceDefinition, String> {
    fire_response_source::registry::find_source(id).ok_or_else(|| format!("Unknown source: {id}"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sources => {
            let sources = all_sources();
            println!("{:<12} {:<32} {:<16} PORTAL", "ID", "NAME", "CITY");
            println!("{}", "-".repeat(100));
            for source in &sources {
                let location = format!("{}, {}", source.city, source.state);
                println!(
                    "{:<12} {:<32} {location:<16} {}",
                    source.id(),
                    source.name(),
                    source.portal_url().unwrap_or_default()
                );
            }
        }
        Commands::Init { mode } => {
            let path = paths::store_db_path();
            store::open(&path, mode)?;
            log::info!("Store ready at {} ({mode} mode)", path.display());
        }
        Commands::Sync { source, run } => {
            let src = find_source(&source)?;
            let config = run.config();
            let conn = store::open_default(config.mode)?;
            let summary = sync_source(&conn, &src, &config, run.fetch_options().as_ref()).await?;
            println!(
                "{}: stored {} of {} records ({} skipped)",
                summary.source_id, summary.accepted, summary.records_seen, summary.skipped
            );
        }
        Commands::SyncAll { sources, run } => {
            let sources = enabled_sources(sources);
            log::info!(
                "Syncing {} source(s): {}",
                sources.len(),
                sources
                    .iter()
                    .map(SourceDefinition::id)
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            let config = run.config();
            let conn = store::open_default(config.mode)?;
            let fetch = run.fetch_options();

            for src in &sources {
                match sync_source(&conn, src, &config, fetch.as_ref()).await {
                    Ok(summary) => println!(
                        "{}: stored {} of {} records ({} skipped)",
                        summary.source_id, summary.accepted, summary.records_seen, summary.skipped
                    ),
                    Err(e) => log::error!("Failed to sync {}: {e}", src.id()),
                }
            }
        }
        Commands::Report {
            source,
            output,
            append,
        } => {
            let sources = match source {
                Some(id) => vec![find_source(&id)?],
                None => all_sources(),
            };

            let conn = store::open_default(StoreMode::Append)?;
            let sections = sources
                .iter()
                .flat_map(|src| source_sections(&conn, Some(src.id()), src.name()))
                .collect::<Vec<_>>();

            let text = render_report(&sections);
            let path = output.unwrap_or_else(paths::report_path);
            write_report(&path, &text, append)?;

            print!("{text}");
            log::info!("Report written to {}", path.display());
        }
    }

    Ok(())
}
