//! Shelter listing ingestion CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shelters::{
    error::Result,
    models::{Config, Source},
    pipeline::{self, LivenessReviser},
    reference::ReferenceData,
    services::HttpProbe,
    state::CrawlState,
    storage::{ExportLog, ListingStore},
};

/// Shelter listing ingestion pipeline
#[derive(Parser, Debug)]
#[command(
    name = "shelters",
    version,
    about = "Normalizes animal shelter listings into a deduplicated store"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a JSONL file of raw listings
    Ingest {
        /// Source that produced the file (seconde-chance, spa)
        #[arg(short, long)]
        source: Source,

        /// Raw listings, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Page token; the file is skipped if this page was already processed
        #[arg(long)]
        page: Option<String>,
    },

    /// Probe unadopted listings and flag the ones that are gone
    Revise {
        /// Only revise this source (default: all)
        #[arg(short, long)]
        source: Option<Source>,
    },

    /// Validate configuration and reference data
    Validate,

    /// Show store and crawl state counts
    Info,

    /// Clear the crawl state of a source
    Reset {
        #[arg(short, long)]
        source: Source,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn sources(selected: Option<Source>) -> Vec<Source> {
    selected.map_or_else(|| Source::ALL.to_vec(), |s| vec![s])
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    config.validate()?;

    match cli.command {
        Command::Ingest {
            source,
            input,
            page,
        } => {
            let refs = ReferenceData::load(&config.paths)?;
            let mut store = ListingStore::open(&config.paths.database)?;
            pipeline::run_ingest(&config, &refs, &mut store, source, &input, page.as_deref())?;
        }

        Command::Revise { source } => {
            let store = ListingStore::open(&config.paths.database)?;
            let reviser = LivenessReviser::new(HttpProbe::new(&config.crawler)?, &config.crawler);

            for source in sources(source) {
                let export = ExportLog::new(config.paths.export_log(source));
                pipeline::run_revise(&reviser, &export, &store, source).await?;
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK ({})", cli.config.display());

            if let Err(e) = ReferenceData::load(&config.paths) {
                log::error!("Reference data failed to load: {}", e);
                return Err(e);
            }
            log::info!("✓ Reference data OK");

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Database: {}", config.paths.database.display());
            let store = ListingStore::open(&config.paths.database)?;

            for source in Source::ALL {
                let state = CrawlState::open(config.paths.state_dir_for(source))?;
                log::info!(
                    "{}: {} listings ({} adopted), {} pages and {} listings processed",
                    source,
                    store.count(Some(source))?,
                    store.count_adopted(Some(source))?,
                    state.pages.len(),
                    state.listings.len()
                );
            }
        }

        Command::Reset { source } => {
            CrawlState::reset(config.paths.state_dir_for(source))?;
        }
    }

    log::info!("Done!");

    Ok(())
}
