//! # scrapqt CLI
//!
//! The `scrapqt` binary drives scraping, linkage, enrichment, and the two
//! HTTP services.
//!
//! ## Usage
//!
//! ```bash
//! scrapqt --config ./config/scrapqt.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scrapqt init` | Create the SQLite database and run schema migrations |
//! | `scrapqt plugins` | List enabled source plugins |
//! | `scrapqt scrape "<query>"` | Run every plugin for a query and save the results |
//! | `scrapqt link "<a>" "<b>"` | Record that query `b` is related to query `a` |
//! | `scrapqt expand "<query>"` | Scrape a query and every query linked from it |
//! | `scrapqt enrich` | Score unscored products in batches |
//! | `scrapqt search <term>` | Products found by queries matching a term |
//! | `scrapqt suggest <term>` | Earlier queries resembling a term |
//! | `scrapqt get <id>` | Show one product and the queries that found it |
//! | `scrapqt stats` | Database summary |
//! | `scrapqt export` | Dump all products as JSON |
//! | `scrapqt serve store\|scraper` | Start an HTTP service |

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrapqt::cancel::Cancellation;
use scrapqt::client::StoreClient;
use scrapqt::config::{self, Config};
use scrapqt::enrich::{self, BatchEnricher};
use scrapqt::expand::{self, LinkedQueryExpander};
use scrapqt::ingest::{self, ScrapeOrchestrator};
use scrapqt::oracle::GeminiOracle;
use scrapqt::plugins::PluginRegistry;
use scrapqt::progress::ProgressMode;
use scrapqt::sink::ItemSink;
use scrapqt::sqlite_store::SqliteStore;
use scrapqt::{export, get, maintenance, migrate, search, server, sources, stats};
use scrapqt_core::store::{Store, DEFAULT_RELATIONSHIP};

/// scrapqt: plugin-driven product scraping with deduplication and
/// sentiment enrichment.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/scrapqt.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "scrapqt",
    about = "Plugin-driven product scraping with deduplication and sentiment enrichment",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scrapqt.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a terminal and
    /// `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Off,
    Human,
    Json,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. Running it
    /// more than once is safe.
    Init,

    /// List enabled source plugins.
    Plugins,

    /// Scrape a query with every enabled plugin.
    ///
    /// Items are deduplicated by link: a product seen before is linked to
    /// this query instead of stored again.
    Scrape {
        query: String,

        /// Save through the Store service at `[scraper].store_url` instead
        /// of the local database.
        #[arg(long)]
        remote: bool,
    },

    /// Link two queries, creating either one if needed.
    Link {
        /// Text of the primary query.
        primary: String,

        /// Text of the linked query.
        linked: String,

        /// Relationship label.
        #[arg(long = "type", default_value = DEFAULT_RELATIONSHIP)]
        relationship_type: String,
    },

    /// Scrape a query, then every query reachable through its links.
    Expand {
        query: String,

        #[arg(long)]
        remote: bool,
    },

    /// Score every product without a sentiment score.
    ///
    /// Requires `GEMINI_API_KEY` in the environment or a `.env` file.
    Enrich {
        /// Override `[enrichment].batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Override `[enrichment].batch_delay_ms`.
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Products found by queries whose text contains a term.
    Search {
        term: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Earlier queries resembling a term.
    Suggest {
        term: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show one product and every query that found it.
    Get {
        id: i64,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print database statistics.
    Stats,

    /// Export products as JSON.
    Export {
        /// Output file. Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Only products from this platform.
        #[arg(long)]
        platform: Option<String>,
    },

    /// Delete one product and its query associations.
    Delete { id: i64 },

    /// Remove every product, query, and link.
    Clear {
        /// Confirm the wipe.
        #[arg(long)]
        yes: bool,
    },

    /// Start an HTTP service.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// Product storage, query linkage, and scoring.
    Store,
    /// Scraping, saving through the Store service.
    Scraper,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scrapqt=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cfg.server.worker_threads)
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(cli, cfg))
}

async fn run(cli: Cli, cfg: Config) -> Result<()> {
    let progress_mode = cli
        .progress
        .map(ProgressMode::from)
        .unwrap_or_else(ProgressMode::default_for_tty);
    let progress = progress_mode.reporter();

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Plugins => {
            sources::list_plugins(&cfg);
        }
        Commands::Scrape { query, remote } => {
            let sink = open_sink(&cfg, remote).await?;
            let report =
                ingest::run_scrape(&cfg, sink, &query, progress.as_ref(), cancel_on_ctrl_c())
                    .await?;
            if !report.success {
                anyhow::bail!("scrape of '{}' saved nothing", query);
            }
        }
        Commands::Link {
            primary,
            linked,
            relationship_type,
        } => {
            let store = SqliteStore::open(&cfg).await?;
            let primary_id = store.save_query(&primary).await?;
            let linked_id = store.save_query(&linked).await?;
            let link_id = store
                .link_queries(primary_id, linked_id, &relationship_type)
                .await?;
            println!(
                "Linked [{}] {} -> [{}] {} ({}, link {})",
                primary_id, primary, linked_id, linked, relationship_type, link_id
            );
        }
        Commands::Expand { query, remote } => {
            let sink = open_sink(&cfg, remote).await?;
            let orchestrator = ScrapeOrchestrator::new(PluginRegistry::from_config(&cfg), sink)
                .with_cancellation(cancel_on_ctrl_c());
            let expander = LinkedQueryExpander::new(Arc::new(orchestrator));
            let report = expander
                .scrape_with_links(&query, progress.as_ref())
                .await?;
            expand::print_report(&report);
        }
        Commands::Enrich {
            batch_size,
            delay_ms,
        } => {
            let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&cfg).await?);
            let oracle = Arc::new(GeminiOracle::from_env(&cfg.enrichment)?);
            let mut enricher = BatchEnricher::new(store, oracle, &cfg.enrichment)
                .with_cancellation(cancel_on_ctrl_c());
            if let Some(size) = batch_size {
                enricher = enricher.with_batch_size(size);
            }
            if let Some(ms) = delay_ms {
                enricher = enricher.with_delay(Duration::from_millis(ms));
            }
            enrich::run_enrich(&enricher, progress.as_ref()).await?;
        }
        Commands::Search { term, limit } => {
            let store = SqliteStore::open(&cfg).await?;
            search::run_search(&store, &term, limit).await?;
        }
        Commands::Suggest { term, limit } => {
            let store = SqliteStore::open(&cfg).await?;
            search::run_suggest(&store, &term, limit).await?;
        }
        Commands::Get { id, json } => {
            let store = SqliteStore::open(&cfg).await?;
            get::run_get(&store, id, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { output, platform } => {
            let store = SqliteStore::open(&cfg).await?;
            export::run_export(&store, output.as_deref(), platform.as_deref()).await?;
        }
        Commands::Delete { id } => {
            let store = SqliteStore::open(&cfg).await?;
            maintenance::run_delete(&store, id).await?;
        }
        Commands::Clear { yes } => {
            let store = SqliteStore::open(&cfg).await?;
            maintenance::run_clear(&store, yes).await?;
        }
        Commands::Serve { service } => match service {
            ServeService::Store => server::run_store_service(&cfg).await?,
            ServeService::Scraper => server::run_scraper_service(&cfg).await?,
        },
    }

    Ok(())
}

/// Local database, or the Store service when `remote` is set.
async fn open_sink(cfg: &Config, remote: bool) -> Result<Arc<dyn ItemSink>> {
    if remote {
        return Ok(Arc::new(StoreClient::new(&cfg.scraper.store_url)?));
    }
    Ok(Arc::new(SqliteStore::open(cfg).await?))
}

/// A cancellation flag raised by the first Ctrl-C.
fn cancel_on_ctrl_c() -> Cancellation {
    let cancel = Cancellation::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing the current step");
            flag.cancel();
        }
    });
    cancel
}
