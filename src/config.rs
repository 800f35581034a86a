use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scraper: ScraperServiceConfig,
    #[serde(default)]
    pub store: StoreServiceConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Runtime shared by both RPC services.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

fn default_worker_threads() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScraperServiceConfig {
    #[serde(default = "default_scraper_bind")]
    pub bind: String,
    /// Base URL of the store service used by `serve scraper` and `--remote`.
    #[serde(default = "default_store_url")]
    pub store_url: String,
}

impl Default for ScraperServiceConfig {
    fn default() -> Self {
        Self {
            bind: default_scraper_bind(),
            store_url: default_store_url(),
        }
    }
}

fn default_scraper_bind() -> String {
    "127.0.0.1:60002".to_string()
}
fn default_store_url() -> String {
    "http://127.0.0.1:60001".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreServiceConfig {
    #[serde(default = "default_store_bind")]
    pub bind: String,
}

impl Default for StoreServiceConfig {
    fn default() -> Self {
        Self {
            bind: default_store_bind(),
        }
    }
}

fn default_store_bind() -> String {
    "127.0.0.1:60001".to_string()
}

/// Two-phase scraping parameters for page-driven plugins.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_item_timeout_secs")]
    pub item_timeout_secs: u64,
    #[serde(default = "default_max_products")]
    pub max_products: usize,
    #[serde(default = "default_max_scroll_attempts")]
    pub max_scroll_attempts: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            item_timeout_secs: default_item_timeout_secs(),
            max_products: default_max_products(),
            max_scroll_attempts: default_max_scroll_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_workers() -> usize {
    5
}
fn default_item_timeout_secs() -> u64 {
    30
}
fn default_max_products() -> usize {
    20
}
fn default_max_scroll_attempts() -> usize {
    20
}
fn default_request_timeout_secs() -> u64 {
    20
}
fn default_user_agent() -> String {
    concat!("scrapqt/", env!("CARGO_PKG_VERSION")).to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_oracle_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            model: default_model(),
            base_url: default_oracle_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_batch_size() -> usize {
    10
}
fn default_batch_delay_ms() -> u64 {
    1000
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_oracle_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}

/// Which compiled-in source plugins are enabled.
#[derive(Debug, Deserialize, Clone)]
pub struct PluginsConfig {
    #[serde(default = "default_true")]
    pub example_commerce: bool,
    #[serde(default = "default_true")]
    pub premium_electronics: bool,
    #[serde(default)]
    pub marketplace: Option<MarketplaceConfig>,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            example_commerce: true,
            premium_electronics: true,
            marketplace: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketplaceConfig {
    #[serde(default = "default_marketplace_name")]
    pub name: String,
    #[serde(default = "default_marketplace_url")]
    pub base_url: String,
}

fn default_marketplace_name() -> String {
    "Tokopedia".to_string()
}
fn default_marketplace_url() -> String {
    "https://www.tokopedia.com".to_string()
}

impl Config {
    /// Configuration with every default and the database at `db_path`.
    pub fn with_db(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            server: ServerConfig::default(),
            scraper: ScraperServiceConfig::default(),
            store: StoreServiceConfig::default(),
            extraction: ExtractionConfig::default(),
            enrichment: EnrichmentConfig::default(),
            plugins: PluginsConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.server.worker_threads == 0 {
        anyhow::bail!("server.worker_threads must be > 0");
    }

    if config.extraction.workers == 0 {
        anyhow::bail!("extraction.workers must be > 0");
    }
    if config.extraction.workers >= config.server.worker_threads {
        anyhow::bail!(
            "extraction.workers ({}) must be lower than server.worker_threads ({})",
            config.extraction.workers,
            config.server.worker_threads
        );
    }
    if config.extraction.item_timeout_secs == 0 {
        anyhow::bail!("extraction.item_timeout_secs must be > 0");
    }
    if config.extraction.max_products == 0 {
        anyhow::bail!("extraction.max_products must be > 0");
    }

    if config.enrichment.batch_size == 0 {
        anyhow::bail!("enrichment.batch_size must be > 0");
    }

    if config.scraper.bind == config.store.bind {
        anyhow::bail!(
            "scraper.bind and store.bind must differ (both are '{}')",
            config.scraper.bind
        );
    }

    if let Some(m) = &config.plugins.marketplace {
        url::Url::parse(&m.base_url)
            .with_context(|| format!("plugins.marketplace.base_url is not a URL: {}", m.base_url))?;
    }

    Ok(())
}
