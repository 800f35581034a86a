//! HTTP services.
//!
//! Two independent services, each started with `scrapqt serve <name>`:
//!
//! # Store service (default `127.0.0.1:60001`)
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/analyze` | Score one text with the oracle |
//! | `POST` | `/analyze/database` | Batch-enrich every unscored product |
//! | `POST` | `/items` | Save items (dedup + link) in one transaction |
//! | `POST` | `/queries` | Resolve-or-create a query |
//! | `POST` | `/queries/link` | Link two queries |
//! | `GET`  | `/queries/{id}` | Fetch a query |
//! | `GET`  | `/queries/{id}/links` | Outgoing links of a query |
//! | `GET`  | `/products/search?term=` | Products for matching queries |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Scraper service (default `127.0.0.1:60002`)
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/scrape` | Run every plugin for a query, save via the Store service |
//! | `POST` | `/expand` | Scrape a query and everything linked from it |
//! | `GET`  | `/plugins` | Registered plugins |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `failed_precondition` (412), `oracle_error` (500), `internal` (500).
//! `POST /items` is the exception: a failed save answers 500 with
//! `{"success": false, "items_saved": 0}` so callers always get a count.

use std::sync::Arc;

use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use scrapqt_core::models::{Product, Query, QueryLink};
use scrapqt_core::score::normalize_score;
use scrapqt_core::store::{Store, StoreError};

use crate::api::{
    AnalyzeDatabaseResponse, AnalyzeRequest, AnalyzeResponse, ErrorBody, ErrorDetail,
    HealthResponse, LinkQueriesRequest, LinkQueriesResponse, PluginInfo, PluginsResponse,
    SaveItemsRequest, SaveItemsResponse, SaveQueryRequest, SaveQueryResponse, ScrapeRequest,
    SearchParams,
};
use crate::client::StoreClient;
use crate::config::{Config, EnrichmentConfig};
use crate::enrich::BatchEnricher;
use crate::error::{OracleError, PipelineError};
use crate::expand::{ExpansionReport, LinkedQueryExpander};
use crate::ingest::{ScrapeOrchestrator, ScrapeReport};
use crate::oracle::{GeminiOracle, ScoringOracle};
use crate::plugins::PluginRegistry;
use crate::progress::NoProgress;
use crate::sqlite_store::SqliteStore;

/// Shared state of the Store service.
#[derive(Clone)]
pub struct StoreState {
    pub store: Arc<dyn Store>,
    pub oracle: Arc<dyn ScoringOracle>,
    pub enrichment: EnrichmentConfig,
}

/// Shared state of the Scraper service.
#[derive(Clone)]
pub struct ScraperState {
    pub orchestrator: Arc<ScrapeOrchestrator>,
    pub plugins: PluginRegistry,
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn store_router(state: StoreState) -> Router {
    Router::new()
        .route("/analyze", post(handle_analyze))
        .route("/analyze/database", post(handle_analyze_database))
        .route("/items", post(handle_save_items))
        .route("/queries", post(handle_save_query))
        .route("/queries/link", post(handle_link_queries))
        .route("/queries/{id}", get(handle_get_query))
        .route("/queries/{id}/links", get(handle_query_links))
        .route("/products/search", get(handle_search_products))
        .route("/health", get(handle_health))
        .layer(cors())
        .with_state(state)
}

pub fn scraper_router(state: ScraperState) -> Router {
    Router::new()
        .route("/scrape", post(handle_scrape))
        .route("/expand", post(handle_expand))
        .route("/plugins", get(handle_plugins))
        .route("/health", get(handle_health))
        .layer(cors())
        .with_state(state)
}

/// Starts the Store service on `[store].bind`.
pub async fn run_store_service(config: &Config) -> anyhow::Result<()> {
    let store = SqliteStore::open(config).await?;
    let state = StoreState {
        store: Arc::new(store),
        oracle: Arc::new(GeminiOracle::from_env(&config.enrichment)?),
        enrichment: config.enrichment.clone(),
    };
    if state.oracle.check_ready().is_err() {
        warn!("GEMINI_API_KEY is not set; /analyze endpoints will fail until it is");
    }

    let bind_addr = config.store.bind.clone();
    println!("Store service listening on http://{}", bind_addr);
    info!(bind = %bind_addr, "store service started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, store_router(state)).await?;
    Ok(())
}

/// Starts the Scraper service on `[scraper].bind`, saving through the
/// Store service at `[scraper].store_url`.
pub async fn run_scraper_service(config: &Config) -> anyhow::Result<()> {
    let plugins = PluginRegistry::from_config(config);
    let sink = Arc::new(StoreClient::new(&config.scraper.store_url)?);
    let state = ScraperState {
        orchestrator: Arc::new(ScrapeOrchestrator::new(plugins.clone(), sink)),
        plugins,
    };

    let bind_addr = config.scraper.bind.clone();
    println!("Scraper service listening on http://{}", bind_addr);
    for name in state.plugins.names() {
        println!("  plugin: {}", name);
    }
    info!(bind = %bind_addr, store = %config.scraper.store_url, "scraper service started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, scraper_router(state)).await?;
    Ok(())
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Map oracle failures: a missing credential is the caller's problem to
/// fix (412), anything else is the oracle's (500).
fn oracle_failure(err: &OracleError) -> AppError {
    if err.is_precondition() {
        AppError {
            status: StatusCode::PRECONDITION_FAILED,
            code: "failed_precondition",
            message: err.to_string(),
        }
    } else {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "oracle_error",
            message: err.to_string(),
        }
    }
}

fn classify_store_error(err: anyhow::Error) -> AppError {
    match StoreError::find(&err) {
        Some(e) => not_found(e.to_string()),
        None => internal(format!("{:#}", err)),
    }
}

// ============ GET /health ============

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /analyze ============

async fn handle_analyze(
    State(state): State<StoreState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    state.oracle.check_ready().map_err(|e| oracle_failure(&e))?;
    if req.text.trim().is_empty() {
        return Err(bad_request("text must not be empty"));
    }

    let score = state
        .oracle
        .score(&req.text)
        .await
        .map_err(|e| oracle_failure(&e))?;
    let normalized = normalize_score(score).map_err(|e| internal(e.to_string()))?;
    Ok(Json(AnalyzeResponse { score, normalized }))
}

// ============ POST /analyze/database ============

async fn handle_analyze_database(
    State(state): State<StoreState>,
) -> Result<Json<AnalyzeDatabaseResponse>, AppError> {
    let enricher = BatchEnricher::new(state.store.clone(), state.oracle.clone(), &state.enrichment);
    let report = enricher.run(&NoProgress).await.map_err(|e| {
        match e.downcast_ref::<PipelineError>() {
            Some(PipelineError::OracleUnavailable(oracle_err)) => oracle_failure(oracle_err),
            _ => internal(format!("{:#}", e)),
        }
    })?;
    Ok(Json(AnalyzeDatabaseResponse {
        items_analyzed: report.analyzed,
        items_failed: report.failed,
    }))
}

// ============ POST /items ============

async fn handle_save_items(
    State(state): State<StoreState>,
    Json(req): Json<SaveItemsRequest>,
) -> Response {
    match state.store.save_items(&req.items).await {
        Ok(outcome) => Json(SaveItemsResponse {
            success: true,
            items_saved: outcome.saved(),
            inserted: outcome.inserted,
            linked: outcome.linked,
            skipped: outcome.skipped,
        })
        .into_response(),
        Err(e) => {
            warn!(items = req.items.len(), error = %e, "save items failed, rolled back");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SaveItemsResponse {
                    success: false,
                    items_saved: 0,
                    inserted: 0,
                    linked: 0,
                    skipped: 0,
                }),
            )
                .into_response()
        }
    }
}

// ============ /queries ============

async fn handle_save_query(
    State(state): State<StoreState>,
    Json(req): Json<SaveQueryRequest>,
) -> Result<Json<SaveQueryResponse>, AppError> {
    if req.query_text.trim().is_empty() {
        return Err(bad_request("query_text must not be empty"));
    }
    let query_id = state
        .store
        .save_query(&req.query_text)
        .await
        .map_err(classify_store_error)?;
    Ok(Json(SaveQueryResponse { query_id }))
}

async fn handle_link_queries(
    State(state): State<StoreState>,
    Json(req): Json<LinkQueriesRequest>,
) -> Result<Json<LinkQueriesResponse>, AppError> {
    let link_id = state
        .store
        .link_queries(req.primary_query_id, req.linked_query_id, &req.relationship_type)
        .await
        .map_err(classify_store_error)?;
    Ok(Json(LinkQueriesResponse {
        success: true,
        link_id,
    }))
}

async fn handle_get_query(
    State(state): State<StoreState>,
    Path(id): Path<i64>,
) -> Result<Json<Query>, AppError> {
    state
        .store
        .get_query(id)
        .await
        .map_err(classify_store_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("query not found: {}", id)))
}

async fn handle_query_links(
    State(state): State<StoreState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<QueryLink>>, AppError> {
    let links = state
        .store
        .linked_queries(id)
        .await
        .map_err(classify_store_error)?;
    Ok(Json(links))
}

// ============ GET /products/search ============

async fn handle_search_products(
    State(state): State<StoreState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> Result<Json<Vec<Product>>, AppError> {
    if params.term.trim().is_empty() {
        return Err(bad_request("term must not be empty"));
    }
    let products = state
        .store
        .search_products(&params.term)
        .await
        .map_err(classify_store_error)?;
    Ok(Json(products))
}

// ============ Scraper service ============

async fn handle_scrape(
    State(state): State<ScraperState>,
    Json(req): Json<ScrapeRequest>,
) -> Result<Json<ScrapeReport>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let report = state
        .orchestrator
        .run(&req.query)
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;
    Ok(Json(report))
}

async fn handle_expand(
    State(state): State<ScraperState>,
    Json(req): Json<ScrapeRequest>,
) -> Result<Json<ExpansionReport>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let expander = LinkedQueryExpander::new(state.orchestrator.clone());
    let report = expander
        .scrape_with_links(&req.query, &NoProgress)
        .await
        .map_err(|e| internal(format!("{:#}", e)))?;
    Ok(Json(report))
}

async fn handle_plugins(State(state): State<ScraperState>) -> Json<PluginsResponse> {
    Json(PluginsResponse {
        plugins: state
            .plugins
            .plugins()
            .iter()
            .map(|p| PluginInfo {
                platform: p.platform_name().to_string(),
                description: p.description().to_string(),
            })
            .collect(),
    })
}

/// Bind `router` to an ephemeral local port and serve it in the background.
///
/// Returns the base URL. Used by tests that exercise the services over
/// real HTTP.
pub async fn spawn_local(router: Router) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            warn!(error = %e, "local server stopped");
        }
    });
    Ok(format!("http://{}", addr))
}
