//! HTTP client for the Store service.
//!
//! Used by the Scraper service and by `scrapqt scrape --remote` to save
//! queries and items through a running `scrapqt serve store`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use scrapqt_core::models::{CanonicalItem, Product, Query, QueryLink, SaveOutcome};

use crate::api::{
    AnalyzeDatabaseResponse, AnalyzeRequest, AnalyzeResponse, ErrorBody, LinkQueriesRequest,
    LinkQueriesResponse, SaveItemsRequest, SaveItemsResponse, SaveQueryRequest, SaveQueryResponse,
};
use crate::sink::ItemSink;

#[derive(Clone)]
pub struct StoreClient {
    client: reqwest::Client,
    base_url: String,
}

impl StoreClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("building store client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn save_query(&self, text: &str) -> Result<i64> {
        let resp: SaveQueryResponse = self
            .post(
                "/queries",
                &SaveQueryRequest {
                    query_text: text.to_string(),
                },
            )
            .await?;
        Ok(resp.query_id)
    }

    pub async fn get_query(&self, id: i64) -> Result<Option<Query>> {
        let response = self
            .client
            .get(self.url(&format!("/queries/{}", id)))
            .send()
            .await
            .with_context(|| format!("GET /queries/{}", id))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(decode(response).await?))
    }

    pub async fn linked_queries(&self, id: i64) -> Result<Vec<QueryLink>> {
        self.get(&format!("/queries/{}/links", id)).await
    }

    pub async fn save_items(&self, items: &[CanonicalItem]) -> Result<SaveOutcome> {
        let resp: SaveItemsResponse = self
            .post(
                "/items",
                &SaveItemsRequest {
                    items: items.to_vec(),
                },
            )
            .await?;
        if !resp.success {
            bail!("store service reported a failed save");
        }
        Ok(SaveOutcome {
            inserted: resp.inserted,
            linked: resp.linked,
            skipped: resp.skipped,
        })
    }

    pub async fn link_queries(&self, primary: i64, linked: i64, relationship_type: &str) -> Result<i64> {
        let resp: LinkQueriesResponse = self
            .post(
                "/queries/link",
                &LinkQueriesRequest {
                    primary_query_id: primary,
                    linked_query_id: linked,
                    relationship_type: relationship_type.to_string(),
                },
            )
            .await?;
        Ok(resp.link_id)
    }

    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        let response = self
            .client
            .get(self.url("/products/search"))
            .query(&[("term", term)])
            .send()
            .await
            .context("GET /products/search")?;
        decode(response).await
    }

    pub async fn analyze(&self, text: &str) -> Result<AnalyzeResponse> {
        self.post(
            "/analyze",
            &AnalyzeRequest {
                text: text.to_string(),
            },
        )
        .await
    }

    pub async fn analyze_database(&self) -> Result<AnalyzeDatabaseResponse> {
        self.post("/analyze/database", &serde_json::json!({})).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("GET {}", path))?;
        decode(response).await
    }

    async fn post<B: serde::Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {}", path))?;
        decode(response).await
    }
}

/// Decode a success body, or turn an error body into an `anyhow` error
/// carrying the service's code and message.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let text = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => bail!("store service {} ({}): {}", status, body.error.code, body.error.message),
        Err(_) => bail!("store service {}: {}", status, text),
    }
}

#[async_trait]
impl ItemSink for StoreClient {
    async fn resolve_query(&self, text: &str) -> Result<i64> {
        self.save_query(text).await
    }

    async fn lookup_query(&self, id: i64) -> Result<Option<Query>> {
        self.get_query(id).await
    }

    async fn persist_items(&self, items: &[CanonicalItem]) -> Result<SaveOutcome> {
        self.save_items(items).await
    }

    async fn query_links(&self, primary_query_id: i64) -> Result<Vec<QueryLink>> {
        self.linked_queries(primary_query_id).await
    }
}
