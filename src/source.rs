//! Remote economic-index sources.
//!
//! A source answers one question: "all monthly index rows, ordered by
//! sequence". The [`IndexRateProvider`](crate::index::IndexRateProvider)
//! decides what to do when it cannot.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rate::IndexFamily;

/// One month of published index values, in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    /// Position of the row within the published cycle.
    pub sequence: u32,
    /// Human-readable period, e.g. `"jan/2024"`.
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub incc: Option<Decimal>,
    #[serde(default)]
    pub ipca: Option<Decimal>,
    #[serde(default)]
    pub igpm: Option<Decimal>,
    #[serde(default)]
    pub cub: Option<Decimal>,
}

impl IndexRow {
    pub fn rate(&self, family: IndexFamily) -> Option<Decimal> {
        match family {
            IndexFamily::Incc => self.incc,
            IndexFamily::Ipca => self.ipca,
            IndexFamily::Igpm => self.igpm,
            IndexFamily::Cub => self.cub,
        }
    }
}

#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn fetch_rows(&self) -> anyhow::Result<Vec<IndexRow>>;
}

/// Reads index rows as a JSON array from an HTTP endpoint.
pub struct HttpIndexSource {
    client: Client,
    url: String,
}

impl HttpIndexSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IndexSource for HttpIndexSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_rows(&self) -> anyhow::Result<Vec<IndexRow>> {
        debug!(url = %self.url, "requesting index rows");

        let rows: Vec<IndexRow> = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to reach index source at {}", self.url))?
            .error_for_status()
            .context("Index source answered with an error status")?
            .json()
            .await
            .context("Index source returned malformed rows")?;

        debug!(count = rows.len(), "received index rows");
        Ok(rows)
    }
}
