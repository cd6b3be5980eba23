//! Engine settings: where index rates come from and how resale picks are tuned.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::index::{DEFAULT_FETCH_TIMEOUT, IndexRateProvider};
use crate::resale::{ResaleOptimizer, RiskPolicy};
use crate::source::{HttpIndexSource, IndexSource};

pub const ENV_INDEX_URL: &str = "BR_RESALE_INDEX_URL";
pub const ENV_INDEX_TIMEOUT_MS: &str = "BR_RESALE_INDEX_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSourceSettings {
    /// Endpoint serving index rows as JSON. `None` keeps the built-in history.
    pub url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for IndexSourceSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: DEFAULT_FETCH_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub index_source: IndexSourceSettings,
    pub risk_policy: RiskPolicy,
}

impl EngineSettings {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Failed to parse engine settings")
    }

    /// Applies `BR_RESALE_INDEX_URL` and `BR_RESALE_INDEX_TIMEOUT_MS` when set.
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        if let Some(url) = lookup(ENV_INDEX_URL) {
            let url = url.trim().to_string();
            self.index_source.url = (!url.is_empty()).then_some(url);
        }
        if let Some(timeout) = lookup(ENV_INDEX_TIMEOUT_MS) {
            self.index_source.timeout_ms = timeout
                .trim()
                .parse()
                .with_context(|| {
                    format!("{ENV_INDEX_TIMEOUT_MS} must be a number of milliseconds")
                })?;
        }
        Ok(self)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.index_source.timeout_ms)
    }

    /// Provider wired to the configured source, or offline without a URL.
    pub fn build_provider(&self) -> IndexRateProvider {
        let source = self.index_source.url.as_ref().map(|url| {
            info!(url = %url, "using remote index source");
            Arc::new(HttpIndexSource::new(url.clone())) as Arc<dyn IndexSource>
        });
        IndexRateProvider::with_timeout(source, self.fetch_timeout())
    }

    pub fn build_optimizer(&self) -> ResaleOptimizer {
        ResaleOptimizer::new(self.risk_policy)
    }
}
