// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Cost estimation for tracked calls.
//!
//! Prices come from a [`PricingSource`]. The built-in [`StaticPricing`] table
//! covers common Anthropic and OpenAI models; callers can supply their own
//! source (a remote price list, a database) through the tracker options.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CostError;
use crate::types::{Cost, Usage};

/// Default time allowed for a pricing lookup.
pub const DEFAULT_COST_TIMEOUT: Duration = Duration::from_secs(5);

const PER_MILLION: f64 = 1_000_000.0;

/// Pricing per million tokens (USD).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPricing {
    /// Input cost per million tokens
    pub input: f64,
    /// Output cost per million tokens
    pub output: f64,
    /// Cache read cost per million tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<f64>,
    /// Cache write cost per million tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<f64>,
}

impl ModelPricing {
    pub const fn new(input: f64, output: f64) -> Self {
        Self {
            input,
            output,
            cache_read: None,
            cache_write: None,
        }
    }

    pub const fn with_cache(mut self, read: f64, write: f64) -> Self {
        self.cache_read = Some(read);
        self.cache_write = Some(write);
        self
    }

    /// Price `usage` with this table entry.
    ///
    /// For the `anthropic` family, input tokens already exclude cache
    /// tokens. Elsewhere cached tokens are a subset of the input count and
    /// are billed at the cache rate instead of the input rate.
    pub fn price(&self, provider: &str, usage: &Usage) -> Cost {
        let cached = usage.cached_input_tokens.unwrap_or(0);
        let creation = usage.cache_creation_input_tokens.unwrap_or(0);
        let uncached = if provider == "anthropic" {
            usage.input_tokens
        } else {
            usage.input_tokens.saturating_sub(cached)
        };

        let cache_read_rate = self.cache_read.unwrap_or(self.input);
        let cache_write_rate = self.cache_write.unwrap_or(self.input);

        let input_cost = (uncached as f64 * self.input
            + cached as f64 * cache_read_rate
            + creation as f64 * cache_write_rate)
            / PER_MILLION;
        let output_cost = usage.output_tokens as f64 * self.output / PER_MILLION;

        Cost {
            input_cost_usd: Some(input_cost),
            output_cost_usd: Some(output_cost),
            total_cost_usd: Some(input_cost + output_cost),
        }
    }
}

/// Somewhere to look up the cost of a call.
#[async_trait]
pub trait PricingSource: Send + Sync {
    /// Compute the cost of `usage` for a model.
    ///
    /// `provider` is the normalized family name (`"openai"`, `"anthropic"`).
    async fn lookup(&self, model_id: &str, provider: &str, usage: &Usage) -> Result<Cost, CostError>;
}

/// Built-in price table with longest-prefix model matching.
#[derive(Debug, Clone, Default)]
pub struct StaticPricing {
    entries: Vec<(String, ModelPricing)>,
}

impl StaticPricing {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table preloaded with common models.
    pub fn with_defaults() -> Self {
        let anthropic = |input: f64, output: f64| ModelPricing::new(input, output).with_cache(input * 0.1, input * 1.25);
        let openai = |input: f64, output: f64| ModelPricing::new(input, output).with_cache(input * 0.5, input);

        let mut table = Self::new();
        table.insert("claude-opus-4", anthropic(15.0, 75.0));
        table.insert("claude-sonnet-4", anthropic(3.0, 15.0));
        table.insert("claude-3-7-sonnet", anthropic(3.0, 15.0));
        table.insert("claude-3-5-sonnet", anthropic(3.0, 15.0));
        table.insert("claude-3-5-haiku", anthropic(0.80, 4.0));
        table.insert("claude-3-opus", anthropic(15.0, 75.0));
        table.insert("claude-3-sonnet", anthropic(3.0, 15.0));
        table.insert("claude-3-haiku", anthropic(0.25, 1.25));
        table.insert("gpt-4o", openai(2.5, 10.0));
        table.insert("gpt-4o-mini", openai(0.15, 0.60));
        table.insert("gpt-4.1", openai(2.0, 8.0));
        table.insert("gpt-4.1-mini", openai(0.40, 1.60));
        table.insert("gpt-4-turbo", ModelPricing::new(10.0, 30.0));
        table.insert("gpt-4", ModelPricing::new(30.0, 60.0));
        table.insert("gpt-3.5-turbo", ModelPricing::new(0.5, 1.5));
        table.insert("o1", openai(15.0, 60.0));
        table.insert("o3-mini", openai(1.10, 4.40));
        table
    }

    /// Add or replace the pricing for a model id prefix.
    pub fn insert(&mut self, prefix: impl Into<String>, pricing: ModelPricing) {
        let prefix = prefix.into();
        match self.entries.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = pricing,
            None => self.entries.push((prefix, pricing)),
        }
    }

    /// Find pricing for a model id. A `vendor/` prefix on the id is ignored.
    pub fn find(&self, model_id: &str) -> Option<&ModelPricing> {
        let id = model_id.rsplit('/').next().unwrap_or(model_id).to_ascii_lowercase();
        self.entries
            .iter()
            .filter(|(prefix, _)| id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, pricing)| pricing)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PricingSource for StaticPricing {
    async fn lookup(&self, model_id: &str, provider: &str, usage: &Usage) -> Result<Cost, CostError> {
        self.find(model_id)
            .map(|pricing| pricing.price(provider, usage))
            .ok_or_else(|| CostError::UnknownModel {
                model: model_id.to_string(),
                provider: provider.to_string(),
            })
    }
}

/// Cost lookup that never fails.
#[derive(Clone)]
pub struct CostCalculator {
    source: Arc<dyn PricingSource>,
    timeout: Duration,
}

impl CostCalculator {
    pub fn new(source: Arc<dyn PricingSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Look up the cost, yielding an empty [`Cost`] on any failure or timeout.
    pub async fn cost(&self, model_id: &str, provider: &str, usage: &Usage) -> Cost {
        match tokio::time::timeout(self.timeout, self.source.lookup(model_id, provider, usage)).await {
            Ok(Ok(cost)) => cost,
            Ok(Err(e)) => {
                debug!(model = model_id, error = %e, "Cost lookup failed");
                Cost::default()
            }
            Err(_) => {
                let e = CostError::Timeout(self.timeout.as_millis() as u64);
                debug!(model = model_id, error = %e, "Cost lookup failed");
                Cost::default()
            }
        }
    }
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new(Arc::new(StaticPricing::with_defaults()), DEFAULT_COST_TIMEOUT)
    }
}

impl std::fmt::Debug for CostCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostCalculator")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
