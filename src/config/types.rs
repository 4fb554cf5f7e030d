// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the on-disk tracker configuration (JSON or YAML) and the fully
//! resolved configuration a [`Tracker`](crate::tracker::Tracker) is built from.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cost::{ModelPricing, DEFAULT_COST_TIMEOUT};
use crate::error::ConfigError;
use crate::normalize::{DEFAULT_MAX_CONTENT_SIZE, DEFAULT_MAX_TEXT_LENGTH};
use crate::transport::DEFAULT_API_URL;

/// Tracker configuration as written in `.llm-tracker.json`.
///
/// Every field is optional; unset fields fall through to lower-precedence
/// sources and finally to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Collector endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Bearer key sent to the collector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_costs: Option<bool>,

    /// Record metadata only, never prompt or response content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_mode: Option<bool>,

    /// Byte budget for the serialized prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_content_size: Option<usize>,

    /// Character limit per text field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_text_length: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_timeout_ms: Option<u64>,

    /// Extra or overriding prices, keyed by model id prefix
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub pricing: HashMap<String, ModelPricing>,
}

/// Fully resolved configuration with all defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub compute_costs: bool,
    pub privacy_mode: bool,
    pub max_content_size: usize,
    pub max_text_length: usize,
    pub cost_timeout: Duration,
    pub pricing: HashMap<String, ModelPricing>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            compute_costs: true,
            privacy_mode: false,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            cost_timeout: DEFAULT_COST_TIMEOUT,
            pricing: HashMap::new(),
        }
    }
}

impl ResolvedConfig {
    /// Reject values the tracker cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "apiUrl".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.max_content_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxContentSize".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.max_text_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "maxTextLength".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        for (model, price) in &self.pricing {
            if price.input < 0.0 || price.output < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("pricing.{model}"),
                    message: "prices must not be negative".to_string(),
                });
            }
        }
        Ok(())
    }
}
