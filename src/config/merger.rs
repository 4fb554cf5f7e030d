// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Handles merging configurations from different sources with proper precedence.

use std::time::Duration;

use super::types::{ResolvedConfig, TrackerConfig};

/// Environment variable holding the collector endpoint.
pub const ENV_API_URL: &str = "LLM_TRACKER_API_URL";

/// Environment variable holding the collector key.
pub const ENV_API_KEY: &str = "LLM_TRACKER_API_KEY";

/// Options passed in code. These override every other source.
#[derive(Debug, Clone, Default)]
pub struct ExplicitOptions {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub compute_costs: Option<bool>,
    pub privacy_mode: Option<bool>,
}

/// Values read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

impl EnvOverrides {
    /// Read [`ENV_API_URL`] and [`ENV_API_KEY`]. Empty values count as unset.
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_url: read(ENV_API_URL),
            api_key: read(ENV_API_KEY),
        }
    }
}

/// Default configuration values.
pub fn default_config() -> ResolvedConfig {
    ResolvedConfig::default()
}

/// Merge multiple configurations with precedence.
///
/// Precedence (highest to lowest):
/// 1. Explicit options
/// 2. Environment variables
/// 3. Workspace config (.llm-tracker.json)
/// 4. Global config (~/.llm-tracker/config.json)
/// 5. Default values
pub fn merge_config(
    global: Option<TrackerConfig>,
    workspace: Option<TrackerConfig>,
    env: EnvOverrides,
    explicit: ExplicitOptions,
) -> ResolvedConfig {
    let mut result = default_config();

    if let Some(config) = global {
        apply_tracker_config(&mut result, config);
    }

    if let Some(config) = workspace {
        apply_tracker_config(&mut result, config);
    }

    if let Some(url) = env.api_url {
        result.api_url = url;
    }
    if env.api_key.is_some() {
        result.api_key = env.api_key;
    }

    apply_explicit_options(&mut result, explicit);

    result
}

fn apply_tracker_config(result: &mut ResolvedConfig, config: TrackerConfig) {
    if let Some(url) = config.api_url {
        result.api_url = url;
    }

    if config.api_key.is_some() {
        result.api_key = config.api_key;
    }

    if let Some(compute_costs) = config.compute_costs {
        result.compute_costs = compute_costs;
    }

    if let Some(privacy_mode) = config.privacy_mode {
        result.privacy_mode = privacy_mode;
    }

    if let Some(size) = config.max_content_size {
        result.max_content_size = size;
    }

    if let Some(length) = config.max_text_length {
        result.max_text_length = length;
    }

    if let Some(ms) = config.cost_timeout_ms {
        result.cost_timeout = Duration::from_millis(ms);
    }

    // Pricing entries accumulate; later sources replace matching prefixes.
    result.pricing.extend(config.pricing);
}

fn apply_explicit_options(result: &mut ResolvedConfig, explicit: ExplicitOptions) {
    if let Some(url) = explicit.api_url {
        result.api_url = url;
    }

    if explicit.api_key.is_some() {
        result.api_key = explicit.api_key;
    }

    if let Some(compute_costs) = explicit.compute_costs {
        result.compute_costs = compute_costs;
    }

    if let Some(privacy_mode) = explicit.privacy_mode {
        result.privacy_mode = privacy_mode;
    }
}
