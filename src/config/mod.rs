// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for the tracker.
//!
//! Handles loading, merging, and validation of configuration from multiple sources:
//! - Global config: ~/.llm-tracker/config.json
//! - Workspace config: .llm-tracker.json, .llm-tracker/config.json, or llm-tracker.config.json
//! - Environment: `LLM_TRACKER_API_URL`, `LLM_TRACKER_API_KEY`
//! - Explicit options passed in code
//!
//! Configuration is merged with precedence (explicit > env > workspace > global > defaults).

mod loader;
mod merger;
mod types;

pub use loader::{
    find_workspace_root, get_global_config_dir, get_global_config_path, load_config_file,
    load_global_config, load_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};

pub use merger::{default_config, merge_config, EnvOverrides, ExplicitOptions, ENV_API_KEY, ENV_API_URL};

pub use types::{ResolvedConfig, TrackerConfig};

use crate::error::ConfigError;
use std::path::Path;

/// Load, merge, and validate all configuration sources for a project root.
pub fn load_config(root: &Path, explicit: ExplicitOptions) -> Result<ResolvedConfig, ConfigError> {
    let global = load_global_config()?;
    let workspace = load_workspace_config(root)?;

    let config = merge_config(global, workspace, EnvOverrides::from_env(), explicit);
    config.validate()?;
    Ok(config)
}
