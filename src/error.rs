// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for the LLM call tracker.
//!
//! Instrumentation never surfaces its own failures to the caller of a wrapped
//! model. The errors here describe what can go wrong inside the telemetry path
//! (transport, pricing, configuration) plus [`ModelError`], a ready-made error
//! type for [`LanguageModel`](crate::model::LanguageModel) implementations.

use thiserror::Error;

/// Behavior the tracker needs from a wrapped model's error type.
///
/// Both methods have defaults, so most error types only need an empty impl:
///
/// ```rust,ignore
/// impl CallError for MyClientError {}
/// ```
pub trait CallError: std::error::Error + Send + Sync + 'static {
    /// Short error name recorded in [`ErrorInfo::name`](crate::types::ErrorInfo).
    ///
    /// Defaults to the unqualified type name.
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    /// HTTP status of the failed upstream request, if known.
    fn http_status(&self) -> Option<u16> {
        None
    }
}

/// Strip module paths and generic arguments from a type name.
pub(crate) fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Errors produced by language model clients.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("API error: {message}")]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Response parsing error: {0}")]
    ParseError(String),

    #[error("Streaming error: {0}")]
    StreamError(String),

    #[error("Request aborted: {0}")]
    Aborted(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl ModelError {
    /// Create an API error with status code.
    pub fn api(message: impl Into<String>, status_code: u16) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create an API error without status code.
    pub fn api_message(message: impl Into<String>) -> Self {
        Self::ApiError {
            message: message.into(),
            status_code: None,
        }
    }
}

impl CallError for ModelError {
    fn name(&self) -> String {
        match self {
            Self::AuthError(_) => "AuthError",
            Self::ApiError { .. } => "ApiError",
            Self::RateLimited(_) => "RateLimitError",
            Self::ModelNotFound(_) => "ModelNotFoundError",
            Self::NetworkError(_) => "NetworkError",
            Self::ParseError(_) => "ParseError",
            Self::StreamError(_) => "StreamError",
            Self::Aborted(_) => "AbortError",
            Self::Timeout(_) => "TimeoutError",
        }
        .to_string()
    }

    fn http_status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status_code, .. } => *status_code,
            Self::AuthError(_) => Some(401),
            Self::ModelNotFound(_) => Some(404),
            Self::RateLimited(_) => Some(429),
            _ => None,
        }
    }
}

/// Errors raised while delivering a call record.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Collector responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to serialize call record: {0}")]
    Serialize(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

/// Errors raised by a pricing lookup.
///
/// These never leave the cost calculator; they only show up in debug logs.
#[derive(Error, Debug)]
pub enum CostError {
    #[error("No pricing for model {model} ({provider})")]
    UnknownModel { model: String, provider: String },

    #[error("Pricing lookup failed: {0}")]
    Lookup(String),

    #[error("Pricing lookup timed out after {0}ms")]
    Timeout(u64),
}

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading config: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::IoError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}
