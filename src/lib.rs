// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! llm-tracker - call instrumentation for language model clients.
//!
//! Wraps any [`LanguageModel`] so that every single-response and streaming
//! call is recorded (usage, cost, tool calls, errors, latency) and shipped
//! to a collector, without changing what the caller sees.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`model`] - The `LanguageModel` contract and its request/response shapes
//! - [`tracker`] - `Tracker` and the `TrackedModel` decorator
//! - [`stream`] - Stream splitting and delta accumulation
//! - [`usage`] - Token usage extraction across provider schemas
//! - [`normalize`] - Content normalization, truncation and redaction
//! - [`cost`] - Pricing sources and the cost calculator
//! - [`transport`] - Record delivery (HTTP by default)
//! - [`types`] - The `LlmCall` record and its parts
//! - [`config`] - Configuration loading and merging
//! - [`telemetry`] - Logging setup, trace ids, and metrics
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use llm_tracker::{CallOptions, LanguageModel, Tracker, TrackerOptions};
//!
//! let tracker = Tracker::new(TrackerOptions::default());
//! let model = tracker.track(client, CallOptions::default());
//!
//! // Same result as calling `client` directly; a record is sent in the background.
//! let result = model.do_generate(&params).await?;
//! ```

pub mod config;
pub mod cost;
pub mod error;
pub mod model;
pub mod normalize;
mod recorder;
pub mod stream;
mod task;
pub mod telemetry;
pub mod tracker;
pub mod transport;
pub mod types;
pub mod usage;

// Re-export commonly used types at crate root
pub use cost::{CostCalculator, ModelPricing, PricingSource, StaticPricing};
pub use error::{CallError, ConfigError, CostError, ModelError, TransportError};
pub use model::{
    CallParams, GenerateResult, LanguageModel, PartStream, PromptMessage, ResponseInfo, StreamPart,
    StreamResult, ToolSpec,
};
pub use tracker::{CallOptions, TrackedModel, Tracker, TrackerOptions};
pub use transport::{transport_fn, CallCallback, HttpTransport, Transport};
pub use types::{
    CallType, Content, Cost, ErrorInfo, LlmCall, Message, MessageContent, ToolInfo, Usage,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
