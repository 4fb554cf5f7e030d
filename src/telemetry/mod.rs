// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging, trace ids, and process metrics.
//!
//! - **Logging**: `tracing` macros throughout the crate; [`init_logging`]
//!   installs a fmt subscriber for applications that have none
//! - **Trace ids**: [`TraceId`] generates time-ordered ids for call records
//! - **Metrics**: [`GLOBAL_METRICS`] counts calls, errors, tokens, and
//!   delivery failures when the `telemetry` feature is enabled
//!
//! ```rust,ignore
//! use llm_tracker::telemetry::{init_logging, LoggingConfig, GLOBAL_METRICS};
//!
//! init_logging(&LoggingConfig::default())?;
//! // ... tracked calls ...
//! println!("{}", GLOBAL_METRICS.snapshot().format_report());
//! ```

mod correlation;
mod init;
pub mod metrics;

pub use correlation::TraceId;
pub use init::{init_logging, LoggingConfig};
pub use metrics::{CallMetrics, Histogram, MetricsSnapshot, TrackerMetrics, GLOBAL_METRICS};
