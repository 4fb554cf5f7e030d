// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Delivery of call records.
//!
//! Delivery is fire-and-forget: [`dispatch`] spawns the send and returns
//! immediately. Failures are logged and counted, never retried and never
//! surfaced to the wrapped call.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::task::spawn_detached;
#[cfg(feature = "telemetry")]
use crate::telemetry::GLOBAL_METRICS;
use crate::types::LlmCall;

/// Default collector endpoint.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8787/llm";

/// Default request timeout for [`HttpTransport`].
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Callback invoked with a finished record.
pub type CallCallback = Arc<dyn Fn(&LlmCall) + Send + Sync>;

/// Somewhere to send call records.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: LlmCall) -> Result<(), TransportError>;
}

/// POSTs records as JSON to a collector.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    /// Create a transport for `url`, optionally authenticated with a bearer key.
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_timeout(url, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url: url.into(),
            api_key,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, call: LlmCall) -> Result<(), TransportError> {
        let mut req = self
            .client
            .post(&self.url)
            .header("content-type", "application/json");

        if let Some(ref api_key) = self.api_key {
            req = req.header("authorization", format!("Bearer {}", api_key));
        }

        let body = serde_json::to_vec(&call)?;
        let response = req.body(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(trace_id = %call.trace_id, status = status.as_u16(), "Delivered LLM call record");
        Ok(())
    }
}

/// A transport backed by an async function.
pub struct FnTransport<F>(F);

/// Wrap an async function as a [`Transport`].
///
/// ```rust,ignore
/// let transport = transport_fn(|call: LlmCall| async move {
///     println!("{}", call.trace_id);
///     Ok(())
/// });
/// ```
pub fn transport_fn<F, Fut>(f: F) -> FnTransport<F>
where
    F: Fn(LlmCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TransportError>> + Send,
{
    FnTransport(f)
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(LlmCall) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TransportError>> + Send,
{
    async fn send(&self, call: LlmCall) -> Result<(), TransportError> {
        (self.0)(call).await
    }
}

fn run_callback(callback: &CallCallback, call: &LlmCall) {
    if catch_unwind(AssertUnwindSafe(|| callback(call))).is_err() {
        warn!(trace_id = %call.trace_id, "Call record callback panicked");
    }
}

/// Send `call` in the background, then run the matching callback.
///
/// `on_error` runs for records carrying an error, `on_success` otherwise.
/// Callbacks run right after the send is spawned, without waiting for it.
pub fn dispatch(
    call: LlmCall,
    transport: Arc<dyn Transport>,
    on_success: Option<&CallCallback>,
    on_error: Option<&CallCallback>,
) {
    let record = call.clone();
    spawn_detached("transport", async move {
        let trace_id = record.trace_id.clone();
        if let Err(e) = transport.send(record).await {
            warn!(
                target: "llm_tracker::transport",
                trace_id = %trace_id,
                error = %e,
                "Failed to deliver LLM call record"
            );
            #[cfg(feature = "telemetry")]
            GLOBAL_METRICS.record_transport_failure();
        }
    });

    let callback = if call.is_error() { on_error } else { on_success };
    if let Some(callback) = callback {
        run_callback(callback, &call);
    }
}
