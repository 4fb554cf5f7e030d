// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The tracking decorator.
//!
//! [`Tracker::track`] wraps any [`LanguageModel`] in a [`TrackedModel`] that
//! behaves exactly like the inner model: same results, same errors, same
//! stream items in the same order. Every call additionally produces one
//! [`LlmCall`] record, built and delivered on a detached task so the caller
//! never waits for telemetry.
//!
//! ```rust,ignore
//! let tracker = Tracker::new(TrackerOptions::default().with_api_key("key"));
//! let model = tracker.track(my_model, CallOptions::default());
//! let result = model.do_generate(&params).await?;
//! ```

use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;

use crate::config::{EnvOverrides, ResolvedConfig};
use crate::cost::{CostCalculator, PricingSource, StaticPricing, DEFAULT_COST_TIMEOUT};
use crate::error::CallError;
use crate::model::{CallParams, GenerateResult, LanguageModel, StreamResult};
use crate::normalize::{ContentNormalizer, NormalizerConfig, DEFAULT_MAX_CONTENT_SIZE, DEFAULT_MAX_TEXT_LENGTH};
use crate::recorder::{CallRecorder, Delivery};
use crate::stream::split_stream;
use crate::task::runtime_available;
use crate::telemetry::TraceId;
use crate::transport::{dispatch, CallCallback, HttpTransport, Transport, DEFAULT_API_URL};
use crate::types::{CallType, ErrorInfo, LlmCall};
use crate::usage::normalize_provider;

/// Tracker-wide settings.
#[derive(Clone)]
pub struct TrackerOptions {
    /// Collector endpoint. Falls back to `LLM_TRACKER_API_URL`, then the default.
    pub api_url: Option<String>,
    /// Collector key. Falls back to `LLM_TRACKER_API_KEY`.
    pub api_key: Option<String>,
    /// Replaces the HTTP transport entirely.
    pub transport: Option<Arc<dyn Transport>>,
    pub compute_costs: bool,
    pub privacy_mode: bool,
    pub max_content_size: usize,
    pub max_text_length: usize,
    /// Price source; the built-in table when unset.
    pub pricing: Option<Arc<dyn PricingSource>>,
    pub cost_timeout: Duration,
    pub on_success: Option<CallCallback>,
    pub on_error: Option<CallCallback>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            transport: None,
            compute_costs: true,
            privacy_mode: false,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            pricing: None,
            cost_timeout: DEFAULT_COST_TIMEOUT,
            on_success: None,
            on_error: None,
        }
    }
}

impl TrackerOptions {
    /// Options from a resolved configuration.
    ///
    /// Configured prices are layered over the built-in table.
    pub fn from_config(config: &ResolvedConfig) -> Self {
        let pricing: Option<Arc<dyn PricingSource>> = if config.pricing.is_empty() {
            None
        } else {
            let mut table = StaticPricing::with_defaults();
            for (prefix, price) in &config.pricing {
                table.insert(prefix.clone(), *price);
            }
            Some(Arc::new(table))
        };

        Self {
            api_url: Some(config.api_url.clone()),
            api_key: config.api_key.clone(),
            compute_costs: config.compute_costs,
            privacy_mode: config.privacy_mode,
            max_content_size: config.max_content_size,
            max_text_length: config.max_text_length,
            pricing,
            cost_timeout: config.cost_timeout,
            ..Default::default()
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_pricing(mut self, pricing: Arc<dyn PricingSource>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn with_privacy_mode(mut self, enabled: bool) -> Self {
        self.privacy_mode = enabled;
        self
    }

    pub fn with_compute_costs(mut self, enabled: bool) -> Self {
        self.compute_costs = enabled;
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&LlmCall) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&LlmCall) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for TrackerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerOptions")
            .field("api_url", &self.api_url)
            .field("has_api_key", &self.api_key.is_some())
            .field("compute_costs", &self.compute_costs)
            .field("privacy_mode", &self.privacy_mode)
            .field("max_content_size", &self.max_content_size)
            .field("max_text_length", &self.max_text_length)
            .field("cost_timeout", &self.cost_timeout)
            .finish_non_exhaustive()
    }
}

/// Overrides for one tracked model or one call.
///
/// Unset fields fall through to the next level: per-call options, then the
/// options given to [`Tracker::track`], then the tracker's defaults.
#[derive(Clone, Default)]
pub struct CallOptions {
    pub trace_id: Option<String>,
    pub privacy_mode: Option<bool>,
    pub compute_costs: Option<bool>,
    pub transport: Option<Arc<dyn Transport>>,
    pub on_success: Option<CallCallback>,
    pub on_error: Option<CallCallback>,
}

impl CallOptions {
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_privacy_mode(mut self, enabled: bool) -> Self {
        self.privacy_mode = Some(enabled);
        self
    }

    pub fn with_compute_costs(mut self, enabled: bool) -> Self {
        self.compute_costs = Some(enabled);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn on_success(mut self, callback: impl Fn(&LlmCall) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&LlmCall) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Fill unset fields from `base`.
    fn or(&self, base: &CallOptions) -> CallOptions {
        CallOptions {
            trace_id: self.trace_id.clone().or_else(|| base.trace_id.clone()),
            privacy_mode: self.privacy_mode.or(base.privacy_mode),
            compute_costs: self.compute_costs.or(base.compute_costs),
            transport: self.transport.clone().or_else(|| base.transport.clone()),
            on_success: self.on_success.clone().or_else(|| base.on_success.clone()),
            on_error: self.on_error.clone().or_else(|| base.on_error.clone()),
        }
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("trace_id", &self.trace_id)
            .field("privacy_mode", &self.privacy_mode)
            .field("compute_costs", &self.compute_costs)
            .finish_non_exhaustive()
    }
}

struct TrackerInner {
    transport: Arc<dyn Transport>,
    normalizer: ContentNormalizer,
    costs: CostCalculator,
    compute_costs: bool,
    privacy_mode: bool,
    on_success: Option<CallCallback>,
    on_error: Option<CallCallback>,
}

/// Shared tracking configuration. Cheap to clone.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

impl Tracker {
    /// Create a tracker.
    ///
    /// Without an explicit transport, records are POSTed to the endpoint from
    /// the options, then `LLM_TRACKER_API_URL`, then the local default.
    pub fn new(options: TrackerOptions) -> Self {
        let transport: Arc<dyn Transport> = match options.transport {
            Some(transport) => transport,
            None => {
                let env = EnvOverrides::from_env();
                let url = options
                    .api_url
                    .or(env.api_url)
                    .unwrap_or_else(|| DEFAULT_API_URL.to_string());
                let key = options.api_key.or(env.api_key);
                Arc::new(HttpTransport::new(url, key))
            }
        };

        let pricing: Arc<dyn PricingSource> = match options.pricing {
            Some(pricing) => pricing,
            None => Arc::new(StaticPricing::with_defaults()),
        };

        Self {
            inner: Arc::new(TrackerInner {
                transport,
                normalizer: ContentNormalizer::new(NormalizerConfig {
                    max_text_length: options.max_text_length,
                    max_content_size: options.max_content_size,
                }),
                costs: CostCalculator::new(pricing, options.cost_timeout),
                compute_costs: options.compute_costs,
                privacy_mode: options.privacy_mode,
                on_success: options.on_success,
                on_error: options.on_error,
            }),
        }
    }

    /// Wrap `model` so every call is recorded.
    pub fn track<M: LanguageModel>(&self, model: M, options: CallOptions) -> TrackedModel<M> {
        TrackedModel {
            inner: model,
            tracker: self.clone(),
            options,
        }
    }

    /// Deliver an externally built record (e.g. an embedding call).
    pub fn record(&self, call: LlmCall) {
        self.record_with(call, &CallOptions::default());
    }

    /// Deliver an externally built record with overrides.
    pub fn record_with(&self, call: LlmCall, options: &CallOptions) {
        let delivery = self.delivery(options);
        dispatch(
            call,
            delivery.transport,
            delivery.on_success.as_ref(),
            delivery.on_error.as_ref(),
        );
    }

    fn delivery(&self, options: &CallOptions) -> Delivery {
        Delivery {
            transport: options
                .transport
                .clone()
                .unwrap_or_else(|| Arc::clone(&self.inner.transport)),
            on_success: options.on_success.clone().or_else(|| self.inner.on_success.clone()),
            on_error: options.on_error.clone().or_else(|| self.inner.on_error.clone()),
        }
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("compute_costs", &self.inner.compute_costs)
            .field("privacy_mode", &self.inner.privacy_mode)
            .field("normalizer", self.inner.normalizer.config())
            .finish_non_exhaustive()
    }
}

/// Records the call as aborted if dropped before the call settles.
struct InFlight {
    recorder: Option<CallRecorder>,
}

impl InFlight {
    fn settle(mut self) -> Option<CallRecorder> {
        self.recorder.take()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            recorder.fail(
                ErrorInfo::new("AbortError", "call was cancelled before it completed"),
                None,
            );
        }
    }
}

/// A [`LanguageModel`] whose calls are recorded.
pub struct TrackedModel<M> {
    inner: M,
    tracker: Tracker,
    options: CallOptions,
}

impl<M: LanguageModel> TrackedModel<M> {
    /// The wrapped model.
    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Unwrap into the inner model.
    pub fn into_inner(self) -> M {
        self.inner
    }

    fn start(&self, call_type: CallType, params: &CallParams, call_options: &CallOptions) -> InFlight {
        let options = call_options.or(&self.options);
        let tracker = &self.tracker.inner;
        let privacy_mode = options.privacy_mode.unwrap_or(tracker.privacy_mode);
        let compute_costs = options.compute_costs.unwrap_or(tracker.compute_costs);

        let recorder = CallRecorder {
            trace_id: options
                .trace_id
                .clone()
                .unwrap_or_else(|| TraceId::new().to_string()),
            call_type,
            model_id: self.inner.model_id().to_string(),
            provider: normalize_provider(self.inner.provider()),
            prompt: if privacy_mode { Vec::new() } else { params.prompt.clone() },
            available_tools: params.tool_names(),
            privacy_mode,
            costs: compute_costs.then(|| tracker.costs.clone()),
            normalizer: tracker.normalizer,
            delivery: self.tracker.delivery(&options),
            started: Instant::now(),
        };

        InFlight {
            recorder: Some(recorder),
        }
    }

    /// Generate with per-call overrides.
    pub async fn generate_with(
        &self,
        params: &CallParams,
        options: &CallOptions,
    ) -> Result<GenerateResult, M::Error> {
        if !runtime_available() {
            return self.inner.do_generate(params).await;
        }

        let in_flight = self.start(CallType::Generate, params, options);
        let outcome = AssertUnwindSafe(self.inner.do_generate(params))
            .catch_unwind()
            .await;
        let recorder = in_flight.settle();

        match outcome {
            Ok(Ok(result)) => {
                if let Some(recorder) = recorder {
                    recorder.finish_generate(result.clone());
                }
                Ok(result)
            }
            Ok(Err(error)) => {
                if let Some(recorder) = recorder {
                    recorder.fail(ErrorInfo::from_error(&error), error.http_status());
                }
                Err(error)
            }
            Err(panic) => {
                if let Some(recorder) = recorder {
                    recorder.fail(ErrorInfo::from_panic(&*panic), None);
                }
                resume_unwind(panic)
            }
        }
    }

    /// Stream with per-call overrides.
    pub async fn stream_with(
        &self,
        params: &CallParams,
        options: &CallOptions,
    ) -> Result<StreamResult<M::Error>, M::Error> {
        if !runtime_available() {
            return self.inner.do_stream(params).await;
        }

        let in_flight = self.start(CallType::Stream, params, options);
        let outcome = AssertUnwindSafe(self.inner.do_stream(params))
            .catch_unwind()
            .await;
        let recorder = in_flight.settle();

        match outcome {
            Ok(Ok(StreamResult { stream, response })) => {
                let Some(recorder) = recorder else {
                    return Ok(StreamResult { stream, response });
                };
                let (caller, mirror) = split_stream(stream);
                let response_model = response.as_ref().and_then(|r| r.model_id.clone());
                recorder.finish_stream(mirror, response_model);
                Ok(StreamResult {
                    stream: caller,
                    response,
                })
            }
            Ok(Err(error)) => {
                if let Some(recorder) = recorder {
                    recorder.fail(ErrorInfo::from_error(&error), error.http_status());
                }
                Err(error)
            }
            Err(panic) => {
                if let Some(recorder) = recorder {
                    recorder.fail(ErrorInfo::from_panic(&*panic), None);
                }
                resume_unwind(panic)
            }
        }
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for TrackedModel<M> {
    type Error = M::Error;

    fn provider(&self) -> &str {
        self.inner.provider()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    async fn do_generate(&self, params: &CallParams) -> Result<GenerateResult, Self::Error> {
        self.generate_with(params, &CallOptions::default()).await
    }

    async fn do_stream(&self, params: &CallParams) -> Result<StreamResult<Self::Error>, Self::Error> {
        self.stream_with(params, &CallOptions::default()).await
    }
}

impl<M> std::fmt::Debug for TrackedModel<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedModel")
            .field("tracker", &self.tracker)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
