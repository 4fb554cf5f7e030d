// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Assembly and delivery of call records.
//!
//! A [`CallRecorder`] is created when a tracked call starts and consumed when
//! it settles. It owns everything needed to build the [`LlmCall`], so the
//! record can be finished on a detached task after the caller has moved on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cost::CostCalculator;
use crate::model::{GenerateResult, PromptMessage};
use crate::normalize::ContentNormalizer;
use crate::stream::{accumulate, MirroredPart};
use crate::task::spawn_detached;
#[cfg(feature = "telemetry")]
use crate::telemetry::GLOBAL_METRICS;
use crate::transport::{dispatch, CallCallback, Transport};
use crate::types::{CallType, Cost, ErrorInfo, LlmCall, Message, ToolInfo, Usage};
use crate::usage::{account_usage, content_has_citations, finish_reason, summarize_tools, tool_info};

/// Where and how a finished record is delivered.
#[derive(Clone)]
pub(crate) struct Delivery {
    pub transport: Arc<dyn Transport>,
    pub on_success: Option<CallCallback>,
    pub on_error: Option<CallCallback>,
}

impl Delivery {
    /// Record metrics and hand the record to the transport.
    pub fn deliver(&self, call: LlmCall) {
        debug!(
            trace_id = %call.trace_id,
            call_type = call.call_type.as_str(),
            model = %call.model,
            duration_ms = call.duration_ms,
            error = call.is_error(),
            "Recorded LLM call"
        );

        #[cfg(feature = "telemetry")]
        {
            GLOBAL_METRICS.record_call(
                call.call_type.as_str(),
                Duration::from_millis(call.duration_ms),
                !call.is_error(),
            );
            GLOBAL_METRICS.record_tokens(call.usage.input_tokens, call.usage.output_tokens);
        }

        dispatch(
            call,
            Arc::clone(&self.transport),
            self.on_success.as_ref(),
            self.on_error.as_ref(),
        );
    }
}

/// Per-call state between start and settlement.
pub(crate) struct CallRecorder {
    pub trace_id: String,
    pub call_type: CallType,
    pub model_id: String,
    /// Normalized provider family.
    pub provider: String,
    /// Empty in privacy mode.
    pub prompt: Vec<PromptMessage>,
    pub available_tools: Option<Vec<String>>,
    pub privacy_mode: bool,
    /// `None` when cost computation is disabled.
    pub costs: Option<CostCalculator>,
    pub normalizer: ContentNormalizer,
    pub delivery: Delivery,
    pub started: Instant,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl CallRecorder {
    /// Every content field of a record goes through here.
    fn content(&self, build: impl FnOnce() -> Vec<Message>) -> Vec<Message> {
        if self.privacy_mode {
            Vec::new()
        } else {
            build()
        }
    }

    fn input(&self) -> Vec<Message> {
        self.content(|| self.normalizer.prompt_to_messages(&self.prompt))
    }

    async fn cost(&self, model: &str, usage: &Usage) -> Cost {
        match &self.costs {
            Some(costs) if usage.has_tokens() => costs.cost(model, &self.provider, usage).await,
            _ => Cost::default(),
        }
    }

    /// Build an error record: zero usage, unknown cost, no output.
    pub fn error_record(&self, error: ErrorInfo, http_status: Option<u16>, elapsed: Duration) -> LlmCall {
        LlmCall {
            timestamp: Utc::now(),
            trace_id: self.trace_id.clone(),
            call_type: self.call_type,
            model: self.model_id.clone(),
            provider: self.provider.clone(),
            finish_reason: None,
            input: self.input(),
            output: Vec::new(),
            usage: Usage::default(),
            cost: Cost::default(),
            tools: ToolInfo::available(self.available_tools.clone()),
            error: Some(error),
            duration_ms: millis(elapsed),
            http_status,
        }
    }

    /// Record a failed call in the background.
    pub fn fail(self, error: ErrorInfo, http_status: Option<u16>) {
        let elapsed = self.started.elapsed();
        spawn_detached("record-error", async move {
            let call = self.error_record(error, http_status, elapsed);
            self.delivery.deliver(call);
        });
    }

    /// Build the record for a completed single-response call.
    pub async fn generate_record(&self, result: &GenerateResult, elapsed: Duration) -> LlmCall {
        let model = result
            .response
            .as_ref()
            .and_then(|r| r.model_id.clone())
            .unwrap_or_else(|| self.model_id.clone());

        let usage = account_usage(
            &self.provider,
            &result.usage,
            result.provider_metadata.as_ref(),
            content_has_citations(&result.content),
        );
        let cost = self.cost(&model, &usage).await;

        let output = self.content(|| {
            self.normalizer
                .output_to_messages(&result.content, result.text.as_deref())
        });

        LlmCall {
            timestamp: Utc::now(),
            trace_id: self.trace_id.clone(),
            call_type: self.call_type,
            model,
            provider: self.provider.clone(),
            finish_reason: finish_reason(result.finish_reason.as_ref()),
            input: self.input(),
            output,
            usage,
            cost,
            tools: tool_info(&result.content, self.available_tools.clone()),
            error: None,
            duration_ms: millis(elapsed),
            http_status: Some(200),
        }
    }

    /// Record a completed single-response call in the background.
    pub fn finish_generate(self, result: GenerateResult) {
        let elapsed = self.started.elapsed();
        spawn_detached("record-generate", async move {
            let call = self.generate_record(&result, elapsed).await;
            self.delivery.deliver(call);
        });
    }

    /// Drain the accounting side of a stream and record it when it ends.
    pub fn finish_stream(self, mirror: mpsc::UnboundedReceiver<MirroredPart>, response_model: Option<String>) {
        spawn_detached("record-stream", async move {
            let call = match accumulate(mirror).await {
                Ok(stream) => {
                    let elapsed = self.started.elapsed();
                    let model = stream
                        .response_model
                        .clone()
                        .or(response_model)
                        .unwrap_or_else(|| self.model_id.clone());

                    let usage = account_usage(
                        &self.provider,
                        &stream.usage,
                        stream.provider_metadata.as_ref(),
                        stream.has_citations(),
                    );
                    let cost = self.cost(&model, &usage).await;

                    let output = self.content(|| self.normalizer.stream_to_messages(&stream.output));

                    LlmCall {
                        timestamp: Utc::now(),
                        trace_id: self.trace_id.clone(),
                        call_type: self.call_type,
                        model,
                        provider: self.provider.clone(),
                        finish_reason: finish_reason(stream.finish_reason.as_ref()),
                        input: self.input(),
                        output,
                        usage,
                        cost,
                        tools: summarize_tools(stream.tool_names(), 0, self.available_tools.clone()),
                        error: None,
                        duration_ms: millis(elapsed),
                        http_status: Some(200),
                    }
                }
                Err(failure) => self.error_record(failure.info, failure.http_status, self.started.elapsed()),
            };

            self.delivery.deliver(call);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::model::ResponseInfo;
    use crate::transport::transport_fn;
    use serde_json::json;

    fn recorder(privacy_mode: bool, costs: bool) -> (CallRecorder, mpsc::UnboundedReceiver<LlmCall>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = transport_fn(move |call: LlmCall| {
            let tx = tx.clone();
            async move {
                tx.send(call)
                    .map_err(|e| TransportError::Unavailable(e.to_string()))
            }
        });

        let recorder = CallRecorder {
            trace_id: "trace-1".into(),
            call_type: CallType::Generate,
            model_id: "gpt-4".into(),
            provider: "openai".into(),
            prompt: vec![PromptMessage::user_text("What is 9 + 10?")],
            available_tools: None,
            privacy_mode,
            costs: costs.then(CostCalculator::default),
            normalizer: ContentNormalizer::default(),
            delivery: Delivery {
                transport: Arc::new(transport),
                on_success: None,
                on_error: None,
            },
            started: Instant::now(),
        };
        (recorder, rx)
    }

    fn result() -> GenerateResult {
        GenerateResult {
            text: Some("19".into()),
            content: vec![json!({"type": "text", "text": "19"})],
            usage: json!({"inputTokens": 10, "outputTokens": 2}),
            finish_reason: Some(json!("stop")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_generate_record_fields() {
        let (recorder, _rx) = recorder(false, true);
        let call = recorder.generate_record(&result(), Duration::from_millis(42)).await;

        assert_eq!(call.model, "gpt-4");
        assert_eq!(call.provider, "openai");
        assert_eq!(call.usage.total_tokens, 12);
        assert_eq!(call.usage.web_search_count, Some(0));
        assert_eq!(call.finish_reason.as_deref(), Some("stop"));
        assert_eq!(call.output, vec![Message::new("assistant", "19")]);
        assert_eq!(call.input, vec![Message::new("user", "What is 9 + 10?")]);
        assert_eq!(call.http_status, Some(200));
        assert_eq!(call.duration_ms, 42);
        assert!(call.cost.total_cost_usd.is_some());
    }

    #[tokio::test]
    async fn test_response_model_wins() {
        let (recorder, _rx) = recorder(false, false);
        let mut res = result();
        res.response = Some(ResponseInfo {
            model_id: Some("gpt-4-0613".into()),
            id: None,
        });
        let call = recorder.generate_record(&res, Duration::ZERO).await;
        assert_eq!(call.model, "gpt-4-0613");
        assert!(call.cost.is_unknown());
    }

    #[tokio::test]
    async fn test_privacy_mode_drops_content() {
        let (recorder, _rx) = recorder(true, false);
        let call = recorder.generate_record(&result(), Duration::ZERO).await;
        assert!(call.input.is_empty());
        assert!(call.output.is_empty());
        assert_eq!(call.usage.input_tokens, 10);
    }

    #[test]
    fn test_privacy_mode_error_record_keeps_tools() {
        let (mut recorder, _rx) = recorder(true, false);
        recorder.available_tools = Some(vec!["get_weather".into()]);
        let call = recorder.error_record(ErrorInfo::new("ApiError", "Bad request"), Some(400), Duration::ZERO);
        assert!(call.input.is_empty());
        assert!(call.output.is_empty());
        assert_eq!(call.tools.available_tools, Some(vec!["get_weather".to_string()]));
    }

    #[tokio::test]
    async fn test_zero_usage_skips_cost() {
        let (recorder, _rx) = recorder(false, true);
        let mut res = result();
        res.usage = json!({});
        let call = recorder.generate_record(&res, Duration::ZERO).await;
        assert!(call.cost.is_unknown());
    }

    #[tokio::test]
    async fn test_fail_delivers_error_record() {
        let (recorder, mut rx) = recorder(false, true);
        recorder.fail(ErrorInfo::new("ApiError", "Bad request"), Some(400));

        let call = rx.recv().await.unwrap();
        assert_eq!(call.error.as_ref().map(|e| e.name.as_str()), Some("ApiError"));
        assert_eq!(call.http_status, Some(400));
        assert_eq!(call.usage, Usage::default());
        assert!(call.cost.is_unknown());
        assert!(call.output.is_empty());
        assert_eq!(call.input.len(), 1);
    }
}
