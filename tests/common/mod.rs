// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Shared fixtures: a scripted model and a transport that captures records.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;

use llm_tracker::{
    transport_fn, CallParams, GenerateResult, LanguageModel, LlmCall, ModelError, PromptMessage,
    StreamPart, StreamResult, Tracker, TrackerOptions, Transport, TransportError,
};

/// What a [`MockModel`] does when called.
#[derive(Clone)]
pub enum Script {
    Generate(GenerateResult),
    Stream(Vec<Result<StreamPart, ModelError>>),
    /// Yields the parts, then panics mid-stream.
    StreamThenPanic(Vec<Result<StreamPart, ModelError>>, &'static str),
    Fail(ModelError),
    Panic(&'static str),
    Hang,
}

pub struct MockModel {
    provider: String,
    model_id: String,
    script: Script,
}

impl MockModel {
    pub fn new(provider: &str, model_id: &str, script: Script) -> Self {
        Self {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            script,
        }
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    type Error = ModelError;

    fn provider(&self) -> &str {
        &self.provider
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn do_generate(&self, _params: &CallParams) -> Result<GenerateResult, ModelError> {
        match self.script.clone() {
            Script::Generate(result) => Ok(result),
            Script::Fail(error) => Err(error),
            Script::Panic(message) => panic!("{}", message),
            Script::Hang => std::future::pending().await,
            Script::Stream(_) | Script::StreamThenPanic(..) => {
                Err(ModelError::api_message("scripted for streaming"))
            }
        }
    }

    async fn do_stream(&self, _params: &CallParams) -> Result<StreamResult<ModelError>, ModelError> {
        match self.script.clone() {
            Script::Stream(items) => Ok(StreamResult::new(Box::pin(futures::stream::iter(items)))),
            Script::StreamThenPanic(items, message) => {
                let stream = futures::stream::iter(items).chain(futures::stream::once(explode(message)));
                Ok(StreamResult::new(Box::pin(stream)))
            }
            Script::Fail(error) => Err(error),
            Script::Panic(message) => panic!("{}", message),
            Script::Hang => std::future::pending().await,
            Script::Generate(_) => Err(ModelError::api_message("scripted for generate")),
        }
    }
}

async fn explode(message: &'static str) -> Result<StreamPart, ModelError> {
    panic!("{}", message)
}

/// A transport that forwards every record into a channel.
pub fn channel_transport() -> (Arc<dyn Transport>, mpsc::UnboundedReceiver<LlmCall>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = transport_fn(move |call: LlmCall| {
        let tx = tx.clone();
        async move {
            tx.send(call)
                .map_err(|e| TransportError::Unavailable(e.to_string()))
        }
    });
    (Arc::new(transport), rx)
}

/// A transport that always fails.
pub fn failing_transport() -> Arc<dyn Transport> {
    Arc::new(transport_fn(|_: LlmCall| async {
        Err::<(), _>(TransportError::Unavailable("collector down".to_string()))
    }))
}

/// A tracker delivering into a channel.
pub fn capturing_tracker() -> (Tracker, mpsc::UnboundedReceiver<LlmCall>) {
    let (transport, rx) = channel_transport();
    (Tracker::new(TrackerOptions::default().with_transport(transport)), rx)
}

/// Wait for the next record, failing the test after two seconds.
pub async fn next_record(rx: &mut mpsc::UnboundedReceiver<LlmCall>) -> LlmCall {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a call record")
        .expect("transport channel closed")
}

pub fn question() -> CallParams {
    CallParams::new(vec![PromptMessage::user_text("What is 9 + 10?")])
}

/// The canonical `gpt-4` answer: 10 input tokens, 2 output tokens.
pub fn answer() -> GenerateResult {
    GenerateResult {
        text: Some("19".to_string()),
        content: vec![json!({"type": "text", "text": "19"})],
        usage: json!({"inputTokens": 10, "outputTokens": 2}),
        finish_reason: Some(json!("stop")),
        ..Default::default()
    }
}

pub fn hello_world_parts() -> Vec<Result<StreamPart, ModelError>> {
    vec![
        Ok(StreamPart::Other(json!({"type": "stream-start", "warnings": []}))),
        Ok(StreamPart::text_delta("t1", "Hello")),
        Ok(StreamPart::text_delta("t1", " world")),
        Ok(StreamPart::finish(json!({"inputTokens": 5, "outputTokens": 2}), "stop")),
    ]
}
