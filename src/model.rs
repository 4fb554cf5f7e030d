// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The language model contract that tracked models wrap.
//!
//! Request and response payloads are deliberately loose: prompt content,
//! usage, and provider metadata stay as [`serde_json::Value`] because every
//! provider shapes them differently, and the tracker must tolerate malformed
//! data rather than reject it.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::CallError;

// ============================================================================
// Request Types
// ============================================================================

/// A prompt message as sent to the provider.
///
/// `content` is either a string or an array of typed parts
/// (`{"type": "text", "text": ...}`, `{"type": "file", ...}` and so on).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: serde_json::Value,
}

impl PromptMessage {
    /// Create a prompt message with arbitrary content.
    pub fn new(role: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            role: role.into(),
            content,
        }
    }

    /// Create a user message holding a single text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(
            "user",
            serde_json::json!([{ "type": "text", "text": text.into() }]),
        )
    }

    /// Create a system message with plain string content.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new("system", serde_json::Value::String(text.into()))
    }
}

/// A tool declared as available to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,
}

impl ToolSpec {
    /// Create a tool spec with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: None,
        }
    }
}

/// Parameters for a single model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallParams {
    pub prompt: Vec<PromptMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
    /// Provider-specific settings (temperature, max tokens, ...), untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CallParams {
    /// Create call parameters from a prompt.
    pub fn new(prompt: Vec<PromptMessage>) -> Self {
        Self {
            prompt,
            ..Default::default()
        }
    }

    /// Declare available tools.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Names of the declared tools, if any were declared.
    pub fn tool_names(&self) -> Option<Vec<String>> {
        self.tools
            .as_ref()
            .map(|tools| tools.iter().map(|t| t.name.clone()).collect())
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// Response metadata returned by the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Result of a non-streaming call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Typed content parts (`text`, `reasoning`, `tool-call`, `source`, ...).
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
    /// Raw usage in whatever shape the provider reports.
    #[serde(default)]
    pub usage: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_metadata: Option<serde_json::Value>,
    /// A string, or an object carrying `unified` / `type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<serde_json::Value>,
    #[serde(default)]
    pub warnings: Vec<serde_json::Value>,
}

/// One event from a streaming call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    TextDelta {
        id: String,
        delta: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ToolInputStart {
        id: String,
        tool_name: String,
    },
    ToolInputDelta {
        id: String,
        delta: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        /// A JSON string or any JSON value.
        input: serde_json::Value,
    },
    Source {
        source_type: Option<String>,
        id: Option<String>,
        url: Option<String>,
        title: Option<String>,
    },
    Finish {
        usage: serde_json::Value,
        finish_reason: Option<serde_json::Value>,
        provider_metadata: Option<serde_json::Value>,
    },
    /// Any other event (`stream-start`, `text-start`, `response-metadata`, ...).
    Other(serde_json::Value),
}

impl StreamPart {
    /// Shorthand for a text delta.
    pub fn text_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    /// Shorthand for a finish event with the given usage.
    pub fn finish(usage: serde_json::Value, finish_reason: impl Into<String>) -> Self {
        Self::Finish {
            usage,
            finish_reason: Some(serde_json::Value::String(finish_reason.into())),
            provider_metadata: None,
        }
    }
}

/// A boxed stream of parts as returned by a model.
pub type PartStream<E> = Pin<Box<dyn Stream<Item = Result<StreamPart, E>> + Send>>;

/// Result of a streaming call.
pub struct StreamResult<E> {
    pub stream: PartStream<E>,
    pub response: Option<ResponseInfo>,
}

impl<E> StreamResult<E> {
    /// Wrap a stream with no response metadata.
    pub fn new(stream: PartStream<E>) -> Self {
        Self {
            stream,
            response: None,
        }
    }
}

impl<E> std::fmt::Debug for StreamResult<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResult")
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Model Trait
// ============================================================================

/// A language model client with single-response and streaming entry points.
///
/// [`TrackedModel`](crate::tracker::TrackedModel) implements this trait by
/// delegating to an inner model, so tracked and untracked models are
/// interchangeable.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Error returned by the client. Surfaced to callers unchanged.
    type Error: CallError;

    /// Provider identifier, e.g. `"openai.chat"` or `"anthropic"`.
    fn provider(&self) -> &str;

    /// Model identifier, e.g. `"gpt-4o"`.
    fn model_id(&self) -> &str;

    /// Run a call and wait for the complete response.
    async fn do_generate(&self, params: &CallParams) -> Result<GenerateResult, Self::Error>;

    /// Start a streaming call.
    async fn do_stream(&self, params: &CallParams) -> Result<StreamResult<Self::Error>, Self::Error>;
}
