// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core record types for tracked LLM calls.
//!
//! An [`LlmCall`] is the unit shipped to the collector: one record per logical
//! call, built once after the call settles and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CallError;

// ============================================================================
// Message Types
// ============================================================================

/// A single canonical content item within a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Reasoning {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        /// Serialized (and truncated) tool arguments.
        arguments: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        output: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    File {
        /// URL, or a redaction marker for inline data.
        file: String,
        media_type: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        image: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Source {
        source_type: String,
        id: String,
        url: String,
        title: String,
    },
    /// Unrecognized content, preserved as-is.
    #[serde(untagged)]
    Other(serde_json::Value),
}

impl MessageContent {
    /// Create a text content item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Get the text if this is a text item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Message content: a plain string or a list of structured items.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<MessageContent>),
}

impl Content {
    /// Build content from parts, collapsing a lone text item to a string.
    pub fn from_parts(mut parts: Vec<MessageContent>) -> Self {
        if parts.len() == 1 && parts[0].as_text().is_some() {
            if let Some(MessageContent::Text { text }) = parts.pop() {
                return Self::Text(text);
            }
        }
        Self::Parts(parts)
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

/// A canonical message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: String,
    pub content: Content,
}

impl Message {
    /// Create a message with the given role and content.
    pub fn new(role: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a system message with text content.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content.into())
    }

    /// Create an assistant message from parts, collapsing a lone text item.
    pub fn assistant_parts(parts: Vec<MessageContent>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Content::from_parts(parts),
        }
    }

    /// Get text content if this message has simple text content.
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(s) => Some(s),
            Content::Parts(_) => None,
        }
    }

    /// Get content items if this message has structured content.
    pub fn as_parts(&self) -> Option<&[MessageContent]> {
        match &self.content {
            Content::Text(_) => None,
            Content::Parts(parts) => Some(parts),
        }
    }
}

// ============================================================================
// Usage, Cost, Tools
// ============================================================================

/// Canonical token usage for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_search_count: Option<u64>,
}

impl Usage {
    /// Whether any billable tokens were reported.
    pub fn has_tokens(&self) -> bool {
        self.input_tokens > 0 || self.output_tokens > 0
    }
}

/// Estimated cost in USD. Absent fields mean unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cost {
    #[serde(rename = "inputCostUSD", skip_serializing_if = "Option::is_none")]
    pub input_cost_usd: Option<f64>,
    #[serde(rename = "outputCostUSD", skip_serializing_if = "Option::is_none")]
    pub output_cost_usd: Option<f64>,
    #[serde(rename = "totalCostUSD", skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
}

impl Cost {
    /// Whether nothing is known about the cost.
    pub fn is_unknown(&self) -> bool {
        self.input_cost_usd.is_none() && self.output_cost_usd.is_none() && self.total_cost_usd.is_none()
    }
}

/// Tool usage summary for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub call_count: usize,
    pub result_count: usize,
    /// Distinct tool names, in first-seen order.
    pub called_tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_tools: Option<Vec<String>>,
}

impl ToolInfo {
    /// Tool info with no calls, only the declared tools.
    pub fn available(available_tools: Option<Vec<String>>) -> Self {
        Self {
            available_tools,
            ..Default::default()
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Serializable description of a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    /// The error's `source()` chain, one cause per line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    /// Name used when the failure is not a typed error.
    pub const UNKNOWN: &'static str = "UnknownError";

    /// Describe a typed call error.
    pub fn from_error<E: CallError + ?Sized>(error: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            name: error.name(),
            message: error.to_string(),
            stack: if causes.is_empty() {
                None
            } else {
                Some(causes.join("\n"))
            },
        }
    }

    /// Describe a panic payload caught from the wrapped call.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };

        Self {
            name: Self::UNKNOWN.to_string(),
            message,
            stack: None,
        }
    }

    /// Create an error description from a name and message.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }
}

// ============================================================================
// Call Record
// ============================================================================

/// Kind of tracked call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Generate,
    Stream,
    Embedding,
}

impl CallType {
    /// Lowercase name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Stream => "stream",
            Self::Embedding => "embedding",
        }
    }
}

/// One record per logical LLM call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmCall {
    pub timestamp: DateTime<Utc>,
    pub trace_id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub model: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    pub input: Vec<Message>,
    pub output: Vec<Message>,
    pub usage: Usage,
    pub cost: Cost,
    pub tools: ToolInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl LlmCall {
    /// Whether this record describes a failed call.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_collapses_single_text() {
        let content = Content::from_parts(vec![MessageContent::text("19")]);
        assert_eq!(content, Content::Text("19".to_string()));
    }

    #[test]
    fn test_content_keeps_mixed_parts() {
        let parts = vec![
            MessageContent::text("Checking"),
            MessageContent::ToolCall {
                id: "tc-1".into(),
                name: "get_weather".into(),
                arguments: "{}".into(),
            },
        ];
        let content = Content::from_parts(parts);
        assert!(matches!(content, Content::Parts(ref p) if p.len() == 2));
    }

    #[test]
    fn test_content_keeps_single_non_text() {
        let content = Content::from_parts(vec![MessageContent::Reasoning { text: "hmm".into() }]);
        assert!(matches!(content, Content::Parts(_)));
    }

    #[test]
    fn test_message_content_serialization() {
        let part = MessageContent::ToolResult {
            tool_call_id: "tc-1".into(),
            tool_name: "bash".into(),
            output: serde_json::json!({"ok": true}),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["type"], "tool-result");
        assert_eq!(json["toolCallId"], "tc-1");

        let other = MessageContent::Other(serde_json::json!({"type": "custom", "x": 1}));
        let json = serde_json::to_value(&other).unwrap();
        assert_eq!(json, serde_json::json!({"type": "custom", "x": 1}));
    }

    #[test]
    fn test_cost_serializes_only_known_fields() {
        let cost = Cost {
            input_cost_usd: Some(0.5),
            ..Default::default()
        };
        let json = serde_json::to_value(&cost).unwrap();
        assert_eq!(json, serde_json::json!({"inputCostUSD": 0.5}));
        assert!(Cost::default().is_unknown());
    }

    #[test]
    fn test_error_info_from_panic() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        let info = ErrorInfo::from_panic(payload.as_ref());
        assert_eq!(info.name, "UnknownError");
        assert_eq!(info.message, "boom");
    }

    #[test]
    fn test_call_serialization_keys() {
        let call = LlmCall {
            timestamp: Utc::now(),
            trace_id: "t-1".into(),
            call_type: CallType::Generate,
            model: "gpt-4".into(),
            provider: "openai".into(),
            finish_reason: None,
            input: vec![Message::new("user", "hi")],
            output: vec![],
            usage: Usage::default(),
            cost: Cost::default(),
            tools: ToolInfo::default(),
            error: None,
            duration_ms: 12,
            http_status: Some(200),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["type"], "generate");
        assert_eq!(json["traceId"], "t-1");
        assert_eq!(json["durationMs"], 12);
        assert_eq!(json["httpStatus"], 200);
        assert!(json.get("error").is_none());
        assert!(json.get("finishReason").is_none());
    }
}
