// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Mapping of provider content into canonical messages.

use std::collections::VecDeque;

use serde_json::{Map, Value};

use super::redact::{is_remote_url, redact, sanitize, sanitize_value, truncate};
use crate::model::PromptMessage;
use crate::types::{Content, Message, MessageContent};

/// A tool call assembled from stream deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    /// Concatenated argument JSON, possibly incomplete.
    pub input: String,
}

/// A citation collected from a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRef {
    pub source_type: String,
    pub id: String,
    pub url: String,
    pub title: String,
}

/// Everything a stream produced, in a form ready to normalize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamOutput {
    pub text: String,
    pub reasoning: String,
    pub tool_calls: Vec<PendingToolCall>,
    pub sources: Vec<SourceRef>,
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn owned_field(obj: &Map<String, Value>, key: &str) -> String {
    str_field(obj, key).unwrap_or_default().to_string()
}

/// Serialize tool arguments the way they are recorded.
pub(crate) fn stringify_input(input: Option<&Value>) -> String {
    match input {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "{}".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Tool arguments with embedded payloads redacted, then truncated.
///
/// JSON arguments are only re-serialized when a leaf actually changed, so
/// clean arguments are recorded byte-for-byte.
pub(crate) fn sanitize_arguments(input: &str, max_chars: usize) -> String {
    match serde_json::from_str::<Value>(input) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            let clean = sanitize_value(&value, max_chars);
            if clean == value {
                truncate(input, max_chars)
            } else {
                truncate(&clean.to_string(), max_chars)
            }
        }
        _ => sanitize(input, max_chars),
    }
}

/// Inline media becomes a marker; remote URLs are kept.
fn media_payload(data: Option<&Value>, media_type: &str) -> String {
    match data {
        Some(Value::String(s)) if is_remote_url(s) => s.clone(),
        Some(Value::String(s)) => redact(s).unwrap_or_else(|| format!("[{media_type} data redacted]")),
        Some(Value::Object(obj)) => match str_field(obj, "url").or_else(|| str_field(obj, "href")) {
            Some(url) if is_remote_url(url) => url.to_string(),
            _ => format!("[{media_type} data redacted]"),
        },
        _ => format!("[{media_type} data redacted]"),
    }
}

/// Map one content part by its `type`.
pub(crate) fn map_part(value: &Value, max_chars: usize) -> MessageContent {
    let obj = match value {
        Value::Object(obj) => obj,
        Value::String(s) => return MessageContent::text(sanitize(s, max_chars)),
        other => return MessageContent::Other(sanitize_value(other, max_chars)),
    };

    match str_field(obj, "type").unwrap_or_default() {
        "text" => MessageContent::Text {
            text: sanitize(str_field(obj, "text").unwrap_or_default(), max_chars),
        },
        "reasoning" => MessageContent::Reasoning {
            text: sanitize(str_field(obj, "text").unwrap_or_default(), max_chars),
        },
        "tool-call" => MessageContent::ToolCall {
            id: owned_field(obj, "toolCallId"),
            name: owned_field(obj, "toolName"),
            arguments: sanitize_arguments(
                &stringify_input(obj.get("input").or_else(|| obj.get("args"))),
                max_chars,
            ),
        },
        "tool-result" => MessageContent::ToolResult {
            tool_call_id: owned_field(obj, "toolCallId"),
            tool_name: owned_field(obj, "toolName"),
            output: obj
                .get("output")
                .or_else(|| obj.get("result"))
                .map(|v| sanitize_value(v, max_chars))
                .unwrap_or(Value::Null),
        },
        "file" => {
            let media_type = str_field(obj, "mediaType")
                .or_else(|| str_field(obj, "mimeType"))
                .unwrap_or("application/octet-stream")
                .to_string();
            MessageContent::File {
                file: media_payload(obj.get("data"), &media_type),
                media_type,
            }
        }
        "image" => {
            let media_type = str_field(obj, "mediaType")
                .or_else(|| str_field(obj, "mimeType"))
                .map(String::from);
            let label = media_type.as_deref().unwrap_or("image");
            MessageContent::Image {
                image: media_payload(obj.get("image").or_else(|| obj.get("data")), label),
                media_type,
            }
        }
        "source" => MessageContent::Source {
            source_type: str_field(obj, "sourceType").unwrap_or("unknown").to_string(),
            id: owned_field(obj, "id"),
            url: owned_field(obj, "url"),
            title: owned_field(obj, "title"),
        },
        _ => MessageContent::Other(sanitize_value(value, max_chars)),
    }
}

/// Map one prompt message.
pub(crate) fn map_prompt_message(message: &PromptMessage, max_chars: usize) -> Message {
    let content = match &message.content {
        Value::String(s) => Content::Text(sanitize(s, max_chars)),
        Value::Array(parts) => Content::from_parts(parts.iter().map(|p| map_part(p, max_chars)).collect()),
        Value::Object(_) => Content::from_parts(vec![map_part(&message.content, max_chars)]),
        Value::Null => Content::Text(String::new()),
        other => Content::Text(other.to_string()),
    };

    Message {
        role: message.role.clone(),
        content,
    }
}

pub(crate) fn map_output(content: &[Value], text: Option<&str>, max_chars: usize) -> Vec<Message> {
    if content.is_empty() {
        return match text {
            Some(t) if !t.is_empty() => vec![Message::new("assistant", sanitize(t, max_chars))],
            _ => Vec::new(),
        };
    }

    let parts = content.iter().map(|p| map_part(p, max_chars)).collect();
    vec![Message::assistant_parts(parts)]
}

pub(crate) fn map_stream_output(output: &StreamOutput, max_chars: usize) -> Vec<Message> {
    let mut parts = Vec::new();

    if !output.reasoning.is_empty() {
        parts.push(MessageContent::Reasoning {
            text: sanitize(&output.reasoning, max_chars),
        });
    }
    if !output.text.is_empty() {
        parts.push(MessageContent::text(sanitize(&output.text, max_chars)));
    }
    for call in &output.tool_calls {
        parts.push(MessageContent::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments: sanitize_arguments(&call.input, max_chars),
        });
    }
    for source in &output.sources {
        parts.push(MessageContent::Source {
            source_type: source.source_type.clone(),
            id: source.id.clone(),
            url: source.url.clone(),
            title: source.title.clone(),
        });
    }

    if parts.is_empty() {
        Vec::new()
    } else {
        vec![Message::assistant_parts(parts)]
    }
}

/// Size of `[m0,m1,...]` in compact JSON, given each message's size.
fn array_size(sizes: &VecDeque<usize>) -> usize {
    2 + sizes.iter().sum::<usize>() + sizes.len().saturating_sub(1)
}

/// Drop messages oldest-first until the serialized array fits `max_bytes`.
///
/// A system message noting how many were removed is prepended when any were.
pub(crate) fn trim_to_size(messages: Vec<Message>, max_bytes: usize) -> Vec<Message> {
    let mut sizes = VecDeque::with_capacity(messages.len());
    for message in &messages {
        match serde_json::to_vec(message) {
            Ok(bytes) => sizes.push_back(bytes.len()),
            Err(e) => {
                return vec![Message::system(format!(
                    "[messages could not be serialized: {e}]"
                ))];
            }
        }
    }

    if array_size(&sizes) <= max_bytes {
        return messages;
    }

    let mut kept: VecDeque<Message> = messages.into();
    let mut removed = 0usize;
    while !kept.is_empty() && array_size(&sizes) > max_bytes {
        kept.pop_front();
        sizes.pop_front();
        removed += 1;
    }

    let mut trimmed = Vec::with_capacity(kept.len() + 1);
    trimmed.push(Message::system(format!(
        "[{removed} earlier message(s) removed to fit size limit]"
    )));
    trimmed.extend(kept);
    trimmed
}
