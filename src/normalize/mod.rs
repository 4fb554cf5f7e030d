// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Content normalization for captured prompts and responses.
//!
//! Provider message shapes are mapped into canonical [`Message`] lists:
//!
//! - text is truncated to [`NormalizerConfig::max_text_length`] characters
//! - inline binary payloads (data URLs, long base64) are redacted
//! - prompts are trimmed oldest-first to fit [`NormalizerConfig::max_content_size`]
//!
//! Normalization never fails; anything that cannot be represented becomes a
//! placeholder message.
//!
//! [`Message`]: crate::types::Message

pub(crate) mod messages;
pub mod redact;

pub use messages::{PendingToolCall, SourceRef, StreamOutput};
pub use redact::{DEFAULT_MAX_TEXT_LENGTH, TRUNCATION_SUFFIX};

use crate::model::PromptMessage;
use crate::types::Message;

/// Default byte budget for a serialized prompt (1 MiB).
pub const DEFAULT_MAX_CONTENT_SIZE: usize = 1_048_576;

/// Limits applied while normalizing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Maximum characters kept per text field.
    pub max_text_length: usize,
    /// Maximum serialized size of the prompt, in bytes.
    pub max_content_size: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_content_size: DEFAULT_MAX_CONTENT_SIZE,
        }
    }
}

/// Maps provider content into canonical messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentNormalizer {
    config: NormalizerConfig,
}

impl ContentNormalizer {
    /// Create a normalizer with the given limits.
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Get the active limits.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize a prompt, trimming the oldest messages to fit the byte budget.
    pub fn prompt_to_messages(&self, prompt: &[PromptMessage]) -> Vec<Message> {
        let messages = prompt
            .iter()
            .map(|m| messages::map_prompt_message(m, self.config.max_text_length))
            .collect();
        messages::trim_to_size(messages, self.config.max_content_size)
    }

    /// Normalize the content parts of a single-response result.
    ///
    /// Falls back to `text` when the result has no content parts.
    pub fn output_to_messages(&self, content: &[serde_json::Value], text: Option<&str>) -> Vec<Message> {
        messages::map_output(content, text, self.config.max_text_length)
    }

    /// Build the output message for an accumulated stream.
    pub fn stream_to_messages(&self, output: &StreamOutput) -> Vec<Message> {
        messages::map_stream_output(output, self.config.max_text_length)
    }
}
