// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Stream splitting and accumulation.
//!
//! A provider stream is pumped by a background task into two independent
//! channels. The caller reads the original items from one; the accounting
//! side reads mirrored items from the other and folds them into a
//! [`StreamAccumulator`]. Neither side can stall or consume the other's copy.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{resume_unwind, AssertUnwindSafe};

use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::error::CallError;
use crate::model::{PartStream, StreamPart};
use crate::normalize::messages::stringify_input;
use crate::normalize::{PendingToolCall, SourceRef, StreamOutput};
use crate::types::ErrorInfo;

/// A stream error as seen by the accounting side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredError {
    pub info: ErrorInfo,
    pub http_status: Option<u16>,
}

impl MirroredError {
    fn from_error<E: CallError>(error: &E) -> Self {
        Self {
            info: ErrorInfo::from_error(error),
            http_status: error.http_status(),
        }
    }
}

/// An item as seen by the accounting side.
pub type MirroredPart = Result<StreamPart, MirroredError>;

/// What the pump hands to the caller side.
enum Pumped<E> {
    Item(Result<StreamPart, E>),
    /// The provider stream panicked; re-raised when the caller polls.
    Panic(Box<dyn Any + Send>),
}

/// Split `source` into a caller stream and an accounting receiver.
///
/// Must be called inside a tokio runtime. The pump keeps draining the
/// source for accounting after the caller drops its stream, and stops
/// early only when both sides are gone. A panic in the source ends the
/// accounting side with an error and is resumed on the caller's next poll.
pub fn split_stream<E: CallError>(
    mut source: PartStream<E>,
) -> (PartStream<E>, mpsc::UnboundedReceiver<MirroredPart>) {
    let (caller_tx, caller_rx) = mpsc::unbounded_channel::<Pumped<E>>();
    let (mirror_tx, mirror_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut caller_open = true;
        let mut mirror_open = true;

        loop {
            let item = match AssertUnwindSafe(source.next()).catch_unwind().await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(payload) => {
                    debug!("Provider stream panicked");
                    if mirror_open {
                        let _ = mirror_tx.send(Err(MirroredError {
                            info: ErrorInfo::from_panic(&*payload),
                            http_status: None,
                        }));
                    }
                    if caller_open {
                        let _ = caller_tx.send(Pumped::Panic(payload));
                    }
                    break;
                }
            };

            if mirror_open {
                let mirrored = match &item {
                    Ok(part) => Ok(part.clone()),
                    Err(e) => Err(MirroredError::from_error(e)),
                };
                mirror_open = mirror_tx.send(mirrored).is_ok();
            }

            if caller_open && caller_tx.send(Pumped::Item(item)).is_err() {
                debug!("Caller dropped stream; draining for accounting");
                caller_open = false;
            }

            if !caller_open && !mirror_open {
                break;
            }
        }
    });

    let caller = UnboundedReceiverStream::new(caller_rx).map(|pumped| match pumped {
        Pumped::Item(item) => item,
        Pumped::Panic(payload) => resume_unwind(payload),
    });
    (Box::pin(caller), mirror_rx)
}

/// What a completed stream produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedStream {
    pub output: StreamOutput,
    /// Raw usage from the finish part, `Null` if the stream never finished.
    pub usage: Value,
    pub finish_reason: Option<Value>,
    pub provider_metadata: Option<Value>,
    /// Model id from a `response-metadata` part, if one arrived.
    pub response_model: Option<String>,
    pub finished: bool,
}

impl AccumulatedStream {
    /// Whether any collected source is a URL citation.
    pub fn has_citations(&self) -> bool {
        self.output.sources.iter().any(|s| s.source_type == "url")
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.output.tool_calls.iter().map(|c| c.name.as_str())
    }
}

/// Folds stream parts into text, reasoning, tool calls and sources.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    state: AccumulatedStream,
    tool_index: HashMap<String, usize>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn tool_entry(&mut self, id: &str) -> &mut PendingToolCall {
        let calls = &mut self.state.output.tool_calls;
        let index = *self.tool_index.entry(id.to_string()).or_insert_with(|| {
            calls.push(PendingToolCall {
                id: id.to_string(),
                ..Default::default()
            });
            calls.len() - 1
        });
        &mut calls[index]
    }

    /// Fold one part.
    pub fn push(&mut self, part: StreamPart) {
        match part {
            StreamPart::TextDelta { delta, .. } => self.state.output.text.push_str(&delta),
            StreamPart::ReasoningDelta { delta, .. } => self.state.output.reasoning.push_str(&delta),
            StreamPart::ToolInputStart { id, tool_name } => {
                self.tool_entry(&id).name = tool_name;
            }
            StreamPart::ToolInputDelta { id, delta } => {
                self.tool_entry(&id).input.push_str(&delta);
            }
            StreamPart::ToolCall {
                tool_call_id,
                tool_name,
                input,
            } => {
                // The final call carries the complete input.
                let entry = self.tool_entry(&tool_call_id);
                entry.name = tool_name;
                entry.input = stringify_input(Some(&input));
            }
            StreamPart::Source {
                source_type,
                id,
                url,
                title,
            } => self.state.output.sources.push(SourceRef {
                source_type: source_type.unwrap_or_else(|| "unknown".to_string()),
                id: id.unwrap_or_default(),
                url: url.unwrap_or_default(),
                title: title.unwrap_or_default(),
            }),
            StreamPart::Finish {
                usage,
                finish_reason,
                provider_metadata,
            } => {
                self.state.usage = usage;
                self.state.finish_reason = finish_reason;
                self.state.provider_metadata = provider_metadata;
                self.state.finished = true;
            }
            StreamPart::Other(value) => {
                if value.get("type").and_then(Value::as_str) == Some("response-metadata") {
                    if let Some(model) = value.get("modelId").and_then(Value::as_str) {
                        self.state.response_model = Some(model.to_string());
                    }
                }
            }
        }
    }

    pub fn finish(self) -> AccumulatedStream {
        self.state
    }
}

/// Drain a mirror receiver, stopping at the first error item.
pub async fn accumulate(
    mut mirror: mpsc::UnboundedReceiver<MirroredPart>,
) -> Result<AccumulatedStream, MirroredError> {
    let mut accumulator = StreamAccumulator::new();
    while let Some(item) = mirror.recv().await {
        accumulator.push(item?);
    }
    Ok(accumulator.finish())
}
