// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Token usage extraction across provider response shapes.
//!
//! Providers report usage as flat counts (`{"inputTokens": 10}`), nested
//! counts (`{"inputTokens": {"total": 10, "cacheRead": 2}}`), or their raw
//! API shapes (`prompt_tokens`, `input_tokens`). Every reader here returns
//! `Option` and the extractor chains them with `or_else`, so missing or
//! malformed fields fall through to zero instead of failing.

use serde_json::Value;

use crate::types::{ToolInfo, Usage};

/// Shape of the usage object a provider returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageSchema {
    /// Token fields are plain numbers.
    Flat,
    /// Token fields are objects carrying a `total` and a breakdown.
    Nested,
}

/// Read a non-negative count from a JSON number.
fn as_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

/// Follow a path of object keys.
fn path<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().try_fold(value, |current, key| current.get(key))
}

fn count_at(value: &Value, keys: &[&str]) -> Option<u64> {
    path(value, keys).and_then(as_count)
}

/// A token count given either as a number or as an object with `total`.
pub fn token_count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Object(obj) => obj.get("total").and_then(as_count),
        other => as_count(other),
    }
}

/// Detect whether usage uses the nested token schema.
pub fn detect_schema(usage: &Value) -> UsageSchema {
    let nested = ["inputTokens", "outputTokens"]
        .iter()
        .filter_map(|key| usage.get(key))
        .any(|field| field.get("total").is_some());

    if nested {
        UsageSchema::Nested
    } else {
        UsageSchema::Flat
    }
}

/// Build canonical usage from a raw usage object and provider metadata.
///
/// Does not apply the Anthropic cache adjustment or the web search count.
pub fn extract_usage(usage: &Value, provider_metadata: Option<&Value>) -> Usage {
    let input_tokens = token_count(usage.get("inputTokens"))
        .or_else(|| count_at(usage, &["prompt_tokens"]))
        .or_else(|| count_at(usage, &["input_tokens"]))
        .unwrap_or(0);

    let output_tokens = token_count(usage.get("outputTokens"))
        .or_else(|| count_at(usage, &["completion_tokens"]))
        .or_else(|| count_at(usage, &["output_tokens"]))
        .unwrap_or(0);

    let reasoning_tokens = count_at(usage, &["outputTokens", "reasoning"])
        .or_else(|| count_at(usage, &["reasoningTokens"]))
        .or_else(|| count_at(usage, &["completion_tokens_details", "reasoning_tokens"]));

    let cached_input_tokens = count_at(usage, &["inputTokens", "cacheRead"])
        .or_else(|| count_at(usage, &["cachedInputTokens"]))
        .or_else(|| count_at(usage, &["prompt_tokens_details", "cached_tokens"]))
        .or_else(|| count_at(usage, &["cache_read_input_tokens"]));

    let cache_creation_input_tokens = provider_metadata.and_then(|meta| {
        count_at(meta, &["anthropic", "cacheCreationInputTokens"])
            .or_else(|| count_at(meta, &["anthropic", "cache_creation_input_tokens"]))
    });

    let total_tokens = count_at(usage, &["totalTokens"])
        .or_else(|| count_at(usage, &["total_tokens"]))
        .unwrap_or_else(|| input_tokens.saturating_add(output_tokens));

    Usage {
        input_tokens,
        output_tokens,
        total_tokens,
        cached_input_tokens,
        cache_creation_input_tokens,
        reasoning_tokens,
        web_search_count: None,
    }
}

/// Remove cache tokens from the input count for the Anthropic nested schema.
///
/// That schema reports cache reads and writes inside the input total, which
/// would otherwise be double-billed. Returns whether an adjustment was made.
pub fn adjust_anthropic_cache(usage: &mut Usage, provider: &str, schema: UsageSchema) -> bool {
    if provider != "anthropic" || schema != UsageSchema::Nested {
        return false;
    }

    let cache = usage
        .cached_input_tokens
        .unwrap_or(0)
        .saturating_add(usage.cache_creation_input_tokens.unwrap_or(0));
    if cache == 0 {
        return false;
    }

    usage.input_tokens = usage.input_tokens.saturating_sub(cache);
    usage.total_tokens = usage.input_tokens.saturating_add(usage.output_tokens);
    true
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Whether response content carries URL citations.
pub fn content_has_citations(content: &[Value]) -> bool {
    content.iter().any(|part| {
        let url_source = part.get("type").and_then(Value::as_str) == Some("source")
            && part.get("sourceType").and_then(Value::as_str) == Some("url");

        let url_annotation = part
            .get("annotations")
            .and_then(Value::as_array)
            .is_some_and(|annotations| {
                annotations
                    .iter()
                    .any(|a| a.get("type").and_then(Value::as_str) == Some("url_citation"))
            });

        url_source || url_annotation
    })
}

/// Best-effort count of web searches performed for a call.
///
/// An explicit Anthropic request count wins. Otherwise a search context flag
/// or URL citations imply a single search.
pub fn web_search_count(usage: &Value, provider_metadata: Option<&Value>, has_citations: bool) -> u64 {
    if let Some(count) = provider_metadata.and_then(|meta| {
        count_at(meta, &["anthropic", "server_tool_use", "web_search_requests"])
            .or_else(|| count_at(meta, &["anthropic", "serverToolUse", "webSearchRequests"]))
    }) {
        return count;
    }

    let search_flag = |value: &Value| value.get("search_context_size").is_some_and(is_truthy);
    let flagged = search_flag(usage)
        || provider_metadata.is_some_and(|meta| {
            search_flag(meta)
                || meta
                    .as_object()
                    .is_some_and(|providers| providers.values().any(search_flag))
        });

    if flagged || has_citations {
        1
    } else {
        0
    }
}

/// Finish reason given as a string or as an object with `unified` / `type`.
pub fn finish_reason(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj
            .get("unified")
            .or_else(|| obj.get("type"))
            .and_then(Value::as_str)
            .map(String::from),
        _ => None,
    }
}

/// Provider family name: `"openai.chat"` becomes `"openai"`.
pub fn normalize_provider(provider: &str) -> String {
    let lower = provider.to_ascii_lowercase();
    match lower.split_once('.') {
        Some((family, _)) => family.to_string(),
        None => lower,
    }
}

/// Summarize tool calls given their names in call order.
pub fn summarize_tools<'a>(
    call_names: impl IntoIterator<Item = &'a str>,
    result_count: usize,
    available_tools: Option<Vec<String>>,
) -> ToolInfo {
    let mut info = ToolInfo::available(available_tools);
    for name in call_names {
        info.call_count += 1;
        if !info.called_tools.iter().any(|n| n == name) {
            info.called_tools.push(name.to_string());
        }
    }
    info.result_count = result_count;
    info
}

/// Tool info from the content parts of a single-response result.
pub fn tool_info(content: &[Value], available_tools: Option<Vec<String>>) -> ToolInfo {
    let kind = |part: &Value| part.get("type").and_then(Value::as_str).unwrap_or_default().to_string();

    let calls = content
        .iter()
        .filter(|part| kind(part) == "tool-call")
        .map(|part| part.get("toolName").and_then(Value::as_str).unwrap_or_default());
    let results = content.iter().filter(|part| kind(part) == "tool-result").count();

    summarize_tools(calls, results, available_tools)
}

/// Full usage accounting for one call.
///
/// `provider` is the normalized family name.
pub fn account_usage(
    provider: &str,
    usage: &Value,
    provider_metadata: Option<&Value>,
    has_citations: bool,
) -> Usage {
    let schema = detect_schema(usage);
    let mut extracted = extract_usage(usage, provider_metadata);
    adjust_anthropic_cache(&mut extracted, provider, schema);
    extracted.web_search_count = Some(web_search_count(usage, provider_metadata, has_citations));
    extracted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested(input: u64, output: u64, cache_read: u64) -> Value {
        json!({
            "inputTokens": {"total": input, "noCache": input - cache_read, "cacheRead": cache_read},
            "outputTokens": {"total": output, "text": output, "reasoning": 10}
        })
    }

    #[test]
    fn test_token_count_shapes() {
        assert_eq!(token_count(Some(&json!(10))), Some(10));
        assert_eq!(token_count(Some(&json!({"total": 7}))), Some(7));
        assert_eq!(token_count(Some(&json!({"noCache": 7}))), None);
        assert_eq!(token_count(Some(&json!("10"))), None);
        assert_eq!(token_count(None), None);
    }

    #[test]
    fn test_flat_usage() {
        let usage = extract_usage(&json!({"inputTokens": 10, "outputTokens": 2}), None);
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.output_tokens, 2);
        assert_eq!(usage.total_tokens, 12);
        assert_eq!(usage.cached_input_tokens, None);
    }

    #[test]
    fn test_flat_and_nested_agree() {
        let flat = extract_usage(&json!({"inputTokens": 10, "outputTokens": 2}), None);
        let nested = extract_usage(&json!({"inputTokens": {"total": 10}, "outputTokens": {"total": 2}}), None);
        assert_eq!(flat.input_tokens, nested.input_tokens);
        assert_eq!(flat.output_tokens, nested.output_tokens);
        assert_eq!(flat.total_tokens, nested.total_tokens);
    }

    #[test]
    fn test_explicit_total_kept() {
        let usage = extract_usage(&json!({"inputTokens": 10, "outputTokens": 2, "totalTokens": 15}), None);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_openai_raw_shape() {
        let usage = extract_usage(
            &json!({
                "prompt_tokens": 30,
                "completion_tokens": 12,
                "total_tokens": 42,
                "prompt_tokens_details": {"cached_tokens": 8},
                "completion_tokens_details": {"reasoning_tokens": 4}
            }),
            None,
        );
        assert_eq!(usage.input_tokens, 30);
        assert_eq!(usage.output_tokens, 12);
        assert_eq!(usage.total_tokens, 42);
        assert_eq!(usage.cached_input_tokens, Some(8));
        assert_eq!(usage.reasoning_tokens, Some(4));
    }

    #[test]
    fn test_anthropic_raw_shape() {
        let usage = extract_usage(
            &json!({"input_tokens": 50, "output_tokens": 5, "cache_read_input_tokens": 12}),
            None,
        );
        assert_eq!(usage.input_tokens, 50);
        assert_eq!(usage.cached_input_tokens, Some(12));
        assert_eq!(detect_schema(&json!({"input_tokens": 50})), UsageSchema::Flat);
    }

    #[test]
    fn test_malformed_usage_is_zero() {
        let usage = extract_usage(&json!("garbage"), Some(&json!(null)));
        assert_eq!(usage, Usage::default());
        let usage = extract_usage(&json!({"inputTokens": "ten", "outputTokens": -3}), None);
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.output_tokens, 0);
    }

    #[test]
    fn test_anthropic_cache_adjustment() {
        let raw = json!({
            "inputTokens": {"total": 100, "noCache": 75, "cacheRead": 20, "cacheWrite": 5},
            "outputTokens": {"total": 50}
        });
        let meta = json!({"anthropic": {"cacheCreationInputTokens": 5}});
        let usage = account_usage("anthropic", &raw, Some(&meta), false);
        assert_eq!(usage.input_tokens, 75);
        assert_eq!(usage.total_tokens, 125);
        assert_eq!(usage.cached_input_tokens, Some(20));
        assert_eq!(usage.cache_creation_input_tokens, Some(5));
    }

    #[test]
    fn test_anthropic_cache_adjustment_with_write_in_total() {
        let raw = json!({
            "inputTokens": {"total": 125, "noCache": 100, "cacheRead": 20, "cacheWrite": 5},
            "outputTokens": {"total": 50}
        });
        let meta = json!({"anthropic": {"cacheCreationInputTokens": 5}});
        let usage = account_usage("anthropic", &raw, Some(&meta), false);
        assert_eq!(usage.input_tokens, 100);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_no_adjustment_for_other_providers() {
        let raw = nested(125, 50, 20);
        let meta = json!({"anthropic": {"cacheCreationInputTokens": 5}});
        let usage = account_usage("openai", &raw, Some(&meta), false);
        assert_eq!(usage.input_tokens, 125);
        assert_eq!(usage.cached_input_tokens, Some(20));
        assert_eq!(usage.cache_creation_input_tokens, Some(5));
        assert_eq!(usage.reasoning_tokens, Some(10));
    }

    #[test]
    fn test_no_adjustment_for_flat_schema_or_zero_cache() {
        let mut usage = extract_usage(&json!({"inputTokens": 100, "cachedInputTokens": 20}), None);
        assert!(!adjust_anthropic_cache(&mut usage, "anthropic", UsageSchema::Flat));
        assert_eq!(usage.input_tokens, 100);

        let mut usage = extract_usage(&nested(100, 10, 0), None);
        assert!(!adjust_anthropic_cache(&mut usage, "anthropic", UsageSchema::Nested));
        assert_eq!(usage.input_tokens, 100);
    }

    #[test]
    fn test_adjustment_saturates() {
        let mut usage = Usage {
            input_tokens: 10,
            output_tokens: 1,
            cached_input_tokens: Some(40),
            ..Default::default()
        };
        adjust_anthropic_cache(&mut usage, "anthropic", UsageSchema::Nested);
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.total_tokens, 1);
    }

    #[test]
    fn test_huge_counts_saturate() {
        let usage = account_usage("openai", &json!({"inputTokens": u64::MAX, "outputTokens": 1}), None, false);
        assert_eq!(usage.input_tokens, u64::MAX);
        assert_eq!(usage.total_tokens, u64::MAX);

        let usage = account_usage("openai", &json!({"prompt_tokens": 1e300, "completion_tokens": 1e300}), None, false);
        assert_eq!(usage.total_tokens, u64::MAX);
    }

    #[test]
    fn test_huge_cache_counts_saturate() {
        let meta = json!({"anthropic": {"cacheCreationInputTokens": u64::MAX}});
        let usage = account_usage(
            "anthropic",
            &json!({
                "inputTokens": {"total": 100, "cacheRead": u64::MAX},
                "outputTokens": {"total": u64::MAX}
            }),
            Some(&meta),
            false,
        );
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.total_tokens, u64::MAX);
    }

    #[test]
    fn test_web_search_from_anthropic_metadata() {
        let meta = json!({"anthropic": {"server_tool_use": {"web_search_requests": 3}}});
        assert_eq!(web_search_count(&json!({}), Some(&meta), true), 3);
    }

    #[test]
    fn test_web_search_from_context_size() {
        let meta = json!({"openai": {"search_context_size": "medium"}});
        assert_eq!(web_search_count(&json!({}), Some(&meta), false), 1);
        assert_eq!(web_search_count(&json!({"search_context_size": "low"}), None, false), 1);
        assert_eq!(web_search_count(&json!({"search_context_size": ""}), None, false), 0);
    }

    #[test]
    fn test_web_search_from_citations() {
        let content = vec![
            json!({"type": "text", "text": "see", "annotations": [{"type": "url_citation", "url": "https://a"}]}),
        ];
        assert!(content_has_citations(&content));
        assert!(content_has_citations(&[json!({"type": "source", "sourceType": "url", "url": "https://b"})]));
        assert!(!content_has_citations(&[json!({"type": "source", "sourceType": "document"})]));
        assert_eq!(web_search_count(&json!({}), None, true), 1);
        assert_eq!(web_search_count(&json!({}), None, false), 0);
    }

    #[test]
    fn test_finish_reason_shapes() {
        assert_eq!(finish_reason(Some(&json!("stop"))).as_deref(), Some("stop"));
        assert_eq!(
            finish_reason(Some(&json!({"unified": "tool-calls", "raw": "tool_use"}))).as_deref(),
            Some("tool-calls")
        );
        assert_eq!(finish_reason(Some(&json!({"type": "length"}))).as_deref(), Some("length"));
        assert_eq!(finish_reason(Some(&json!(3))), None);
        assert_eq!(finish_reason(None), None);
    }

    #[test]
    fn test_normalize_provider() {
        assert_eq!(normalize_provider("openai.chat"), "openai");
        assert_eq!(normalize_provider("Anthropic.messages"), "anthropic");
        assert_eq!(normalize_provider("mistral"), "mistral");
    }

    #[test]
    fn test_tool_info_dedups_names() {
        let content = vec![
            json!({"type": "tool-call", "toolCallId": "1", "toolName": "get_weather", "input": {}}),
            json!({"type": "tool-call", "toolCallId": "2", "toolName": "get_time", "input": {}}),
            json!({"type": "tool-call", "toolCallId": "3", "toolName": "get_weather", "input": {}}),
            json!({"type": "tool-result", "toolCallId": "1", "toolName": "get_weather", "output": 1}),
        ];
        let info = tool_info(&content, Some(vec!["get_weather".into(), "get_time".into()]));
        assert_eq!(info.call_count, 3);
        assert_eq!(info.result_count, 1);
        assert_eq!(info.called_tools, vec!["get_weather", "get_time"]);
        assert_eq!(info.available_tools.as_ref().map(Vec::len), Some(2));
    }
}
