// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Truncation and redaction of captured text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Default maximum text length, in characters.
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 100_000;

/// Suffix appended to truncated text.
pub const TRUNCATION_SUFFIX: &str = "... [truncated]";

/// Strings longer than this may be treated as inline base64 payloads.
const BASE64_MIN_LENGTH: usize = 1000;

static BASE64_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/_-]+={0,2}$").unwrap());

/// `data:[<mime>][;param]*,` with an optional `type/subtype` mime.
static DATA_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:([\w.+-]+/[\w.+-]+)?(?:;[\w.+=-]+)*,").unwrap());

/// Cut `text` to at most `max_chars` characters, appending [`TRUNCATION_SUFFIX`].
///
/// Text within the limit is returned unchanged.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut truncated = String::with_capacity(cut + TRUNCATION_SUFFIX.len());
            truncated.push_str(&text[..cut]);
            truncated.push_str(TRUNCATION_SUFFIX);
            truncated
        }
        None => text.to_string(),
    }
}

/// Replace embedded binary payloads with a short marker.
///
/// Returns `None` when the string is left as-is.
pub fn redact(text: &str) -> Option<String> {
    if let Some(caps) = DATA_URL_RE.captures(text) {
        let mime = caps.get(1).map_or("unknown", |m| m.as_str());
        return Some(format!("[{mime} data URL redacted]"));
    }

    if looks_like_base64(text) {
        return Some(format!("[base64 data redacted - {} chars]", text.chars().count()));
    }

    None
}

/// Whether `text` looks like a long inline base64 payload.
pub fn looks_like_base64(text: &str) -> bool {
    text.len() > BASE64_MIN_LENGTH
        && !text.contains(char::is_whitespace)
        && BASE64_RE.is_match(text)
}

/// Whether `text` is a remote URL that can be recorded verbatim.
pub fn is_remote_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

/// Redact, then truncate.
pub fn sanitize(text: &str, max_chars: usize) -> String {
    match redact(text) {
        Some(marker) => marker,
        None => truncate(text, max_chars),
    }
}

/// Apply [`sanitize`] to every string leaf of a JSON value.
pub fn sanitize_value(value: &serde_json::Value, max_chars: usize) -> serde_json::Value {
    use serde_json::Value;

    match value {
        Value::String(s) => Value::String(sanitize(s, max_chars)),
        Value::Array(items) => Value::Array(items.iter().map(|v| sanitize_value(v, max_chars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_value(v, max_chars)))
                .collect(),
        ),
        other => other.clone(),
    }
}
