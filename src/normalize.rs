//! Best-effort normalization of webhook replies.
//!
//! Webhook backends answer in whatever shape the workflow author happened to
//! produce: plain strings, JSON encoded as a string, JSON inside a fenced code
//! block, JSON followed by stray characters, or objects wrapped in `body` /
//! `data` / `output` envelopes. Everything here degrades to a textual fallback
//! and never fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Envelope keys peeled off in this order, one level each.
const ENVELOPE_KEYS: [&str; 3] = ["body", "data", "output"];

/// Keys checked for the display text, in priority order.
const TEXT_KEYS: [&str; 4] = ["text", "message", "response", "output"];

/// Keys checked for the quick-reply list, in priority order.
const SUGGESTION_KEYS: [&str; 4] = ["suggestions", "quickReplies", "buttons", "choices"];

/// Fields that label an object-shaped suggestion, in priority order.
const LABEL_KEYS: [&str; 4] = ["title", "text", "label", "name"];

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^```(?:json)?\s*([\s\S]*?)\s*```$").expect("code fence pattern is valid")
});

/// Display text plus optional quick replies extracted from a backend payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedReply {
    pub text: String,
    /// `None` when the payload carried no suggestion list at all
    pub suggestions: Option<Vec<String>>,
}

/// Normalize an arbitrary decoded payload into text and suggestions.
pub fn normalize_reply(payload: &Value) -> NormalizedReply {
    let mut value = recover_json(payload.clone());

    for key in ENVELOPE_KEYS {
        if let Some(inner) = value.as_object_mut().and_then(|object| object.remove(key)) {
            value = recover_json(inner);
        }
    }

    NormalizedReply {
        text: extract_text(&value),
        suggestions: extract_suggestions(&value),
    }
}

/// If `value` is a string that embeds JSON, return the decoded JSON;
/// otherwise return `value` untouched.
pub fn recover_json(value: Value) -> Value {
    match value {
        Value::String(raw) => parse_embedded_json(&raw).unwrap_or(Value::String(raw)),
        other => other,
    }
}

/// Dig a JSON object or array out of free-form text.
///
/// Strips a byte-order mark and surrounding whitespace, unwraps a fenced code
/// block, skips any prose before the first `{` or `[`, then retries parsing
/// while dropping one trailing character at a time.
pub fn parse_embedded_json(raw: &str) -> Option<Value> {
    let mut text = raw.strip_prefix('\u{feff}').unwrap_or(raw).trim();

    if let Some(inner) = CODE_FENCE.captures(text).and_then(|caps| caps.get(1)) {
        text = inner.as_str().trim();
    }

    if !starts_like_json(text) {
        if let Some(start) = text.find(['{', '[']) {
            text = &text[start..];
        }
    }

    // Candidate ends from the full length down to two characters.
    let ends: Vec<usize> = text
        .char_indices()
        .skip(1)
        .map(|(index, ch)| index + ch.len_utf8())
        .collect();

    ends.into_iter().rev().find_map(|end| {
        let candidate = text[..end].trim();
        if starts_like_json(candidate) {
            serde_json::from_str::<Value>(candidate).ok()
        } else {
            None
        }
    })
}

fn starts_like_json(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[')
}

/// Field lookup that treats an explicit `null` like a missing key.
fn present<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|field| !field.is_null())
}

fn extract_text(value: &Value) -> String {
    TEXT_KEYS
        .iter()
        .find_map(|key| present(value, key))
        .or_else(|| {
            value
                .get("messages")
                .and_then(Value::as_array)
                .and_then(|messages| messages.last())
                .and_then(|last| present(last, "message"))
        })
        .map(coerce_to_string)
        .or_else(|| value.as_str().map(str::to_owned))
        .unwrap_or_default()
}

fn extract_suggestions(value: &Value) -> Option<Vec<String>> {
    let raw = SUGGESTION_KEYS.iter().find_map(|key| present(value, key))?;
    let items = raw.as_array()?;
    Some(items.iter().filter_map(suggestion_label).collect())
}

fn suggestion_label(item: &Value) -> Option<String> {
    let label = match item {
        Value::String(_) => item,
        Value::Object(_) => LABEL_KEYS.iter().find_map(|key| present(item, key))?,
        _ => return None,
    };
    truthy_string(label)
}

/// String form of a value, or `None` for falsy values (`""`, `0`, `false`, `null`).
fn truthy_string(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        other => Some(coerce_to_string(other)),
    }
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
