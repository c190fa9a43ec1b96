//! The analysis payload as received from the workflow service.
//!
//! The upstream service guarantees no schema: depending on the prompt version
//! it returns a JSON object, a JSON object wrapped in a markdown fence, or
//! prose that may or may not embed an object. [`RawAnalysisPayload`] names
//! those shapes explicitly so the normaliser can match on them exhaustively.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// Marker that opens or closes a markdown code block.
pub(crate) const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq)]
pub enum RawAnalysisPayload {
  /// A JSON object, either received as such or as a string that parses
  /// cleanly into one.
  Structured(Map<String, Value>),
  /// Text containing a markdown code fence, usually around a JSON object.
  FencedJson(String),
  /// Anything else: prose, half-written JSON, an empty reply.
  FreeText(String),
}

impl RawAnalysisPayload {
  /// Classify a text reply.
  pub fn from_text(text: impl Into<String>) -> Self {
    let text = text.into();
    let trimmed = text.trim();
    if trimmed.starts_with('{')
      && let Ok(Value::Object(map)) = serde_json::from_str(trimmed)
    {
      return Self::Structured(map);
    }
    if text.contains(FENCE) {
      Self::FencedJson(text)
    } else {
      Self::FreeText(text)
    }
  }

  /// Classify a stored or received JSON value. Strings are classified as
  /// text; any other non-object value is stringified first.
  pub fn from_value(value: Value) -> Self {
    match value {
      Value::Object(map) => Self::Structured(map),
      Value::String(text) => Self::from_text(text),
      other => Self::from_text(other.to_string()),
    }
  }

  /// The payload as text, stringifying structured payloads.
  pub fn raw_text(&self) -> Cow<'_, str> {
    match self {
      Self::Structured(map) => Cow::Owned(Value::Object(map.clone()).to_string()),
      Self::FencedJson(text) | Self::FreeText(text) => Cow::Borrowed(text),
    }
  }

  /// The JSON value persisted alongside a record. Feeding it back through
  /// [`RawAnalysisPayload::from_value`] yields an equal payload.
  pub fn to_value(&self) -> Value {
    match self {
      Self::Structured(map) => Value::Object(map.clone()),
      Self::FencedJson(text) | Self::FreeText(text) => Value::String(text.clone()),
    }
  }
}

impl From<Value> for RawAnalysisPayload {
  fn from(value: Value) -> Self { Self::from_value(value) }
}

impl From<String> for RawAnalysisPayload {
  fn from(text: String) -> Self { Self::from_text(text) }
}

impl From<&str> for RawAnalysisPayload {
  fn from(text: &str) -> Self { Self::from_text(text) }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn bare_json_text_is_structured() {
    let p = RawAnalysisPayload::from_text("  {\"name\": \"Alice\"} ");
    assert!(matches!(p, RawAnalysisPayload::Structured(ref m) if m["name"] == "Alice"));
  }

  #[test]
  fn fenced_text_is_fenced() {
    let p = RawAnalysisPayload::from_text("```json\n{\"name\":\"Bob\"}\n```");
    assert!(matches!(p, RawAnalysisPayload::FencedJson(_)));
  }

  #[test]
  fn broken_json_is_free_text() {
    let p = RawAnalysisPayload::from_text("{\"name\": \"Eve\",");
    assert!(matches!(p, RawAnalysisPayload::FreeText(_)));
  }

  #[test]
  fn json_array_text_is_free_text() {
    let p = RawAnalysisPayload::from_text("[1, 2, 3]");
    assert!(matches!(p, RawAnalysisPayload::FreeText(_)));
  }

  #[test]
  fn non_string_scalars_are_stringified() {
    let p = RawAnalysisPayload::from_value(json!(42));
    assert_eq!(p, RawAnalysisPayload::FreeText("42".into()));
  }

  #[test]
  fn stored_value_classifies_back_to_the_same_payload() {
    for p in [
      RawAnalysisPayload::from_value(json!({"name": "Alice", "tag": "vip"})),
      RawAnalysisPayload::from_text("```json\n{\"name\":\"Bob\"}\n```"),
      RawAnalysisPayload::from_text("Dinner with Dana"),
    ] {
      assert_eq!(RawAnalysisPayload::from_value(p.to_value()), p);
    }
  }
}
