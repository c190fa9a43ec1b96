//! Interpretation of analysis payloads.
//!
//! [`normalize`] turns whatever the workflow service returned into a
//! [`NormalizedResult`] through an ordered fallback chain:
//!
//! 1. direct field access on a structured payload;
//! 2. the first-`{`-to-last-`}` span of a text payload, fences stripped,
//!    parsed as an object and read like step 1;
//! 3. the first `"name": "<value>"` pattern in the raw text;
//! 4. the first plain line of prose, cut to 20 characters;
//! 5. a synthesised `Person <timestamp>` name.
//!
//! A step runs only while no usable name has been found, and the result is
//! sanitised once more before it leaves. The normaliser never fails.
//!
//! [`reextract`] is the reduced chain (steps 1 and 3) used by the repair job.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::payload::{FENCE, RawAnalysisPayload};

const NAME_FIELDS: [&str; 4] = ["name", "person", "contact_name", "who"];
const SUMMARY_FIELDS: [&str; 3] = ["summary", "content", "description"];
const REPAIR_SUMMARY_FIELDS: [&str; 2] = ["summary", "description"];

const LINE_NAME_MAX_CHARS: usize = 20;
/// Keywords are a noisy stand-in for tags; only the leading few are kept.
const KEYWORD_TAG_LIMIT: usize = 3;

fn name_pattern_re() -> &'static Regex {
  static NAME_PATTERN_RE: OnceLock<Regex> = OnceLock::new();
  NAME_PATTERN_RE
    .get_or_init(|| Regex::new(r#""name"\s*:\s*"([^"]+)""#).expect("valid name pattern regex"))
}

fn fence_re() -> &'static Regex {
  static FENCE_RE: OnceLock<Regex> = OnceLock::new();
  FENCE_RE.get_or_init(|| Regex::new(r"```json\n?|\n?```").expect("valid fence regex"))
}

// ─── Result types ────────────────────────────────────────────────────────────

/// The canonical shape derived from an arbitrary payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
  /// Always displayable; see [`is_rejected_name`].
  pub name:        String,
  pub summary:     String,
  /// In order of appearance; duplicates are kept.
  pub tags:        Vec<String>,
  pub raw_payload: Value,
}

/// Output of [`reextract`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reextracted {
  pub name:    String,
  pub summary: Option<String>,
}

// ─── Name rules ──────────────────────────────────────────────────────────────

/// Names that must never reach storage: blanks, structural artifacts and the
/// `Unknown` sentinel.
pub fn is_rejected_name(name: &str) -> bool {
  let trimmed = name.trim();
  trimmed.is_empty() || trimmed.starts_with('{') || name == "Unknown"
}

/// Fallback display name for payloads nothing could be extracted from.
pub fn synthesized_name(now: DateTime<Utc>) -> String {
  format!("Person {}", now.format("%m-%d %H:%M"))
}

fn usable(candidate: Option<String>) -> Option<String> {
  candidate.filter(|n| !is_rejected_name(n))
}

// ─── Normalisation ───────────────────────────────────────────────────────────

/// Normalise `payload`, synthesising a name from the current time if needed.
pub fn normalize(payload: &RawAnalysisPayload) -> NormalizedResult {
  normalize_at(payload, Utc::now())
}

/// [`normalize`] with an explicit clock for the synthesis branch.
pub fn normalize_at(payload: &RawAnalysisPayload, now: DateTime<Utc>) -> NormalizedResult {
  let (name, summary, tags) = match payload {
    RawAnalysisPayload::Structured(map) => {
      let fields = Fields::read(map);
      let name = fields.name.or_else(|| name_from_pattern(&payload.raw_text()));
      (name, fields.summary.unwrap_or_default(), fields.tags)
    }
    RawAnalysisPayload::FencedJson(text) | RawAnalysisPayload::FreeText(text) => {
      let fields = embedded_object(text)
        .map(|map| Fields::read(&map))
        .unwrap_or_default();
      let name = fields
        .name
        .or_else(|| name_from_pattern(text))
        .or_else(|| {
          // Text that tried to be JSON and failed has no meaningful lines.
          if brace_span(text).is_some() { None } else { name_from_lines(text) }
        });
      (name, fields.summary.unwrap_or_else(|| text.clone()), fields.tags)
    }
  };

  let name = usable(name).unwrap_or_else(|| synthesized_name(now));
  NormalizedResult { name, summary, tags, raw_payload: payload.to_value() }
}

/// The reduced chain: field access on the payload (or the object embedded in
/// a text payload), then the `"name"` pattern.
/// Returns `None` when no candidate survives sanitisation.
pub fn reextract(payload: &RawAnalysisPayload) -> Option<Reextracted> {
  let read = |map: &Map<String, Value>| (first_name(map), first_string(map, &REPAIR_SUMMARY_FIELDS));
  let (name, summary) = match payload {
    RawAnalysisPayload::Structured(map) => read(map),
    RawAnalysisPayload::FencedJson(text) | RawAnalysisPayload::FreeText(text) => {
      embedded_object(text).map(|map| read(&map)).unwrap_or_default()
    }
  };

  let name = usable(name).or_else(|| usable(name_from_pattern(&payload.raw_text())))?;
  Some(Reextracted { name, summary })
}

/// The `keywords` value of a payload as searchable text. Text payloads are
/// read through their embedded object; arrays are joined with `, `.
pub fn keywords_of(payload: &RawAnalysisPayload) -> Option<String> {
  let read = |map: &Map<String, Value>| match map.get("keywords")? {
    Value::String(s) => Some(s.clone()),
    other => Some(tag_fragments(other).join(", ")),
  };
  let keywords = match payload {
    RawAnalysisPayload::Structured(map) => read(map),
    RawAnalysisPayload::FencedJson(text) | RawAnalysisPayload::FreeText(text) => {
      embedded_object(text).and_then(|map| read(&map))
    }
  };
  keywords.filter(|k| !k.trim().is_empty())
}

/// Display tags for a payload, without running the name chain.
pub fn tags_of(payload: &RawAnalysisPayload) -> Vec<String> {
  match payload {
    RawAnalysisPayload::Structured(map) => read_tags(map),
    RawAnalysisPayload::FencedJson(text) | RawAnalysisPayload::FreeText(text) => {
      embedded_object(text).map(|map| read_tags(&map)).unwrap_or_default()
    }
  }
}

/// Split a tag string on ASCII commas, full-width commas and whitespace,
/// dropping empty fragments.
pub fn split_tags(raw: &str) -> Vec<String> {
  raw
    .split(|c: char| c == ',' || c == '，' || c.is_whitespace())
    .filter(|t| !t.is_empty())
    .map(str::to_owned)
    .collect()
}

// ─── Field access ────────────────────────────────────────────────────────────

#[derive(Default)]
struct Fields {
  name:    Option<String>,
  summary: Option<String>,
  tags:    Vec<String>,
}

impl Fields {
  fn read(map: &Map<String, Value>) -> Self {
    Self {
      name:    first_name(map),
      summary: first_string(map, &SUMMARY_FIELDS),
      tags:    read_tags(map),
    }
  }
}

/// The first key whose value is a non-empty string (or a number).
fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
  keys.iter().find_map(|k| match map.get(*k)? {
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  })
}

/// The first name field holding a usable name; placeholders fall through to
/// the next key.
fn first_name(map: &Map<String, Value>) -> Option<String> {
  NAME_FIELDS.iter().find_map(|k| usable(first_string(map, &[*k])))
}

fn read_tags(map: &Map<String, Value>) -> Vec<String> {
  if let Some(tags) = map.get("tag").map(tag_fragments).filter(|t| !t.is_empty()) {
    return tags;
  }
  map
    .get("keywords")
    .map(tag_fragments)
    .unwrap_or_default()
    .into_iter()
    .take(KEYWORD_TAG_LIMIT)
    .collect()
}

fn tag_fragments(value: &Value) -> Vec<String> {
  match value {
    Value::String(s) => split_tags(s),
    Value::Array(items) => items.iter().flat_map(tag_fragments).collect(),
    Value::Number(n) => vec![n.to_string()],
    _ => Vec::new(),
  }
}

// ─── Text fallbacks ──────────────────────────────────────────────────────────

/// Byte range from the first `{` to the last `}`, if they are ordered.
fn brace_span(text: &str) -> Option<(usize, usize)> {
  let open = text.find('{')?;
  let close = text.rfind('}')?;
  (close > open).then_some((open, close))
}

fn embedded_object(text: &str) -> Option<Map<String, Value>> {
  let cleaned = if text.contains(FENCE) {
    fence_re().replace_all(text, "").into_owned()
  } else {
    text.to_owned()
  };
  let (open, close) = brace_span(&cleaned)?;
  match serde_json::from_str(&cleaned[open..=close]) {
    Ok(Value::Object(map)) => Some(map),
    Ok(_) => None,
    Err(e) => {
      tracing::debug!(error = %e, "embedded JSON did not parse");
      None
    }
  }
}

fn name_from_pattern(text: &str) -> Option<String> {
  name_pattern_re()
    .captures(text)
    .and_then(|c| c.get(1))
    .map(|m| m.as_str().to_owned())
}

fn name_from_lines(text: &str) -> Option<String> {
  text
    .lines()
    .map(str::trim)
    .find(|l| !l.is_empty() && !l.starts_with('{') && !l.starts_with('`'))
    .map(|l| l.chars().take(LINE_NAME_MAX_CHARS).collect::<String>().trim().to_owned())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use serde_json::json;

  use super::*;

  fn at() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap() }

  fn norm(p: impl Into<RawAnalysisPayload>) -> NormalizedResult {
    normalize_at(&p.into(), at())
  }

  fn is_synthesized(name: &str) -> bool {
    Regex::new(r"^Person \d{2}-\d{2} \d{2}:\d{2}$").unwrap().is_match(name)
  }

  // ── Structured ─────────────────────────────────────────────────────────────

  #[test]
  fn mapping_with_name_and_summary() {
    let r = norm(json!({"name": "Alice", "summary": "met at expo"}));
    assert_eq!(r.name, "Alice");
    assert_eq!(r.summary, "met at expo");
    assert!(r.tags.is_empty());
  }

  #[test]
  fn alternative_name_and_summary_keys() {
    let r = norm(json!({"who": "Dana", "content": "coffee"}));
    assert_eq!((r.name.as_str(), r.summary.as_str()), ("Dana", "coffee"));

    let r = norm(json!({"name": "", "contact_name": "Eli", "description": "lunch"}));
    assert_eq!((r.name.as_str(), r.summary.as_str()), ("Eli", "lunch"));
  }

  #[test]
  fn placeholder_field_falls_through_to_next_key() {
    let r = norm(json!({"name": "Unknown", "person": "Frank"}));
    assert_eq!(r.name, "Frank");
  }

  #[test]
  fn mapping_without_name_is_synthesized() {
    let r = norm(json!({"summary": "someone at the booth"}));
    assert_eq!(r.name, "Person 03-07 09:05");
    assert_eq!(r.summary, "someone at the booth");
  }

  #[test]
  fn mapping_with_nested_name_uses_pattern() {
    let r = norm(json!({"result": {"name": "Gina"}}));
    assert_eq!(r.name, "Gina");
    assert_eq!(r.summary, "");
  }

  #[test]
  fn mapping_with_brace_name_is_rejected() {
    let r = norm(json!({"name": "{"}));
    assert!(is_synthesized(&r.name), "{}", r.name);
  }

  // ── Fenced / embedded JSON ─────────────────────────────────────────────────

  #[test]
  fn fenced_json_with_tag() {
    let r = norm("```json\n{\"name\":\"Bob\",\"tag\":\"vip, partner\"}\n```");
    assert_eq!(r.name, "Bob");
    assert_eq!(r.tags, vec!["vip", "partner"]);
  }

  #[test]
  fn fenced_json_matches_direct_mapping() {
    let direct = norm(json!({"name": "Bob", "summary": "s", "tag": "a b"}));
    let fenced = norm("```json\n{\"name\": \"Bob\", \"summary\": \"s\", \"tag\": \"a b\"}\n```");
    assert_eq!(direct.name, fenced.name);
    assert_eq!(direct.summary, fenced.summary);
    assert_eq!(direct.tags, fenced.tags);
  }

  #[test]
  fn json_embedded_in_prose() {
    let r = norm("Here is the result: {\"person\": \"Hana\", \"summary\": \"talked pricing\"} hope it helps");
    assert_eq!(r.name, "Hana");
    assert_eq!(r.summary, "talked pricing");
  }

  #[test]
  fn embedded_object_without_summary_keeps_raw_text() {
    let raw = "```json\n{\"name\":\"Ivan\"}\n```";
    assert_eq!(norm(raw).summary, raw);
  }

  // ── Regex and line fallbacks ───────────────────────────────────────────────

  #[test]
  fn broken_json_uses_name_pattern() {
    let r = norm("{\"name\": \"Jun\", \"summary\": \"unterminated");
    assert_eq!(r.name, "Jun");
  }

  #[test]
  fn first_pattern_match_wins() {
    let r = norm("{\"name\": \"Kai\", broken \"name\": \"Lee\"");
    assert_eq!(r.name, "Kai");
  }

  #[test]
  fn plain_prose_uses_first_line_truncated() {
    let r = norm("\n\n  Margaret Hamilton-Smithson of Acme\nMet at the expo");
    assert_eq!(r.name, "Margaret Hamilton-Sm");
    assert_eq!(r.name.chars().count(), 20);
  }

  #[test]
  fn line_heuristic_counts_characters_not_bytes() {
    let r = norm("张伟，产品经理，上海某科技公司的联系人，负责合作洽谈");
    assert_eq!(r.name.chars().count(), 20);
  }

  #[test]
  fn fence_lines_are_skipped() {
    let r = norm("```\nNora Lind\n```");
    assert_eq!(r.name, "Nora Lind");
  }

  #[test]
  fn garbage_braces_are_synthesized() {
    let r = norm("Hello there, nice to meet {garbage}");
    assert_eq!(r.name, "Person 03-07 09:05");
    assert_eq!(r.summary, "Hello there, nice to meet {garbage}");
  }

  #[test]
  fn empty_and_placeholder_text_is_synthesized() {
    for raw in ["", "   \n  ", "{", "Unknown", "```json\n{\n```"] {
      let r = norm(raw);
      assert!(is_synthesized(&r.name), "{raw:?} -> {}", r.name);
    }
  }

  #[test]
  fn synthesized_name_uses_current_clock() {
    let r = normalize(&"".into());
    assert!(is_synthesized(&r.name));
  }

  // ── Tags ───────────────────────────────────────────────────────────────────

  #[test]
  fn tags_split_on_every_separator() {
    assert_eq!(split_tags("a, b，c  d,,"), vec!["a", "b", "c", "d"]);
  }

  #[test]
  fn keywords_stand_in_for_missing_tags() {
    let r = norm(json!({"name": "Omar", "keywords": "ai, robotics, expo, sales"}));
    assert_eq!(r.tags, vec!["ai", "robotics", "expo"]);
  }

  #[test]
  fn tag_wins_over_keywords() {
    let r = norm(json!({"name": "Pia", "tag": "vip", "keywords": "x y z"}));
    assert_eq!(r.tags, vec!["vip"]);
  }

  #[test]
  fn tag_arrays_are_flattened_and_duplicates_kept() {
    let r = norm(json!({"name": "Quinn", "tag": ["vip", "partner, vip"]}));
    assert_eq!(r.tags, vec!["vip", "partner", "vip"]);
  }

  #[test]
  fn tags_of_reads_without_naming() {
    let p = RawAnalysisPayload::from_text("```json\n{\"keywords\":\"a b c d\"}\n```");
    assert_eq!(tags_of(&p), vec!["a", "b", "c"]);
  }

  #[test]
  fn keywords_of_reads_embedded_objects() {
    let fenced = RawAnalysisPayload::from_text("```json\n{\"name\":\"Bob\",\"keywords\":\"solar robotics\"}\n```");
    assert_eq!(keywords_of(&fenced).as_deref(), Some("solar robotics"));

    let listed = RawAnalysisPayload::from_value(json!({"keywords": ["ai", "sales, expo"]}));
    assert_eq!(keywords_of(&listed).as_deref(), Some("ai, sales, expo"));

    assert_eq!(keywords_of(&RawAnalysisPayload::from_text("just prose")), None);
    assert_eq!(keywords_of(&RawAnalysisPayload::from_value(json!({"keywords": ""}))), None);
  }

  // ── Idempotence ────────────────────────────────────────────────────────────

  #[test]
  fn renormalizing_the_raw_payload_is_stable() {
    for p in [
      RawAnalysisPayload::from_value(json!({"name": "Alice", "summary": "expo", "tag": "a"})),
      RawAnalysisPayload::from_text("```json\n{\"name\":\"Bob\",\"tag\":\"vip, partner\"}\n```"),
      RawAnalysisPayload::from_text("Rosa Diaz\nwants a demo"),
      RawAnalysisPayload::from_text("nothing {here}"),
    ] {
      let first = normalize_at(&p, at());
      let again = normalize_at(&RawAnalysisPayload::from_value(first.raw_payload.clone()), at());
      assert_eq!(first, again);
    }
  }

  // ── Re-extraction ──────────────────────────────────────────────────────────

  #[test]
  fn reextract_reads_structured_fields() {
    let p = RawAnalysisPayload::from_value(json!({"contact_name": "Sam", "description": "d"}));
    assert_eq!(
      reextract(&p),
      Some(Reextracted { name: "Sam".into(), summary: Some("d".into()) })
    );
  }

  #[test]
  fn reextract_falls_back_to_pattern() {
    let p = RawAnalysisPayload::from_text("analysis: \"name\": \"Carol\" and more");
    assert_eq!(reextract(&p).map(|r| r.name), Some("Carol".into()));
  }

  #[test]
  fn reextract_reads_fields_of_fenced_object() {
    let p = RawAnalysisPayload::from_text("```json\n{\"name\":\"Carol\",\"summary\":\"met at expo\"}\n```");
    assert_eq!(
      reextract(&p),
      Some(Reextracted { name: "Carol".into(), summary: Some("met at expo".into()) })
    );

    let p = RawAnalysisPayload::from_text("noted: {\"who\": \"Uma\", \"description\": \"booth 4\"}");
    assert_eq!(
      reextract(&p),
      Some(Reextracted { name: "Uma".into(), summary: Some("booth 4".into()) })
    );
  }

  #[test]
  fn reextract_skips_line_heuristic() {
    let p = RawAnalysisPayload::from_text("Tess Ng\nmet at the expo");
    assert_eq!(reextract(&p), None);
  }

  #[test]
  fn reextract_rejects_placeholders() {
    let p = RawAnalysisPayload::from_value(json!({"name": "Unknown"}));
    assert_eq!(reextract(&p), None);
  }
}
