//! `acquaint-workflow`: HTTP client for the hosted image-analysis workflow.
//!
//! [`WorkflowClient`] implements [`Analyzer`]: it runs the workflow in
//! blocking mode with the image passed by URL, and hands back whatever the
//! workflow produced as a [`RawAnalysisPayload`] for the normaliser to
//! interpret.

use std::time::Duration;

use acquaint_core::{ingest::Analyzer, payload::RawAnalysisPayload};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const NO_OUTPUT: &str = "No text output from workflow";
const REQUEST_FAILED: &str = "workflow request failed";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("workflow API key is not configured")]
  MissingApiKey,

  #[error("workflow transport error: {0}")]
  Request(#[from] reqwest::Error),

  #[error("workflow returned {status}: {message}")]
  Api { status: StatusCode, message: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
  /// API root, e.g. `https://workflow.example.com/v1`.
  pub base_url:     String,
  #[serde(default)]
  pub api_key:      Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 120 }

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RunRequest<'a> {
  inputs:        RunInputs<'a>,
  response_mode: &'static str,
  user:          String,
}

#[derive(Serialize)]
struct RunInputs<'a> {
  image: [ImageInput<'a>; 1],
}

#[derive(Serialize)]
struct ImageInput<'a> {
  #[serde(rename = "type")]
  kind:            &'static str,
  transfer_method: &'static str,
  url:             &'a str,
}

#[derive(Deserialize, Default)]
struct RunResponse {
  #[serde(default)]
  data: Option<RunData>,
}

#[derive(Deserialize, Default)]
struct RunData {
  #[serde(default)]
  outputs: Option<Value>,
}

#[derive(Deserialize)]
struct ApiMessage {
  message: Option<String>,
}

/// Pick the analysis text out of the workflow's `outputs` object: `text`,
/// then `result`, then the whole object serialised.
fn output_of(outputs: Option<Value>) -> Value {
  let present = |v: &Value| match v {
    Value::Null | Value::Bool(false) => false,
    Value::String(s) => !s.is_empty(),
    _ => true,
  };

  match outputs {
    None | Some(Value::Null) => Value::String(NO_OUTPUT.to_owned()),
    Some(outputs) => ["text", "result"]
      .iter()
      .find_map(|k| outputs.get(*k).filter(|v| present(v)).cloned())
      .unwrap_or_else(|| Value::String(outputs.to_string())),
  }
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct WorkflowClient {
  client: Client,
  config: WorkflowConfig,
}

impl WorkflowClient {
  pub fn new(config: WorkflowConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self) -> String {
    format!("{}/workflows/run", self.config.base_url.trim_end_matches('/'))
  }

  /// `POST /workflows/run` in blocking mode.
  pub async fn run(&self, image_url: &str, user_id: Uuid) -> Result<RawAnalysisPayload> {
    let api_key = self
      .config
      .api_key
      .as_deref()
      .filter(|k| !k.is_empty())
      .ok_or(Error::MissingApiKey)?;

    let body = RunRequest {
      inputs:        RunInputs {
        image: [ImageInput { kind: "image", transfer_method: "remote_url", url: image_url }],
      },
      response_mode: "blocking",
      user:          user_id.to_string(),
    };

    tracing::debug!(url = %self.url(), %image_url, "running workflow");
    let resp = self
      .client
      .post(self.url())
      .bearer_auth(api_key)
      .json(&body)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let message = resp
        .json::<ApiMessage>()
        .await
        .ok()
        .and_then(|m| m.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| REQUEST_FAILED.to_owned());
      tracing::warn!(%status, %message, "workflow run failed");
      return Err(Error::Api { status, message });
    }

    let run: RunResponse = resp.json().await?;
    let output = output_of(run.data.unwrap_or_default().outputs);
    Ok(RawAnalysisPayload::from_value(output))
  }
}

impl Analyzer for WorkflowClient {
  type Error = Error;

  async fn analyze(&self, image_url: &str, user_id: Uuid) -> Result<RawAnalysisPayload> {
    self.run(image_url, user_id).await
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn text_output_wins() {
    assert_eq!(output_of(Some(json!({"text": "hi", "result": "no"}))), json!("hi"));
  }

  #[test]
  fn empty_text_falls_back_to_result() {
    assert_eq!(output_of(Some(json!({"text": "", "result": "r"}))), json!("r"));
  }

  #[test]
  fn other_outputs_are_serialised() {
    assert_eq!(output_of(Some(json!({"answer": 1}))), json!("{\"answer\":1}"));
  }

  #[test]
  fn missing_outputs_use_placeholder() {
    assert_eq!(output_of(None), json!(NO_OUTPUT));
    assert_eq!(output_of(Some(Value::Null)), json!(NO_OUTPUT));
  }
}
