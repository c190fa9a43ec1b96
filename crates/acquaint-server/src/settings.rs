//! Server configuration: an optional TOML file layered under `ACQUAINT_*`
//! environment variables (`__` separates nested keys, e.g.
//! `ACQUAINT_WORKFLOW__API_KEY`).

use std::path::{Path, PathBuf};

use acquaint_api::{ApiSettings, DEFAULT_MAX_UPLOAD_BYTES};
use acquaint_workflow::WorkflowConfig;
use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  /// Origin under which `/images` is reachable by the workflow service.
  /// Defaults to `http://<host>:<port>`.
  #[serde(default)]
  pub public_base_url:    Option<String>,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  #[serde(default = "default_image_dir")]
  pub image_dir:          PathBuf,
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes:   usize,
  #[serde(default = "default_allow_registration")]
  pub allow_registration: bool,
  #[serde(default)]
  pub workflow:           Option<WorkflowConfig>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/acquaint/acquaint.db") }
fn default_image_dir() -> PathBuf { PathBuf::from("~/.local/share/acquaint/images") }
fn default_max_upload_bytes() -> usize { DEFAULT_MAX_UPLOAD_BYTES }
fn default_allow_registration() -> bool { true }

impl ServerConfig {
  /// Read `file` (if it exists) and the environment.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("ACQUAINT")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?;

    let mut cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.image_dir = expand_tilde(&cfg.image_dir);
    Ok(cfg)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn public_base_url(&self) -> String {
    self
      .public_base_url
      .clone()
      .unwrap_or_else(|| format!("http://{}", self.address()))
  }

  pub fn api_settings(&self) -> ApiSettings {
    ApiSettings {
      allow_registration: self.allow_registration,
      max_upload_bytes:   self.max_upload_bytes,
    }
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
