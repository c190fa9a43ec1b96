//! acquaint server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `ACQUAINT_*`
//! environment variables, opens the SQLite store and the image directory, and
//! serves the JSON API under `/api` and uploaded images under `/images`.
//!
//! # Helper modes
//!
//! ```text
//! acquaint --hash-password   # print an argon2 hash for a password on stdin
//! acquaint --repair          # rename placeholder-named contacts once and exit
//! ```

mod settings;

use std::{path::PathBuf, sync::Arc};

use acquaint_api::AppState;
use acquaint_core::repair::repair_bad_contacts;
use acquaint_store_sqlite::{FsImageStore, SqliteStore};
use acquaint_workflow::WorkflowClient;
use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use settings::ServerConfig;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Acquaint contact memory server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Run the placeholder-name repair job once, print its report and exit.
  #[arg(long, conflicts_with = "hash_password")]
  repair: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = read_password()?;
    println!("{}", acquaint_api::auth::hash_password(&password)?);
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)?;

  if let Some(parent) = cfg.store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  if cli.repair {
    let report = repair_bad_contacts(&store).await.context("repair run failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  serve(cfg, store).await
}

async fn serve(cfg: ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let workflow_cfg = cfg
    .workflow
    .clone()
    .context("missing [workflow] section (at least workflow.base_url)")?;
  if workflow_cfg.api_key.as_deref().is_none_or(str::is_empty) {
    tracing::warn!("workflow.api_key is not set; uploads will fail until it is configured");
  }
  let analyzer = WorkflowClient::new(workflow_cfg).context("failed to build workflow client")?;

  tokio::fs::create_dir_all(&cfg.image_dir)
    .await
    .with_context(|| format!("failed to create image dir {:?}", cfg.image_dir))?;
  let images = FsImageStore::new(&cfg.image_dir, cfg.public_base_url());

  let state = AppState::new(
    Arc::new(store),
    Arc::new(images),
    Arc::new(analyzer),
    cfg.api_settings(),
  );

  let app = Router::new()
    .nest("/api", acquaint_api::api_router(state))
    .nest_service("/images", ServeDir::new(&cfg.image_dir))
    .layer(TraceLayer::new_for_http());

  let address = cfg.address();
  tracing::info!(public_base_url = %cfg.public_base_url(), "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

/// Read one line from stdin as the password.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}
