//! til-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), layered with
//! `TIL_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP.
//!
//! # Creating an administrator
//!
//! Administrators cannot register over HTTP. Create one with:
//!
//! ```text
//! cargo run -p til-server -- --bootstrap-admin root
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use til_api::{AppState, auth::hash_password};
use til_core::{
  feed::FeedLimits,
  projection::PopulateConfig,
  store::TilStore,
  user::NewUser,
};
use til_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "TIL journal server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create an administrator with this handle, reading the password from
  /// stdin, and exit.
  #[arg(long, value_name = "HANDLE")]
  bootstrap_admin: Option<String>,
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration.
#[derive(Debug, Deserialize)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host:       String,
  #[serde(default = "default_port")]
  port:       u16,
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
  #[serde(default)]
  populate:   PopulateConfig,
  #[serde(default)]
  feed:       FeedLimits,
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/til/til.db") }

fn load_config(path: &Path) -> anyhow::Result<ServerConfig> {
  config::Config::builder()
    .add_source(config::File::from(path).required(false))
    .add_source(
      config::Environment::with_prefix("TIL")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read config file")?
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

// ─── Entry point ─────────────────────────────────────────────────────────────

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
  let server_cfg = load_config(&cli.config)?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(handle) = cli.bootstrap_admin {
    return bootstrap_admin(&store, handle).await;
  }

  let state = AppState::new(Arc::new(store), server_cfg.populate, server_cfg.feed);
  let app = til_api::api_router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn bootstrap_admin(store: &SqliteStore, handle: String) -> anyhow::Result<()> {
  if store.get_credentials(&handle).await?.is_some() {
    anyhow::bail!("handle {handle} is already taken");
  }
  let password = read_password()?;
  anyhow::ensure!(!password.is_empty(), "password must not be empty");

  let user = store
    .add_user(NewUser {
      handle:        handle.clone(),
      password_hash: hash_password(&password)?,
      avatar:        None,
      bio:           None,
      is_admin:      true,
    })
    .await
    .context("failed to create administrator")?
    .with_context(|| format!("handle {handle} is already taken"))?;
  tracing::info!(user_id = %user.user_id, handle = %user.handle, "administrator created");
  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use config::{Config, File, FileFormat};

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    Config::builder()
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse("");
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.populate, PopulateConfig::default());
    assert_eq!(cfg.feed, FeedLimits::default());
  }

  #[test]
  fn projections_are_configurable() {
    let cfg = parse(
      r#"
        port = 9000
        store_path = "/tmp/til.db"

        [populate]
        user = ["handle"]

        [feed]
        max_page_size = 20
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.store_path, PathBuf::from("/tmp/til.db"));
    assert_eq!(cfg.populate.user.fields(), ["handle"]);
    assert_eq!(cfg.populate.directory, PopulateConfig::default().directory);
    assert_eq!(cfg.feed.max_page_size, 20);
    assert_eq!(cfg.feed.default_page_size, 50);
  }

  #[test]
  fn tilde_is_expanded() {
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(expand_tilde(Path::new("~/til.db")), PathBuf::from(home).join("til.db"));
    }
    assert_eq!(expand_tilde(Path::new("/abs/til.db")), PathBuf::from("/abs/til.db"));
  }
}
