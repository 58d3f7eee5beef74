mod auth;
mod cli;
mod handlers;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sonet::{PresenceHub, ServerConfig, TcpServer};

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let args = Cli::parse();

  let mut config = match &args.config {
    Some(path) => {
      let contents = fs::read_to_string(path).with_context(|| format!("could not read config {}", path.display()))?;
      serde_json::from_str::<ServerConfig>(&contents)
        .with_context(|| format!("could not parse config {}", path.display()))?
    }
    None => ServerConfig::default(),
  };
  if let Some(bind) = args.bind {
    config.bind = bind;
  }
  if let Some(capacity) = args.mailbox_capacity {
    config.mailbox_capacity = capacity;
  }
  if let Some(capacity) = args.control_queue_capacity {
    config.control_queue_capacity = capacity;
  }

  let (hub, _hub_task) = PresenceHub::create_and_spawn(config.control_queue_capacity);
  let store = Arc::new(handlers::InMemoryStore::new());
  let registry = Arc::new(handlers::build_registry(store, hub.clone()));
  tracing::info!(handlers = registry.len(), "request registry built");

  let (addr, _accept_task) = TcpServer::create_and_spawn(config, hub, registry, Arc::new(auth::DevAuthenticator))?;
  tracing::info!(%addr, "sonetd listening");

  tokio::signal::ctrl_c().await.context("could not install ctrl-c handler")?;
  tracing::info!("shutting down");
  Ok(())
}
