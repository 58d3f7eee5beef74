// src/transport/tcp.rs

use crate::config::ServerConfig;
use crate::conn;
use crate::dispatch::HandlerRegistry;
use crate::error::SonetError;
use crate::hub::HubHandle;
use crate::session::Authenticator;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener as TokioTcpListener;
use tokio::task::JoinHandle;

/// Process-wide connection id source, so ids stay unique even if more than
/// one listener feeds the same hub.
static NEXT_CONN_ID: AtomicUsize = AtomicUsize::new(1);

/// TCP front end: binds the listener and spawns one connection task per
/// accepted socket.
pub struct TcpServer;

impl TcpServer {
  /// Binds `config.bind` and spawns the accept loop. Returns the resolved
  /// local address (useful when binding port 0) and the accept-loop handle.
  pub fn create_and_spawn(
    config: ServerConfig,
    hub: HubHandle,
    registry: Arc<HandlerRegistry>,
    authenticator: Arc<dyn Authenticator>,
  ) -> Result<(SocketAddr, JoinHandle<()>), SonetError> {
    let bind_addr: SocketAddr = config.bind.parse().map_err(|e| {
      SonetError::InvalidEndpoint(format!("could not parse bind address {:?}: {}", config.bind, e))
    })?;

    let domain = if bind_addr.is_ipv4() {
      socket2::Domain::IPV4
    } else {
      socket2::Domain::IPV6
    };
    let socket = socket2::Socket::new(domain, socket2::Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket
      .bind(&bind_addr.into())
      .map_err(|e| SonetError::from_io_endpoint(e, &config.bind))?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    let listener = TokioTcpListener::from_std(std_listener)?;
    let local_addr = listener.local_addr()?;
    tracing::info!(local_addr = %local_addr, "TCP listener bound");

    let task = tokio::spawn(run_accept_loop(listener, config, hub, registry, authenticator));
    Ok((local_addr, task))
  }
}

async fn run_accept_loop(
  listener: TokioTcpListener,
  config: ServerConfig,
  hub: HubHandle,
  registry: Arc<HandlerRegistry>,
  authenticator: Arc<dyn Authenticator>,
) {
  loop {
    let (stream, peer) = match listener.accept().await {
      Ok(accepted) => accepted,
      Err(e) => {
        // Transient accept failures (e.g. fd exhaustion) must not spin.
        tracing::warn!(error = %e, "accept failed");
        tokio::time::sleep(Duration::from_millis(100)).await;
        continue;
      }
    };

    let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(conn_id, peer = %peer, "accepted connection");
    if let Err(e) = stream.set_nodelay(true) {
      tracing::debug!(conn_id, error = %e, "could not set TCP_NODELAY");
    }

    let (read_half, write_half) = stream.into_split();
    let hub = hub.clone();
    let registry = registry.clone();
    let authenticator = authenticator.clone();
    let mailbox_capacity = config.mailbox_capacity;
    tokio::spawn(async move {
      if let Err(e) = conn::handle_connection(
        conn_id,
        read_half,
        write_half,
        hub,
        registry,
        authenticator,
        mailbox_capacity,
      )
      .await
      {
        tracing::debug!(conn_id, error = %e, "connection ended with error");
      }
    });
  }
}
