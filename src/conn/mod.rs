// src/conn/mod.rs

//! Per-connection plumbing: credential handshake, hub registration and the
//! reader/writer task pair.
//!
//! Each connection owns exactly two tasks: the reader (request pipeline) and
//! the writer (sole owner of the transport's write side). They share nothing
//! but the mailbox.

mod reader;
mod writer;

use crate::dispatch::HandlerRegistry;
use crate::error::SonetError;
use crate::hub::HubHandle;
use crate::protocol::codec::RequestCodec;
use crate::protocol::AUTH_ERROR_SENTINEL;
use crate::runtime::control::ControlEvent;
use crate::runtime::mailbox::mailbox;
use crate::session::{Authenticator, SessionInfo};

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::codec::FramedRead;

/// Longest accepted credential line, including the newline.
const MAX_CREDENTIAL_LINE: u64 = 1024;

/// Drives one client connection to completion: authenticate, register with
/// the hub, run the request loop, deregister. Generic over the transport
/// halves so tests can exercise it without sockets.
pub async fn handle_connection<R, W>(
  conn_id: usize,
  read_half: R,
  write_half: W,
  hub: HubHandle,
  registry: Arc<HandlerRegistry>,
  authenticator: Arc<dyn Authenticator>,
  mailbox_capacity: usize,
) -> Result<(), SonetError>
where
  R: AsyncRead + Unpin + Send + 'static,
  W: AsyncWrite + Unpin + Send + 'static,
{
  let mut read_half = BufReader::new(read_half);
  let mut write_half = write_half;

  let session = match authenticate(&mut read_half, authenticator.as_ref()).await {
    Ok(session) => session,
    Err(e) => {
      tracing::info!(conn_id, error = %e, "rejecting unauthenticated connection");
      let _ = write_half.write_all(AUTH_ERROR_SENTINEL.as_bytes()).await;
      let _ = write_half.shutdown().await;
      return Err(e);
    }
  };
  tracing::info!(conn_id, user = %session.name, user_id = session.id, "connection authenticated");

  let (mailbox_tx, mailbox_rx) = mailbox(mailbox_capacity);
  let writer_task = tokio::spawn(writer::run_writer_loop(conn_id, write_half, mailbox_rx));

  // Register before reading the first request so the presence snapshot is
  // the first thing in the mailbox.
  hub
    .send(ControlEvent::Connect {
      session: session.clone(),
      conn_id,
      mailbox: mailbox_tx.clone(),
    })
    .await?;

  let requests = FramedRead::new(read_half, RequestCodec::new());
  reader::run_request_loop(conn_id, session.clone(), requests, registry, hub.clone(), mailbox_tx).await;

  if hub
    .send(ControlEvent::Disconnect {
      session: session.clone(),
      conn_id,
    })
    .await
    .is_err()
  {
    tracing::warn!(conn_id, "hub gone before disconnect could be delivered");
  }

  let _ = writer_task.await;
  tracing::info!(conn_id, user = %session.name, "connection closed");
  Ok(())
}

async fn authenticate<R>(
  read_half: &mut BufReader<R>,
  authenticator: &dyn Authenticator,
) -> Result<SessionInfo, SonetError>
where
  R: AsyncRead + Unpin,
{
  let mut credential = String::new();
  let mut limited = (&mut *read_half).take(MAX_CREDENTIAL_LINE);
  let n = limited
    .read_line(&mut credential)
    .await
    .map_err(|e| SonetError::AuthenticationFailure(format!("could not read credential line: {}", e)))?;

  if n == 0 {
    return Err(SonetError::ConnectionClosed);
  }
  if !credential.ends_with('\n') && n as u64 >= MAX_CREDENTIAL_LINE {
    return Err(SonetError::AuthenticationFailure("credential line too long".into()));
  }

  let credential = credential.trim_end_matches(['\r', '\n']);
  authenticator.authenticate(credential).await
}
