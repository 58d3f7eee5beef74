// src/conn/writer.rs

use crate::protocol::codec::EventCodec;
use crate::protocol::types::OutboundEvent;
use crate::runtime::mailbox::MailboxReceiver;

use futures::SinkExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::FramedWrite;

/// Single consumer of a connection's mailbox.
///
/// Writes events onto the transport in arrival order; no other task ever
/// touches the write side. Stops on the close sentinel, a closed mailbox,
/// or a write failure, and shuts the transport down on the way out.
pub(crate) async fn run_writer_loop<W>(conn_id: usize, transport: W, mailbox_rx: MailboxReceiver)
where
  W: AsyncWrite + Unpin,
{
  let mut framed = FramedWrite::new(transport, EventCodec::new());

  while let Ok(event) = mailbox_rx.recv().await {
    if matches!(event, OutboundEvent::Shutdown) {
      tracing::debug!(conn_id, "writer received close sentinel");
      break;
    }
    if let Err(e) = framed.send(event).await {
      tracing::debug!(conn_id, error = %e, "write failed, stopping writer");
      break;
    }
  }

  let mut transport = framed.into_inner();
  let _ = transport.shutdown().await;
  tracing::debug!(conn_id, "writer loop stopped");
}
