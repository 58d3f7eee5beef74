// src/conn/reader.rs

use crate::dispatch::{DispatchError, HandlerRegistry};
use crate::hub::HubHandle;
use crate::protocol::codec::RequestCodec;
use crate::protocol::types::{OutboundEvent, SequencedReply, SequencedRequest};
use crate::runtime::mailbox::MailboxSender;
use crate::session::SessionInfo;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::{FutureExt, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

/// Per-connection request loop: frames requests, dispatches them through the
/// registry and forwards every outcome to the hub as a reply control event.
///
/// Dispatch is sequential per connection; a slow handler stalls only this
/// connection's later requests, never the hub or anyone else. Returns when
/// the transport fails, the client goes away, or a framing violation makes
/// the stream unreadable.
pub(crate) async fn run_request_loop<R>(
  conn_id: usize,
  session: SessionInfo,
  mut requests: FramedRead<R, RequestCodec>,
  registry: Arc<HandlerRegistry>,
  hub: HubHandle,
  mailbox: MailboxSender,
) where
  R: AsyncRead + Unpin,
{
  loop {
    let request = match requests.next().await {
      Some(Ok(request)) => request,
      Some(Err(e)) => {
        tracing::debug!(conn_id, user = %session.name, error = %e, "could not read request");
        break;
      }
      None => {
        tracing::debug!(conn_id, user = %session.name, "client closed the connection");
        break;
      }
    };

    let reply = dispatch_request(conn_id, &session, &registry, &request).await;
    if hub.reply(conn_id, reply).await.is_err() {
      tracing::warn!(conn_id, "hub gone, stopping request loop");
      break;
    }
  }

  // Ask the writer to stop. The sentinel enqueue is non-blocking and may be
  // dropped by a full mailbox, so closing the channel is the backstop; the
  // writer drains what is left and exits either way.
  let _ = mailbox.try_send(OutboundEvent::Shutdown);
  mailbox.close();
}

async fn dispatch_request(
  conn_id: usize,
  session: &SessionInfo,
  registry: &HandlerRegistry,
  request: &SequencedRequest,
) -> SequencedReply {
  let Some(handler) = registry.get(&request.request_type) else {
    tracing::debug!(conn_id, request_type = %request.request_type, "unknown request type");
    return SequencedReply::error(
      request.seq_id,
      format!("Invalid request type: {}", request.request_type),
    );
  };

  let start = Instant::now();
  let outcome = AssertUnwindSafe(handler.call(session, &request.body))
    .catch_unwind()
    .await;
  tracing::debug!(
    conn_id,
    request_type = %request.request_type,
    seq_id = request.seq_id,
    elapsed = ?start.elapsed(),
    "request processed"
  );

  match outcome {
    Ok(Ok(body)) => SequencedReply::new(request.seq_id, body),
    Ok(Err(DispatchError::Decode(message))) => {
      SequencedReply::error(request.seq_id, format!("Cannot decode request: {}", message))
    }
    Ok(Err(DispatchError::Handler(handler_error))) => {
      if let Some(internal) = &handler_error.internal {
        tracing::error!(
          conn_id,
          request_type = %request.request_type,
          error = %internal,
          "handler reported internal error"
        );
      }
      SequencedReply::error(request.seq_id, handler_error.user_msg)
    }
    Err(panic) => {
      tracing::error!(
        conn_id,
        request_type = %request.request_type,
        panic = %panic_message(&panic),
        "handler panicked"
      );
      SequencedReply::error(request.seq_id, "Internal error")
    }
  }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = panic.downcast_ref::<String>() {
    s.clone()
  } else {
    "non-string panic payload".to_string()
  }
}
