// src/runtime/mailbox.rs

//! Type aliases for connection mailboxes based on `async-channel`.

use crate::protocol::types::OutboundEvent;

/// The sending end of a connection's mailbox.
/// Cloneable: the hub and the connection's own request pipeline both hold one.
/// Every producer sends non-blockingly; a full mailbox drops the event.
pub type MailboxSender = async_channel::Sender<OutboundEvent>;

/// The receiving end of a connection's mailbox.
/// Owned exclusively by the connection's writer loop, which drains values in
/// arrival order onto the transport.
pub type MailboxReceiver = async_channel::Receiver<OutboundEvent>;

/// Default capacity for connection mailboxes.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;

/// Default capacity of the presence hub's inbound control-event queue.
pub const DEFAULT_CONTROL_QUEUE_CAPACITY: usize = 200;

/// Creates a new bounded mailbox channel pair.
/// This is the standard way to create the outbound queue for a connection.
pub fn mailbox(capacity: usize) -> (MailboxSender, MailboxReceiver) {
  async_channel::bounded(capacity.max(1))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_mailbox_rejects_without_blocking_or_growing() {
    let (tx, rx) = mailbox(1);
    tx.try_send(OutboundEvent::Shutdown).unwrap();

    let err = tx.try_send(OutboundEvent::Shutdown).unwrap_err();
    assert!(err.is_full());
    assert_eq!(rx.len(), 1);
  }

  #[test]
  fn zero_capacity_is_clamped_to_one() {
    let (tx, _rx) = mailbox(0);
    tx.try_send(OutboundEvent::Shutdown).unwrap();
  }

  #[test]
  fn closed_mailbox_drains_then_reports_closed() {
    let (tx, rx) = mailbox(4);
    tx.try_send(OutboundEvent::Shutdown).unwrap();
    tx.close();

    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
  }
}
