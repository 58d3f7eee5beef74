// src/runtime/control.rs

use crate::protocol::types::SequencedReply;
use crate::runtime::mailbox::MailboxSender;
use crate::session::SessionInfo;

/// Messages consumed by the presence hub, one at a time, in strict arrival
/// order. The hub is the only consumer; connections and handlers only ever
/// hold the sending side.
///
/// Each variant carries exactly the payload its operation needs, so a
/// mismatched tag/payload pair cannot be constructed.
#[derive(Debug, Clone)]
pub enum ControlEvent {
  /// A connection authenticated and its mailbox is ready to receive events.
  Connect {
    session: SessionInfo,
    conn_id: usize,
    mailbox: MailboxSender,
  },
  /// A connection is gone and must leave the presence indexes.
  Disconnect { session: SessionInfo, conn_id: usize },
  /// A domain event to fan out to the relevant mailboxes.
  Broadcast(DomainEvent),
  /// A correlated reply heading back through the originating connection.
  Reply { conn_id: usize, reply: SequencedReply },
}

/// Broadcast-worthy things a request handler did.
#[derive(Debug, Clone)]
pub enum DomainEvent {
  /// A message was sent; the sender's and recipient's mailboxes each get
  /// their own variant of the wire event.
  NewMessage {
    user_from: u64,
    user_to: u64,
    ts: String,
    text: String,
  },
  /// A timeline post was created; fans out to every connected session.
  NewTimelineStatus {
    user_id: u64,
    user_name: String,
    ts: String,
    text: String,
  },
  /// A friend request was filed against `user_id`.
  FriendRequest { user_id: u64 },
}

impl ControlEvent {
  pub fn variant_name(&self) -> &'static str {
    match self {
      ControlEvent::Connect { .. } => "Connect",
      ControlEvent::Disconnect { .. } => "Disconnect",
      ControlEvent::Broadcast(ev) => ev.variant_name(),
      ControlEvent::Reply { .. } => "Reply",
    }
  }
}

impl DomainEvent {
  pub fn variant_name(&self) -> &'static str {
    match self {
      DomainEvent::NewMessage { .. } => "NewMessage",
      DomainEvent::NewTimelineStatus { .. } => "NewTimelineStatus",
      DomainEvent::FriendRequest { .. } => "FriendRequest",
    }
  }
}
