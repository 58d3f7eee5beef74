// src/hub.rs

//! The presence hub: one task owning the connection/session indexes and
//! every routing decision.
//!
//! All mutation is serialized through the hub's inbound control-event queue,
//! so the indexes need no locks. Delivery into connection mailboxes is
//! always non-blocking: a full mailbox loses that one event and nobody else
//! is affected, so presence and broadcast traffic is best-effort.

use crate::error::SonetError;
use crate::protocol::types::{Message, OutboundEvent, SequencedReply, ServerEvent, TimelineMessage, UserInfo};
use crate::runtime::control::{ControlEvent, DomainEvent};
use crate::runtime::mailbox::MailboxSender;
use crate::session::SessionInfo;

use std::collections::{HashMap, HashSet};

use tokio::task::JoinHandle;

/// Cloneable handle used by connections and handlers to feed the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
  control_tx: async_channel::Sender<ControlEvent>,
}

impl HubHandle {
  /// Enqueues a control event, waiting if the hub queue is momentarily full.
  pub async fn send(&self, event: ControlEvent) -> Result<(), SonetError> {
    self
      .control_tx
      .send(event)
      .await
      .map_err(|_| SonetError::Internal("presence hub is gone".into()))
  }

  pub async fn broadcast(&self, event: DomainEvent) -> Result<(), SonetError> {
    self.send(ControlEvent::Broadcast(event)).await
  }

  pub async fn reply(&self, conn_id: usize, reply: SequencedReply) -> Result<(), SonetError> {
    self.send(ControlEvent::Reply { conn_id, reply }).await
  }
}

struct PresenceEntry {
  session: SessionInfo,
  mailbox: MailboxSender,
}

/// Single-owner presence state. A connection id is present in `presence` iff
/// its Connect has been processed and its Disconnect has not; `user_index`
/// is the exact inverse mapping, with empty sets pruned.
pub struct PresenceHub {
  control_rx: async_channel::Receiver<ControlEvent>,
  presence: HashMap<usize, PresenceEntry>,
  user_index: HashMap<u64, HashSet<usize>>,
}

impl PresenceHub {
  /// Creates the hub and spawns its dispatch loop.
  pub fn create_and_spawn(queue_capacity: usize) -> (HubHandle, JoinHandle<()>) {
    let (control_tx, control_rx) = async_channel::bounded(queue_capacity.max(1));
    let hub = PresenceHub {
      control_rx,
      presence: HashMap::new(),
      user_index: HashMap::new(),
    };
    let task = tokio::spawn(hub.run_dispatch_loop());
    (HubHandle { control_tx }, task)
  }

  async fn run_dispatch_loop(mut self) {
    tracing::info!("presence hub dispatch loop starting");
    while let Ok(event) = self.control_rx.recv().await {
      tracing::trace!(event = event.variant_name(), "hub processing control event");
      match event {
        ControlEvent::Connect {
          session,
          conn_id,
          mailbox,
        } => self.handle_connect(session, conn_id, mailbox),
        ControlEvent::Disconnect { session, conn_id } => self.handle_disconnect(session, conn_id),
        ControlEvent::Broadcast(domain_event) => self.handle_broadcast(domain_event),
        ControlEvent::Reply { conn_id, reply } => self.handle_reply(conn_id, reply),
      }
    }
    tracing::info!("presence hub control queue closed, dispatch loop stopping");
  }

  fn handle_connect(&mut self, session: SessionInfo, conn_id: usize, mailbox: MailboxSender) {
    // Snapshot of who is online right now, before the new connection joins.
    let users: Vec<UserInfo> = self
      .presence
      .values()
      .map(|entry| UserInfo::from_session(&entry.session))
      .collect();
    Self::try_deliver(
      conn_id,
      &mailbox,
      OutboundEvent::Event(ServerEvent::OnlineUsersList { users }),
    );

    self.presence.insert(
      conn_id,
      PresenceEntry {
        session: session.clone(),
        mailbox,
      },
    );
    self.user_index.entry(session.id).or_default().insert(conn_id);
    tracing::debug!(
      conn_id,
      user = %session.name,
      user_id = session.id,
      online = self.presence.len(),
      "connection registered"
    );

    let event = ServerEvent::UserConnected(UserInfo::from_session(&session));
    self.broadcast_except(conn_id, &event);
  }

  fn handle_disconnect(&mut self, session: SessionInfo, conn_id: usize) {
    if self.presence.remove(&conn_id).is_none() {
      tracing::warn!(conn_id, "disconnect for a connection that was never registered");
      return;
    }
    if let Some(conns) = self.user_index.get_mut(&session.id) {
      conns.remove(&conn_id);
      if conns.is_empty() {
        self.user_index.remove(&session.id);
      }
    }
    tracing::debug!(
      conn_id,
      user = %session.name,
      online = self.presence.len(),
      "connection deregistered"
    );

    let event = ServerEvent::UserDisconnected(UserInfo::from_session(&session));
    self.broadcast_all(&event);
  }

  fn handle_broadcast(&mut self, event: DomainEvent) {
    match event {
      DomainEvent::NewMessage {
        user_from,
        user_to,
        ts,
        text,
      } => {
        // Each side gets its own variant: IsOut marks the direction and
        // UserFrom names the correspondent, which is what the client keys
        // its chat windows on. A self-message gets both variants.
        self.deliver_to_user(
          user_from,
          ServerEvent::NewMessage(Message {
            id: 0,
            user_from: user_to.to_string(),
            ts: ts.clone(),
            is_out: true,
            text: text.clone(),
          }),
        );
        self.deliver_to_user(
          user_to,
          ServerEvent::NewMessage(Message {
            id: 0,
            user_from: user_from.to_string(),
            ts,
            is_out: false,
            text,
          }),
        );
      }
      DomainEvent::NewTimelineStatus {
        user_id,
        user_name,
        ts,
        text,
      } => {
        // Fans out to every connected session, friend or not; persisted
        // timeline rows are friends-only.
        let event = ServerEvent::NewTimelineStatus(TimelineMessage {
          id: 0,
          user_id: user_id.to_string(),
          user_name,
          text,
          ts,
        });
        self.broadcast_all(&event);
      }
      DomainEvent::FriendRequest { user_id } => {
        self.deliver_to_user(user_id, ServerEvent::FriendRequest { user_id });
      }
    }
  }

  fn handle_reply(&self, conn_id: usize, reply: SequencedReply) {
    // Guards against replying to a connection that vanished mid-request.
    let Some(entry) = self.presence.get(&conn_id) else {
      tracing::debug!(conn_id, "dropping reply for a deregistered connection");
      return;
    };
    Self::try_deliver(conn_id, &entry.mailbox, OutboundEvent::Reply(reply));
  }

  fn deliver_to_user(&self, user_id: u64, event: ServerEvent) {
    let Some(conns) = self.user_index.get(&user_id) else {
      return;
    };
    for conn_id in conns {
      if let Some(entry) = self.presence.get(conn_id) {
        Self::try_deliver(*conn_id, &entry.mailbox, OutboundEvent::Event(event.clone()));
      }
    }
  }

  fn broadcast_all(&self, event: &ServerEvent) {
    for (conn_id, entry) in &self.presence {
      Self::try_deliver(*conn_id, &entry.mailbox, OutboundEvent::Event(event.clone()));
    }
  }

  fn broadcast_except(&self, skip_conn_id: usize, event: &ServerEvent) {
    for (conn_id, entry) in &self.presence {
      if *conn_id == skip_conn_id {
        continue;
      }
      Self::try_deliver(*conn_id, &entry.mailbox, OutboundEvent::Event(event.clone()));
    }
  }

  /// Non-blocking delivery. A full or closed mailbox drops the event for
  /// that one recipient; everyone else still gets theirs.
  fn try_deliver(conn_id: usize, mailbox: &MailboxSender, event: OutboundEvent) {
    match mailbox.try_send(event) {
      Ok(()) => {}
      Err(async_channel::TrySendError::Full(_)) => {
        tracing::trace!(conn_id, "mailbox full, dropping event");
      }
      Err(async_channel::TrySendError::Closed(_)) => {
        tracing::trace!(conn_id, "mailbox closed, dropping event");
      }
    }
  }
}
