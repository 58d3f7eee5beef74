// tests/backpressure.rs
//
// Backpressure and isolation: a slow consumer loses events instead of
// stalling anyone, and one connection's failures never leak into another's
// mailbox.

mod common;

use std::time::Duration;

use common::{start_server, TestClient};
use sonet::protocol::types::{OutboundEvent, SequencedReply, ServerEvent};
use sonet::{mailbox, ControlEvent, DomainEvent, PresenceHub, SessionInfo};
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn events_beyond_mailbox_capacity_are_dropped_silently() {
  let (hub, _task) = PresenceHub::create_and_spawn(32);

  // Capacity 1: the connect snapshot occupies the only slot, so everything
  // broadcast before the writer would have drained is dropped.
  let (dave_tx, dave_rx) = mailbox(1);
  hub
    .send(ControlEvent::Connect {
      session: SessionInfo::new(13, "Dave"),
      conn_id: 1,
      mailbox: dave_tx,
    })
    .await
    .unwrap();

  let (erin_tx, erin_rx) = mailbox(16);
  hub
    .send(ControlEvent::Connect {
      session: SessionInfo::new(15, "Erin"),
      conn_id: 2,
      mailbox: erin_tx,
    })
    .await
    .unwrap();

  for text in ["first", "second"] {
    hub
      .broadcast(DomainEvent::NewTimelineStatus {
        user_id: 15,
        user_name: "Erin".into(),
        ts: "1".into(),
        text: text.into(),
      })
      .await
      .unwrap();
  }

  // The hub is still fully responsive: Erin sees her snapshot and both
  // broadcasts.
  let mut erin_events = Vec::new();
  for _ in 0..3 {
    let outbound = timeout(RECV_TIMEOUT, erin_rx.recv()).await.unwrap().unwrap();
    erin_events.push(outbound);
  }
  assert!(matches!(
    erin_events[1],
    OutboundEvent::Event(ServerEvent::NewTimelineStatus(_))
  ));
  assert!(matches!(
    erin_events[2],
    OutboundEvent::Event(ServerEvent::NewTimelineStatus(_))
  ));

  // Dave's mailbox never grew past its capacity: just the snapshot.
  assert_eq!(dave_rx.len(), 1);
  assert!(matches!(
    dave_rx.try_recv().unwrap(),
    OutboundEvent::Event(ServerEvent::OnlineUsersList { .. })
  ));
  assert!(dave_rx.try_recv().is_err());
}

#[tokio::test]
async fn hub_replies_do_not_block_on_a_full_mailbox() {
  let (hub, _task) = PresenceHub::create_and_spawn(32);

  let (stuck_tx, stuck_rx) = mailbox(1);
  hub
    .send(ControlEvent::Connect {
      session: SessionInfo::new(21, "Stuck"),
      conn_id: 1,
      mailbox: stuck_tx,
    })
    .await
    .unwrap();

  // The snapshot filled the mailbox; a pile of replies must neither block
  // the hub nor raise the mailbox above its capacity.
  for seq_id in 0..50 {
    hub.reply(1, SequencedReply::error(seq_id, "dropped")).await.unwrap();
  }

  let (probe_tx, probe_rx) = mailbox(4);
  hub
    .send(ControlEvent::Connect {
      session: SessionInfo::new(22, "Probe"),
      conn_id: 2,
      mailbox: probe_tx,
    })
    .await
    .unwrap();
  let outbound = timeout(RECV_TIMEOUT, probe_rx.recv()).await.unwrap().unwrap();
  assert!(matches!(outbound, OutboundEvent::Event(ServerEvent::OnlineUsersList { .. })));

  assert_eq!(stuck_rx.len(), 1);
}

#[tokio::test]
async fn panic_on_one_connection_leaves_the_other_untouched() {
  let server = start_server().await;

  let mut alice = TestClient::connect(server.addr, 7, "Alice").await;
  alice.expect_type("EVENT_ONLINE_USERS_LIST").await;
  let mut bob = TestClient::connect(server.addr, 9, "Bob").await;
  bob.expect_type("EVENT_ONLINE_USERS_LIST").await;
  alice.expect_type("EVENT_USER_CONNECTED").await;

  // Alice's handler panics; Bob is mid-conversation and never notices.
  alice.send_request("REQUEST_BOOM", 3, "{}").await;
  bob.send_request("REQUEST_PING", 8, "{}").await;

  let reply = alice.expect_type("REPLY_ERROR").await;
  assert_eq!(reply["SeqId"], 3);
  assert_eq!(reply["Message"], "Internal error");

  let reply = bob.expect_type("REPLY_GENERIC").await;
  assert_eq!(reply["SeqId"], 8);
  assert_eq!(reply["Success"], true);

  // Both connections are still serviceable.
  alice.send_request("REQUEST_PING", 5, "{}").await;
  let reply = alice.expect_type("REPLY_GENERIC").await;
  assert_eq!(reply["SeqId"], 5);
}
