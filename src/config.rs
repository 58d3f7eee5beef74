// src/config.rs

use crate::runtime::{DEFAULT_CONTROL_QUEUE_CAPACITY, DEFAULT_MAILBOX_CAPACITY};

use serde::{Deserialize, Serialize};

/// Server tuning knobs.
///
/// Capacities are fixed at startup: each connection's mailbox is sized at
/// registration time and never resized, and the hub's control queue is the
/// only buffer between producers and the dispatch loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Address the TCP listener binds to.
  pub bind: String,
  /// Capacity of each connection's outbound mailbox.
  pub mailbox_capacity: usize,
  /// Capacity of the hub's inbound control-event queue.
  pub control_queue_capacity: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: "127.0.0.1:8080".to_string(),
      mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
      control_queue_capacity: DEFAULT_CONTROL_QUEUE_CAPACITY,
    }
  }
}
