// src/lib.rs

//! sonet - the real-time core of a small social network.
//!
//! One presence hub task owns the connection/session indexes and every
//! routing decision; each client connection gets a bounded outbound mailbox,
//! a reader task that frames and dispatches requests, and a writer task that
//! is the sole owner of the transport's write side. All cross-task
//! communication is message passing; there are no shared locks around the
//! presence state.

/// Server tuning knobs (bind address, queue capacities).
pub mod config;
/// Per-connection plumbing: handshake, reader and writer loops.
pub mod conn;
/// The handler contract and the startup-built request registry.
pub mod dispatch;
/// Defines custom error types used throughout the library.
pub mod error;
/// The presence hub actor owning the connection/session indexes.
pub mod hub;
/// Wire-level protocol: framing, request/reply/event types, naming rules.
pub mod protocol;
/// Core runtime primitives: mailboxes and hub control events.
pub mod runtime;
/// Authenticated session identity and the authentication seam.
pub mod session;
/// Network front ends (TCP listener and accept loop).
pub mod transport;

// Re-export the types most users need, making them accessible directly from
// the crate root (e.g. `sonet::SonetError`, `sonet::PresenceHub`).
pub use config::ServerConfig;
pub use dispatch::{DispatchError, HandlerError, HandlerRegistry, RequestHandler};
pub use error::SonetError;
pub use hub::{HubHandle, PresenceHub};
pub use runtime::{
  mailbox, ControlEvent, DomainEvent, MailboxReceiver, MailboxSender, DEFAULT_CONTROL_QUEUE_CAPACITY,
  DEFAULT_MAILBOX_CAPACITY,
};
pub use session::{Authenticator, SessionInfo};
pub use transport::tcp::TcpServer;
