// src/runtime/mod.rs

//! Core runtime primitives: per-connection mailboxes and the control events
//! consumed by the presence hub.

pub mod control;
pub mod mailbox;

pub use control::{ControlEvent, DomainEvent};
pub use mailbox::{mailbox, MailboxReceiver, MailboxSender, DEFAULT_CONTROL_QUEUE_CAPACITY, DEFAULT_MAILBOX_CAPACITY};
