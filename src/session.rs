// src/session.rs

//! Authenticated session identity and the seam to the external session store.

use crate::error::SonetError;

use async_trait::async_trait;

/// Identity attached to a connection when it authenticates.
///
/// Created once by the [`Authenticator`] and never mutated for the lifetime
/// of the connection; the hub keeps its own copy in the presence table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
  pub id: u64,
  pub name: String,
}

impl SessionInfo {
  pub fn new(id: u64, name: impl Into<String>) -> Self {
    Self { id, name: name.into() }
  }
}

/// Resolves transport-level credentials (e.g. a session cookie value) into a
/// [`SessionInfo`].
///
/// Session token storage lives outside this crate; the pipeline only cares
/// whether the credential maps to a user. A failed lookup rejects the
/// connection before it ever reaches the request loop.
#[async_trait]
pub trait Authenticator: Send + Sync {
  async fn authenticate(&self, credential: &str) -> Result<SessionInfo, SonetError>;
}
