// src/dispatch.rs

//! Request dispatch: the handler contract and the registry that maps
//! request-type tokens to handlers.
//!
//! The registry is built once at startup and is an explicit table; there is
//! no name-based lookup magic between a wire token and the code that serves
//! it.

use crate::protocol::types::ReplyBody;
use crate::session::SessionInfo;

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// A user-facing failure reported by a handler: a safe public message plus
/// an optional internal error that is only ever logged server-side.
#[derive(Debug)]
pub struct HandlerError {
  pub user_msg: String,
  pub internal: Option<anyhow::Error>,
}

impl HandlerError {
  /// An error that is entirely the user's business (validation and the like).
  pub fn user(msg: impl Into<String>) -> Self {
    Self {
      user_msg: msg.into(),
      internal: None,
    }
  }

  /// A failure with an internal cause worth logging; the client only sees
  /// `msg`.
  pub fn internal(msg: impl Into<String>, err: impl Into<anyhow::Error>) -> Self {
    Self {
      user_msg: msg.into(),
      internal: Some(err.into()),
    }
  }
}

/// Why a dispatched request produced no reply body.
#[derive(Debug)]
pub enum DispatchError {
  /// The JSON body did not decode into the handler's request type.
  Decode(String),
  /// The handler ran and reported a user-facing error.
  Handler(HandlerError),
}

/// Object-safe handler seam: decodes its own body and produces a reply body.
///
/// Implementations are usually created through [`HandlerRegistry::register`],
/// which pairs a typed async closure with JSON decoding of its request shape.
#[async_trait]
pub trait RequestHandler: Send + Sync {
  async fn call(&self, session: &SessionInfo, body: &[u8]) -> Result<ReplyBody, DispatchError>;
}

struct TypedHandler<Req, F> {
  handler: F,
  _request: PhantomData<fn() -> Req>,
}

#[async_trait]
impl<Req, F, Fut> RequestHandler for TypedHandler<Req, F>
where
  Req: DeserializeOwned + Send,
  F: Fn(SessionInfo, Req) -> Fut + Send + Sync,
  Fut: Future<Output = Result<ReplyBody, HandlerError>> + Send,
{
  async fn call(&self, session: &SessionInfo, body: &[u8]) -> Result<ReplyBody, DispatchError> {
    let request: Req = serde_json::from_slice(body).map_err(|e| DispatchError::Decode(e.to_string()))?;
    (self.handler)(session.clone(), request).await.map_err(DispatchError::Handler)
  }
}

/// Maps request-type tokens (`REQUEST_SEND_MESSAGE`, ...) to handlers.
/// Built once at startup, never mutated afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
  handlers: HashMap<&'static str, Box<dyn RequestHandler>>,
}

impl HandlerRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `handler` for `request_type`. Registering a token twice
  /// replaces the previous handler.
  pub fn register<Req, F, Fut>(&mut self, request_type: &'static str, handler: F)
  where
    Req: DeserializeOwned + Send + 'static,
    F: Fn(SessionInfo, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ReplyBody, HandlerError>> + Send + 'static,
  {
    self.handlers.insert(
      request_type,
      Box::new(TypedHandler {
        handler,
        _request: PhantomData,
      }),
    );
  }

  pub fn get(&self, request_type: &str) -> Option<&dyn RequestHandler> {
    self.handlers.get(request_type).map(|h| h.as_ref())
  }

  pub fn len(&self) -> usize {
    self.handlers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.handlers.is_empty()
  }
}
