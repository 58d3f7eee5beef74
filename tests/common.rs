// tests/common.rs

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sonet::protocol::types::{ReplyBody, ReplyGeneric, RequestSendMessage};
use sonet::{
  Authenticator, DomainEvent, HandlerError, HandlerRegistry, HubHandle, PresenceHub, ServerConfig, SessionInfo,
  SonetError, TcpServer, DEFAULT_CONTROL_QUEUE_CAPACITY,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

static TRACING_INIT: Once = Once::new();

// Can be overridden by the RUST_LOG env variable.
fn setup_tracing() {
  TRACING_INIT.call_once(|| {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sonet=debug,warn"));
    let subscriber = tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_test_writer()
      .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
  });
}

/// Test authenticator: the credential line is `<user_id> <display_name>`.
pub struct TestAuthenticator;

#[async_trait]
impl Authenticator for TestAuthenticator {
  async fn authenticate(&self, credential: &str) -> Result<SessionInfo, SonetError> {
    let (id, name) = credential
      .split_once(' ')
      .ok_or_else(|| SonetError::AuthenticationFailure("bad credential".into()))?;
    let id = id
      .parse::<u64>()
      .map_err(|_| SonetError::AuthenticationFailure("user id is not numeric".into()))?;
    Ok(SessionInfo::new(id, name))
  }
}

/// A small registry exercising the dispatch surface: a trivial success path,
/// a hub-broadcasting path and a handler that panics on purpose.
pub fn test_registry(hub: HubHandle) -> HandlerRegistry {
  let mut registry = HandlerRegistry::new();

  registry.register("REQUEST_PING", |_session: SessionInfo, _req: Value| async move {
    Ok(ReplyBody::Generic(ReplyGeneric { success: true }))
  });

  registry.register(
    sonet::protocol::REQUEST_SEND_MESSAGE,
    move |session: SessionInfo, req: RequestSendMessage| {
      let hub = hub.clone();
      async move {
        if req.text.is_empty() {
          return Err(HandlerError::user("Message text must not be empty"));
        }
        hub
          .broadcast(DomainEvent::NewMessage {
            user_from: session.id,
            user_to: req.user_to,
            ts: "1".into(),
            text: req.text,
          })
          .await
          .map_err(|e| HandlerError::internal("Could not notify hub", e))?;
        Ok(ReplyBody::Generic(ReplyGeneric { success: true }))
      }
    },
  );

  registry.register("REQUEST_BOOM", |_session: SessionInfo, req: Value| async move {
    if req.is_null() {
      return Ok(ReplyBody::Generic(ReplyGeneric { success: true }));
    }
    panic!("handler blew up")
  });

  registry
}

pub struct TestServer {
  pub addr: SocketAddr,
  pub hub: HubHandle,
}

/// Spawns a hub and a TCP server on an ephemeral port with the test registry.
pub async fn start_server() -> TestServer {
  let (hub, _hub_task) = PresenceHub::create_and_spawn(DEFAULT_CONTROL_QUEUE_CAPACITY);
  let registry = test_registry(hub.clone());
  start_server_with(hub, registry).await
}

pub async fn start_server_with(hub: HubHandle, registry: HandlerRegistry) -> TestServer {
  setup_tracing();
  let config = ServerConfig {
    bind: "127.0.0.1:0".to_string(),
    ..ServerConfig::default()
  };
  let (addr, _accept_task) =
    TcpServer::create_and_spawn(config, hub.clone(), Arc::new(registry), Arc::new(TestAuthenticator))
      .expect("could not start test server");
  TestServer { addr, hub }
}

/// A raw protocol client speaking the line framing by hand.
pub struct TestClient {
  lines: Lines<BufReader<OwnedReadHalf>>,
  write: OwnedWriteHalf,
}

impl TestClient {
  /// Connects and authenticates as the given user. The first server event
  /// (the presence snapshot) is left for the test to consume.
  pub async fn connect(addr: SocketAddr, user_id: u64, name: &str) -> TestClient {
    let stream = TcpStream::connect(addr).await.expect("could not connect");
    let (read, write) = stream.into_split();
    let mut client = TestClient {
      lines: BufReader::new(read).lines(),
      write,
    };
    client.send_raw(&format!("{} {}\n", user_id, name)).await;
    client
  }

  pub async fn send_raw(&mut self, data: &str) {
    self.write.write_all(data.as_bytes()).await.expect("could not write");
  }

  pub async fn send_request(&mut self, request_type: &str, seq_id: i64, body: &str) {
    self.send_raw(&format!("{} {}\n{}\n", request_type, seq_id, body)).await;
  }

  /// Next server message as JSON, failing the test after a timeout.
  pub async fn next_json(&mut self) -> Value {
    let line = timeout(RECV_TIMEOUT, self.lines.next_line())
      .await
      .expect("timed out waiting for a server message")
      .expect("read error")
      .expect("server closed the connection");
    serde_json::from_str(&line).expect("server sent invalid JSON")
  }

  /// Next server message, asserting its `Type` tag.
  pub async fn expect_type(&mut self, expected: &str) -> Value {
    let value = self.next_json().await;
    assert_eq!(value["Type"], expected, "unexpected message: {}", value);
    value
  }

  /// Asserts the server closed the connection (EOF) within the timeout.
  pub async fn expect_closed(&mut self) {
    let line = timeout(RECV_TIMEOUT, self.lines.next_line())
      .await
      .expect("timed out waiting for the connection to close")
      .expect("read error");
    assert!(line.is_none(), "expected EOF, got: {:?}", line);
  }
}

/// Connects without authenticating and returns everything the server wrote
/// before closing.
pub async fn connect_raw_and_collect(addr: SocketAddr, to_send: &str) -> String {
  let mut stream = TcpStream::connect(addr).await.expect("could not connect");
  stream.write_all(to_send.as_bytes()).await.expect("could not write");
  let mut output = String::new();
  timeout(RECV_TIMEOUT, stream.read_to_string(&mut output))
    .await
    .expect("timed out waiting for the server to close")
    .expect("read error");
  output
}
