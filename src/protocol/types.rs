// src/protocol/types.rs

//! Serde types for everything that crosses the wire, shaped to match the
//! JSON the web client already speaks: PascalCase fields, user ids carried
//! as decimal strings, events tagged by a `Type` field.

use crate::protocol::camel_to_upper_snake;
use crate::session::SessionInfo;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Serialize/deserialize a `u64` as a decimal string, the way the original
/// wire format carries large ids.
pub mod stringly {
  use serde::{de, Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(v)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let raw = String::deserialize(d)?;
    raw.parse::<u64>().map_err(de::Error::custom)
  }
}

// --- Shared value types ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserInfo {
  pub name: String,
  pub id: String,
}

impl UserInfo {
  pub fn from_session(session: &SessionInfo) -> Self {
    Self {
      name: session.name.clone(),
      id: session.id.to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserListInfo {
  #[serde(flatten)]
  pub user: UserInfo,
  pub is_friend: bool,
  pub friendship_confirmed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Message {
  pub id: u64,
  pub user_from: String,
  pub ts: String,
  pub is_out: bool,
  pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TimelineMessage {
  pub id: u64,
  pub user_id: String,
  pub user_name: String,
  pub text: String,
  pub ts: String,
}

// --- Requests (client -> server) ---
//
// Missing fields decode to their zero values, as the original JSON decoder
// allowed.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestGetMessages {
  #[serde(with = "stringly")]
  pub user_to: u64,
  pub date_end: String,
  pub limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestSendMessage {
  #[serde(with = "stringly")]
  pub user_to: u64,
  pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestGetTimeline {
  pub date_end: String,
  pub limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestAddToTimeline {
  pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestGetUsersList {
  pub limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestAddFriend {
  pub friend_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestConfirmFriendship {
  pub friend_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestGetMessagesUsers {
  pub limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestGetFriends {
  pub limit: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestGetProfile {
  #[serde(with = "stringly")]
  pub user_id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RequestUpdateProfile {
  pub name: String,
  pub birthdate: String,
  pub sex: i32,
  pub city_name: String,
  pub family_position: i32,
}

// --- Replies (server -> client, correlated by SeqId) ---

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplyMessagesList {
  pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplyUsersList {
  pub users: Vec<UserListInfo>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplyGetFriends {
  pub users: Vec<UserInfo>,
  pub friend_requests: Vec<UserInfo>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplyGetMessagesUsers {
  pub users: Vec<UserInfo>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplyGetTimeline {
  pub messages: Vec<TimelineMessage>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplyGetProfile {
  pub name: String,
  pub birthdate: String,
  pub sex: i32,
  pub description: String,
  #[serde(with = "stringly")]
  pub city_id: u64,
  pub city_name: String,
  pub family_position: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplyGeneric {
  pub success: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReplyError {
  pub message: String,
}

/// The payload of a correlated reply. Serializes without a tag; the wire
/// label comes from [`ReplyBody::wire_type`] and rides in
/// [`SequencedReply::reply_type`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReplyBody {
  MessagesList(ReplyMessagesList),
  UsersList(ReplyUsersList),
  GetFriends(ReplyGetFriends),
  GetMessagesUsers(ReplyGetMessagesUsers),
  GetTimeline(ReplyGetTimeline),
  GetProfile(ReplyGetProfile),
  Generic(ReplyGeneric),
  Error(ReplyError),
}

impl ReplyBody {
  fn type_name(&self) -> &'static str {
    match self {
      ReplyBody::MessagesList(_) => "ReplyMessagesList",
      ReplyBody::UsersList(_) => "ReplyUsersList",
      ReplyBody::GetFriends(_) => "ReplyGetFriends",
      ReplyBody::GetMessagesUsers(_) => "ReplyGetMessagesUsers",
      ReplyBody::GetTimeline(_) => "ReplyGetTimeline",
      ReplyBody::GetProfile(_) => "ReplyGetProfile",
      ReplyBody::Generic(_) => "ReplyGeneric",
      ReplyBody::Error(_) => "ReplyError",
    }
  }

  /// Wire label of this reply: the type name converted to upper snake case,
  /// e.g. `ReplyMessagesList` => `REPLY_MESSAGES_LIST`.
  pub fn wire_type(&self) -> String {
    camel_to_upper_snake(self.type_name())
  }
}

/// A reply stamped with the sequence id of the request it answers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SequencedReply {
  pub seq_id: i64,
  #[serde(rename = "Type")]
  pub reply_type: String,
  #[serde(flatten)]
  pub body: ReplyBody,
}

impl SequencedReply {
  pub fn new(seq_id: i64, body: ReplyBody) -> Self {
    let reply_type = body.wire_type();
    Self { seq_id, reply_type, body }
  }

  pub fn error(seq_id: i64, message: impl Into<String>) -> Self {
    Self::new(seq_id, ReplyBody::Error(ReplyError { message: message.into() }))
  }
}

// --- Events (server -> client, pushed by the hub, no SeqId) ---

/// Uncorrelated events the hub pushes into mailboxes. The `Type` tag is part
/// of the serialized form; clients dispatch on it before looking at `SeqId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum ServerEvent {
  #[serde(rename = "EVENT_ONLINE_USERS_LIST")]
  OnlineUsersList {
    #[serde(rename = "Users")]
    users: Vec<UserInfo>,
  },
  #[serde(rename = "EVENT_USER_CONNECTED")]
  UserConnected(UserInfo),
  #[serde(rename = "EVENT_USER_DISCONNECTED")]
  UserDisconnected(UserInfo),
  #[serde(rename = "EVENT_NEW_MESSAGE")]
  NewMessage(Message),
  #[serde(rename = "EVENT_NEW_TIMELINE_EVENT")]
  NewTimelineStatus(TimelineMessage),
  #[serde(rename = "EVENT_FRIEND_REQUEST")]
  FriendRequest {
    #[serde(rename = "UserId")]
    user_id: u64,
  },
}

// --- Pipeline-internal framing types ---

/// One framed client request: `TYPE_TOKEN <seq_id>\n<json-body>\n`.
/// The body is kept as raw bytes; only the matched handler knows its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedRequest {
  pub request_type: String,
  pub seq_id: i64,
  pub body: Bytes,
}

/// Values carried by a connection mailbox.
///
/// `Shutdown` is the writer-loop close sentinel; it is never serialized onto
/// the wire.
#[derive(Debug, Clone)]
pub enum OutboundEvent {
  Event(ServerEvent),
  Reply(SequencedReply),
  Shutdown,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn reply_wire_types_follow_type_names() {
    let reply = ReplyBody::MessagesList(ReplyMessagesList::default());
    assert_eq!(reply.wire_type(), "REPLY_MESSAGES_LIST");

    let reply = ReplyBody::Error(ReplyError { message: "nope".into() });
    assert_eq!(reply.wire_type(), "REPLY_ERROR");

    let reply = ReplyBody::GetMessagesUsers(ReplyGetMessagesUsers::default());
    assert_eq!(reply.wire_type(), "REPLY_GET_MESSAGES_USERS");
  }

  #[test]
  fn sequenced_reply_serializes_flat() {
    let reply = SequencedReply::new(42, ReplyBody::Generic(ReplyGeneric { success: true }));
    let json = serde_json::to_value(&reply).unwrap();

    assert_eq!(json["SeqId"], 42);
    assert_eq!(json["Type"], "REPLY_GENERIC");
    assert_eq!(json["Success"], true);
  }

  #[test]
  fn server_events_serialize_with_embedded_type_tag() {
    let event = ServerEvent::UserConnected(UserInfo {
      name: "Alice".into(),
      id: "7".into(),
    });
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["Type"], "EVENT_USER_CONNECTED");
    assert_eq!(json["Name"], "Alice");
    assert_eq!(json["Id"], "7");
  }

  #[test]
  fn new_message_event_carries_direction_and_correspondent() {
    let event = ServerEvent::NewMessage(Message {
      id: 0,
      user_from: "9".into(),
      ts: "123".into(),
      is_out: true,
      text: "hi".into(),
    });
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["Type"], "EVENT_NEW_MESSAGE");
    assert_eq!(json["UserFrom"], "9");
    assert_eq!(json["IsOut"], true);
    assert_eq!(json["Id"], 0);
  }

  #[test]
  fn requests_decode_with_go_conventions() {
    // Ids ride as decimal strings; absent fields take their zero values.
    let req: RequestSendMessage = serde_json::from_str(r#"{"UserTo": "9", "Text": "hi"}"#).unwrap();
    assert_eq!(req.user_to, 9);
    assert_eq!(req.text, "hi");

    let req: RequestGetMessages = serde_json::from_str(r#"{"UserTo": "9"}"#).unwrap();
    assert_eq!(req.user_to, 9);
    assert_eq!(req.limit, 0);
    assert_eq!(req.date_end, "");

    // A bare number where a stringly id is expected is a decode error.
    assert!(serde_json::from_str::<RequestSendMessage>(r#"{"UserTo": 9, "Text": "hi"}"#).is_err());
  }
}
