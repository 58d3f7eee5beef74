// src/protocol/mod.rs

//! Wire-level protocol shared with the web client: request framing, the
//! request/reply/event vocabulary and the naming rules tying reply types to
//! their wire labels.

pub mod codec;
pub mod types;

/// Sentinel written to a connection that fails authentication, right before
/// the transport is closed.
pub const AUTH_ERROR_SENTINEL: &str = "AUTH_ERROR";

// Request-type tokens as they appear on the wire.
pub const REQUEST_GET_MESSAGES: &str = "REQUEST_GET_MESSAGES";
pub const REQUEST_SEND_MESSAGE: &str = "REQUEST_SEND_MESSAGE";
pub const REQUEST_GET_TIMELINE: &str = "REQUEST_GET_TIMELINE";
pub const REQUEST_ADD_TO_TIMELINE: &str = "REQUEST_ADD_TO_TIMELINE";
pub const REQUEST_GET_USERS_LIST: &str = "REQUEST_GET_USERS_LIST";
pub const REQUEST_ADD_FRIEND: &str = "REQUEST_ADD_FRIEND";
pub const REQUEST_CONFIRM_FRIENDSHIP: &str = "REQUEST_CONFIRM_FRIENDSHIP";
pub const REQUEST_GET_MESSAGES_USERS: &str = "REQUEST_GET_MESSAGES_USERS";
pub const REQUEST_GET_FRIENDS: &str = "REQUEST_GET_FRIENDS";
pub const REQUEST_GET_PROFILE: &str = "REQUEST_GET_PROFILE";
pub const REQUEST_UPDATE_PROFILE: &str = "REQUEST_UPDATE_PROFILE";

// List replies are capped regardless of the limit the client asks for.
pub const MAX_MESSAGES_LIMIT: u64 = 100;
pub const MAX_TIMELINE_LIMIT: u64 = 100;
pub const MAX_USERS_LIST_LIMIT: u64 = 100;
pub const MAX_FRIENDS_LIMIT: u64 = 100;

pub const SEX_TYPE_MALE: i32 = 1;
pub const SEX_TYPE_FEMALE: i32 = 2;

pub const FAMILY_POSITION_SINGLE: i32 = 1;
pub const FAMILY_POSITION_MARRIED: i32 = 2;

/// `ReplyGetMessages` => `REPLY_GET_MESSAGES`.
///
/// Reply wire labels are derived from the reply type's name, so adding a
/// reply type cannot drift from its label.
pub fn camel_to_upper_snake(input: &str) -> String {
  let mut out = String::with_capacity(input.len() + 4);
  for (i, c) in input.chars().enumerate() {
    if c.is_uppercase() && i > 0 {
      out.push('_');
    }
    out.extend(c.to_uppercase());
  }
  out
}
