//! In-memory ports of the production request handlers: same request/reply
//! shapes, same validation messages, same hub notifications, no database.

mod store;

pub use store::{InMemoryStore, Profile};

use std::sync::Arc;

use sonet::protocol::types::{
  Message, ReplyBody, ReplyGeneric, ReplyGetFriends, ReplyGetMessagesUsers, ReplyGetProfile, ReplyGetTimeline,
  ReplyMessagesList, ReplyUsersList, RequestAddFriend, RequestAddToTimeline, RequestConfirmFriendship,
  RequestGetFriends, RequestGetMessages, RequestGetMessagesUsers, RequestGetProfile, RequestGetTimeline,
  RequestGetUsersList, RequestSendMessage, RequestUpdateProfile, TimelineMessage, UserInfo, UserListInfo,
};
use sonet::protocol::{
  self, MAX_FRIENDS_LIMIT, MAX_MESSAGES_LIMIT, MAX_TIMELINE_LIMIT, MAX_USERS_LIST_LIMIT,
};
use sonet::{DomainEvent, HandlerError, HandlerRegistry, HubHandle, SessionInfo};

/// Longest accepted timeline post, in characters.
const MAX_TIMELINE_TEXT_CHARS: usize = 1000;

fn now_nanos() -> i64 {
  chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

fn clamp_limit(limit: u64, max: u64) -> Result<u64, HandlerError> {
  let limit = limit.min(max);
  if limit == 0 {
    return Err(HandlerError::user("Limit must be greater than 0"));
  }
  Ok(limit)
}

/// An empty `DateEnd` means "now"; anything else must be a nanosecond epoch.
fn resolve_date_end(raw: &str, failure_msg: &'static str) -> Result<i64, HandlerError> {
  if raw.is_empty() {
    return Ok(now_nanos());
  }
  raw.parse::<i64>().map_err(|e| HandlerError::internal(failure_msg, e))
}

/// Builds the full request registry over the in-memory store.
pub fn build_registry(store: Arc<InMemoryStore>, hub: HubHandle) -> HandlerRegistry {
  let mut registry = HandlerRegistry::new();

  {
    let store = store.clone();
    registry.register(
      protocol::REQUEST_GET_MESSAGES,
      move |session: SessionInfo, req: RequestGetMessages| {
        let store = store.clone();
        async move { get_messages(&store, &session, req) }
      },
    );
  }
  {
    let store = store.clone();
    let hub = hub.clone();
    registry.register(
      protocol::REQUEST_SEND_MESSAGE,
      move |session: SessionInfo, req: RequestSendMessage| {
        let store = store.clone();
        let hub = hub.clone();
        async move { send_message(&store, &hub, &session, req).await }
      },
    );
  }
  {
    let store = store.clone();
    registry.register(
      protocol::REQUEST_GET_TIMELINE,
      move |session: SessionInfo, req: RequestGetTimeline| {
        let store = store.clone();
        async move { get_timeline(&store, &session, req) }
      },
    );
  }
  {
    let store = store.clone();
    let hub = hub.clone();
    registry.register(
      protocol::REQUEST_ADD_TO_TIMELINE,
      move |session: SessionInfo, req: RequestAddToTimeline| {
        let store = store.clone();
        let hub = hub.clone();
        async move { add_to_timeline(&store, &hub, &session, req).await }
      },
    );
  }
  {
    let store = store.clone();
    registry.register(
      protocol::REQUEST_GET_USERS_LIST,
      move |session: SessionInfo, req: RequestGetUsersList| {
        let store = store.clone();
        async move { get_users_list(&store, &session, req) }
      },
    );
  }
  {
    let store = store.clone();
    let hub = hub.clone();
    registry.register(
      protocol::REQUEST_ADD_FRIEND,
      move |session: SessionInfo, req: RequestAddFriend| {
        let store = store.clone();
        let hub = hub.clone();
        async move { add_friend(&store, &hub, &session, req).await }
      },
    );
  }
  {
    let store = store.clone();
    registry.register(
      protocol::REQUEST_CONFIRM_FRIENDSHIP,
      move |session: SessionInfo, req: RequestConfirmFriendship| {
        let store = store.clone();
        async move { confirm_friendship(&store, &session, req) }
      },
    );
  }
  {
    let store = store.clone();
    registry.register(
      protocol::REQUEST_GET_MESSAGES_USERS,
      move |session: SessionInfo, req: RequestGetMessagesUsers| {
        let store = store.clone();
        async move { get_messages_users(&store, &session, req) }
      },
    );
  }
  {
    let store = store.clone();
    registry.register(
      protocol::REQUEST_GET_FRIENDS,
      move |session: SessionInfo, req: RequestGetFriends| {
        let store = store.clone();
        async move { get_friends(&store, &session, req) }
      },
    );
  }
  {
    let store = store.clone();
    registry.register(
      protocol::REQUEST_GET_PROFILE,
      move |session: SessionInfo, req: RequestGetProfile| {
        let store = store.clone();
        async move { get_profile(&store, &session, req) }
      },
    );
  }
  {
    let store = store.clone();
    registry.register(
      protocol::REQUEST_UPDATE_PROFILE,
      move |session: SessionInfo, req: RequestUpdateProfile| {
        let store = store.clone();
        async move { update_profile(&store, &session, req) }
      },
    );
  }

  registry
}

fn get_messages(
  store: &InMemoryStore,
  session: &SessionInfo,
  req: RequestGetMessages,
) -> Result<ReplyBody, HandlerError> {
  let limit = clamp_limit(req.limit, MAX_MESSAGES_LIMIT)?;
  let date_end = resolve_date_end(&req.date_end, "Cannot select messages")?;

  let messages = store
    .messages_between(session.id, req.user_to, date_end, limit)
    .into_iter()
    .map(|row| Message {
      id: row.id,
      user_from: req.user_to.to_string(),
      ts: row.ts.to_string(),
      is_out: row.is_out,
      text: row.text,
    })
    .collect();

  Ok(ReplyBody::MessagesList(ReplyMessagesList { messages }))
}

async fn send_message(
  store: &InMemoryStore,
  hub: &HubHandle,
  session: &SessionInfo,
  req: RequestSendMessage,
) -> Result<ReplyBody, HandlerError> {
  if req.text.is_empty() {
    return Err(HandlerError::user("Message text must not be empty"));
  }

  let now = now_nanos();
  store.log_message(session.id, req.user_to, true, &req.text, now);
  store.log_message(req.user_to, session.id, false, &req.text, now);

  hub
    .broadcast(DomainEvent::NewMessage {
      user_from: session.id,
      user_to: req.user_to,
      ts: now.to_string(),
      text: req.text,
    })
    .await
    .map_err(|e| HandlerError::internal("Could not deliver message event", e))?;

  Ok(ReplyBody::Generic(ReplyGeneric { success: true }))
}

fn get_timeline(
  store: &InMemoryStore,
  session: &SessionInfo,
  req: RequestGetTimeline,
) -> Result<ReplyBody, HandlerError> {
  let limit = clamp_limit(req.limit, MAX_TIMELINE_LIMIT)?;
  let date_end = resolve_date_end(&req.date_end, "Cannot select timeline")?;

  let rows = store.timeline_for(session.id, date_end, limit);
  let source_ids: Vec<u64> = rows.iter().map(|row| row.source_user_id).collect();
  let names = store.user_names(&source_ids);

  let messages = rows
    .into_iter()
    .map(|row| TimelineMessage {
      id: row.id,
      user_id: row.source_user_id.to_string(),
      user_name: names.get(&row.source_user_id).cloned().unwrap_or_default(),
      text: row.text,
      ts: row.ts.to_string(),
    })
    .collect();

  Ok(ReplyBody::GetTimeline(ReplyGetTimeline { messages }))
}

async fn add_to_timeline(
  store: &InMemoryStore,
  hub: &HubHandle,
  session: &SessionInfo,
  req: RequestAddToTimeline,
) -> Result<ReplyBody, HandlerError> {
  if req.text.is_empty() {
    return Err(HandlerError::user("Text must not be empty"));
  }
  if req.text.chars().count() > MAX_TIMELINE_TEXT_CHARS {
    return Err(HandlerError::user(format!(
      "Text cannot exceed {} characters",
      MAX_TIMELINE_TEXT_CHARS
    )));
  }

  let now = now_nanos();

  // Rows are written for friends plus the author; the real-time event below
  // fans out to everyone connected.
  let mut owner_ids = store.friends_of(session.id);
  owner_ids.push(session.id);
  store.add_timeline_rows(&owner_ids, session.id, &req.text, now);

  hub
    .broadcast(DomainEvent::NewTimelineStatus {
      user_id: session.id,
      user_name: session.name.clone(),
      ts: now.to_string(),
      text: req.text,
    })
    .await
    .map_err(|e| HandlerError::internal("Could not deliver timeline event", e))?;

  Ok(ReplyBody::Generic(ReplyGeneric { success: true }))
}

fn get_users_list(
  store: &InMemoryStore,
  session: &SessionInfo,
  req: RequestGetUsersList,
) -> Result<ReplyBody, HandlerError> {
  let limit = clamp_limit(req.limit, MAX_USERS_LIST_LIMIT)?;

  let users = store
    .users_sorted(limit)
    .into_iter()
    .map(|(id, name)| {
      let (is_friend, friendship_confirmed) = store.friendship_flags(session.id, id);
      UserListInfo {
        user: UserInfo {
          name,
          id: id.to_string(),
        },
        is_friend,
        friendship_confirmed,
      }
    })
    .collect();

  Ok(ReplyBody::UsersList(ReplyUsersList { users }))
}

async fn add_friend(
  store: &InMemoryStore,
  hub: &HubHandle,
  session: &SessionInfo,
  req: RequestAddFriend,
) -> Result<ReplyBody, HandlerError> {
  let friend_id = req
    .friend_id
    .parse::<u64>()
    .map_err(|_| HandlerError::user("Friend id is not numeric"))?;
  if friend_id == session.id {
    return Err(HandlerError::user("You cannot add yourself as a friend"));
  }

  store.add_friend_request(session.id, friend_id);

  hub
    .broadcast(DomainEvent::FriendRequest { user_id: friend_id })
    .await
    .map_err(|e| HandlerError::internal("Could not deliver friend request event", e))?;

  Ok(ReplyBody::Generic(ReplyGeneric { success: true }))
}

fn confirm_friendship(
  store: &InMemoryStore,
  session: &SessionInfo,
  req: RequestConfirmFriendship,
) -> Result<ReplyBody, HandlerError> {
  let friend_id = req
    .friend_id
    .parse::<u64>()
    .map_err(|_| HandlerError::user("Friend id is not numeric"))?;

  store.confirm_friendship(session.id, friend_id);
  Ok(ReplyBody::Generic(ReplyGeneric { success: true }))
}

fn get_messages_users(
  store: &InMemoryStore,
  session: &SessionInfo,
  req: RequestGetMessagesUsers,
) -> Result<ReplyBody, HandlerError> {
  // The limit applies to conversation partners only; friends are always
  // appended afterwards, as the original did.
  let mut user_ids = store.conversation_peers(session.id, req.limit);
  for friend_id in store.friends_of(session.id) {
    if !user_ids.contains(&friend_id) {
      user_ids.push(friend_id);
    }
  }

  let names = store.user_names(&user_ids);
  let users = user_ids
    .into_iter()
    .map(|id| UserInfo {
      name: names.get(&id).cloned().unwrap_or_default(),
      id: id.to_string(),
    })
    .collect();

  Ok(ReplyBody::GetMessagesUsers(ReplyGetMessagesUsers { users }))
}

fn get_friends(store: &InMemoryStore, session: &SessionInfo, req: RequestGetFriends) -> Result<ReplyBody, HandlerError> {
  // The limit is validated but the fetch has never applied it.
  clamp_limit(req.limit, MAX_FRIENDS_LIMIT)?;

  let friend_ids = store.friends_of(session.id);
  let request_ids = store.friend_requests_of(session.id);

  let mut all_ids = friend_ids.clone();
  all_ids.extend_from_slice(&request_ids);
  let names = store.user_names(&all_ids);

  let to_user_info = |ids: Vec<u64>| -> Vec<UserInfo> {
    ids
      .into_iter()
      .map(|id| UserInfo {
        name: names.get(&id).cloned().unwrap_or_default(),
        id: id.to_string(),
      })
      .collect()
  };

  Ok(ReplyBody::GetFriends(ReplyGetFriends {
    users: to_user_info(friend_ids),
    friend_requests: to_user_info(request_ids),
  }))
}

fn get_profile(store: &InMemoryStore, _session: &SessionInfo, req: RequestGetProfile) -> Result<ReplyBody, HandlerError> {
  let Some(profile) = store.get_profile(req.user_id) else {
    return Err(HandlerError::user("No such user"));
  };

  Ok(ReplyBody::GetProfile(ReplyGetProfile {
    name: profile.name,
    birthdate: profile.birthdate,
    sex: profile.sex,
    description: profile.description,
    city_id: profile.city_id,
    city_name: profile.city_name,
    family_position: profile.family_position,
  }))
}

fn update_profile(
  store: &InMemoryStore,
  session: &SessionInfo,
  req: RequestUpdateProfile,
) -> Result<ReplyBody, HandlerError> {
  if req.city_name.is_empty() || req.birthdate.is_empty() || req.name.is_empty() {
    return Err(HandlerError::user("All fields must be filled in"));
  }

  let city_id = store.city_id_for_name(&req.city_name);
  store.upsert_profile(
    session.id,
    Profile {
      name: req.name,
      birthdate: req.birthdate,
      sex: req.sex,
      description: String::new(),
      city_id,
      city_name: req.city_name,
      family_position: req.family_position,
    },
  );

  Ok(ReplyBody::Generic(ReplyGeneric { success: true }))
}
