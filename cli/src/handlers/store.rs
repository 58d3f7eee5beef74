//! In-memory stand-in for the persistence provider the handlers would talk
//! to in production. Keeps the observable semantics of the original schema
//! (both-direction message rows, per-owner timeline rows, pending/confirmed
//! friendship rows) without any of its SQL machinery.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

#[derive(Debug, Clone)]
pub struct StoredMessage {
  pub id: u64,
  /// The correspondent on the other side of this row.
  pub peer_id: u64,
  pub is_out: bool,
  pub text: String,
  pub ts: i64,
}

#[derive(Debug, Clone)]
pub struct TimelineRow {
  pub id: u64,
  pub source_user_id: u64,
  pub text: String,
  pub ts: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
  pub name: String,
  pub birthdate: String,
  pub sex: i32,
  pub description: String,
  pub city_id: u64,
  pub city_name: String,
  pub family_position: i32,
}

pub struct InMemoryStore {
  next_id: AtomicU64,
  profiles: RwLock<HashMap<u64, Profile>>,
  /// Message rows per owner; a send writes one row into each side's log.
  messages: RwLock<HashMap<u64, Vec<StoredMessage>>>,
  /// Timeline rows per owner; a post writes one row per friend plus self.
  timelines: RwLock<HashMap<u64, Vec<TimelineRow>>>,
  /// `(user, friend) -> request_accepted`. Adding a friend writes the
  /// initiator's row as accepted and the target's as pending.
  friendships: RwLock<HashMap<(u64, u64), bool>>,
  cities: RwLock<HashMap<String, u64>>,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self {
      next_id: AtomicU64::new(1),
      profiles: RwLock::new(HashMap::new()),
      messages: RwLock::new(HashMap::new()),
      timelines: RwLock::new(HashMap::new()),
      friendships: RwLock::new(HashMap::new()),
      cities: RwLock::new(HashMap::new()),
    }
  }

  fn next_id(&self) -> u64 {
    self.next_id.fetch_add(1, Ordering::Relaxed)
  }

  // --- Messages ---

  pub fn log_message(&self, owner_id: u64, peer_id: u64, is_out: bool, text: &str, ts: i64) {
    let row = StoredMessage {
      id: self.next_id(),
      peer_id,
      is_out,
      text: text.to_string(),
      ts,
    };
    self.messages.write().entry(owner_id).or_default().push(row);
  }

  /// Messages in `owner_id`'s log exchanged with `peer_id`, strictly older
  /// than `date_end`, newest first.
  pub fn messages_between(&self, owner_id: u64, peer_id: u64, date_end: i64, limit: u64) -> Vec<StoredMessage> {
    let guard = self.messages.read();
    let Some(rows) = guard.get(&owner_id) else {
      return Vec::new();
    };
    let mut rows: Vec<StoredMessage> = rows
      .iter()
      .filter(|row| row.peer_id == peer_id && row.ts < date_end)
      .cloned()
      .collect();
    rows.sort_by(|a, b| b.ts.cmp(&a.ts).then(b.id.cmp(&a.id)));
    rows.truncate(limit as usize);
    rows
  }

  /// Distinct correspondents of `owner_id`, most recent conversation first.
  pub fn conversation_peers(&self, owner_id: u64, limit: u64) -> Vec<u64> {
    let guard = self.messages.read();
    let Some(rows) = guard.get(&owner_id) else {
      return Vec::new();
    };
    let mut latest: HashMap<u64, i64> = HashMap::new();
    for row in rows {
      let entry = latest.entry(row.peer_id).or_insert(row.ts);
      if row.ts > *entry {
        *entry = row.ts;
      }
    }
    let mut peers: Vec<(u64, i64)> = latest.into_iter().collect();
    peers.sort_by(|a, b| b.1.cmp(&a.1));
    peers.truncate(limit as usize);
    peers.into_iter().map(|(peer, _)| peer).collect()
  }

  // --- Timeline ---

  pub fn add_timeline_rows(&self, owner_ids: &[u64], source_user_id: u64, text: &str, ts: i64) {
    let mut guard = self.timelines.write();
    for owner_id in owner_ids {
      let row = TimelineRow {
        id: self.next_id(),
        source_user_id,
        text: text.to_string(),
        ts,
      };
      guard.entry(*owner_id).or_default().push(row);
    }
  }

  pub fn timeline_for(&self, owner_id: u64, date_end: i64, limit: u64) -> Vec<TimelineRow> {
    let guard = self.timelines.read();
    let Some(rows) = guard.get(&owner_id) else {
      return Vec::new();
    };
    let mut rows: Vec<TimelineRow> = rows.iter().filter(|row| row.ts < date_end).cloned().collect();
    rows.sort_by(|a, b| b.ts.cmp(&a.ts).then(b.id.cmp(&a.id)));
    rows.truncate(limit as usize);
    rows
  }

  // --- Friendships ---

  /// Files a friend request: the initiator's row is born accepted, the
  /// target's row pending, matching the original's two inserts.
  pub fn add_friend_request(&self, user_id: u64, friend_id: u64) {
    let mut guard = self.friendships.write();
    guard.entry((user_id, friend_id)).or_insert(true);
    guard.entry((friend_id, user_id)).or_insert(false);
  }

  /// Marks `user_id`'s row for `friend_id` accepted. A no-op when there is
  /// no such row, like the UPDATE it replaces.
  pub fn confirm_friendship(&self, user_id: u64, friend_id: u64) {
    if let Some(accepted) = self.friendships.write().get_mut(&(user_id, friend_id)) {
      *accepted = true;
    }
  }

  pub fn friends_of(&self, user_id: u64) -> Vec<u64> {
    let mut friends: Vec<u64> = self
      .friendships
      .read()
      .iter()
      .filter(|((uid, _), accepted)| *uid == user_id && **accepted)
      .map(|((_, fid), _)| *fid)
      .collect();
    friends.sort_unstable();
    friends
  }

  pub fn friend_requests_of(&self, user_id: u64) -> Vec<u64> {
    let mut pending: Vec<u64> = self
      .friendships
      .read()
      .iter()
      .filter(|((uid, _), accepted)| *uid == user_id && !**accepted)
      .map(|((_, fid), _)| *fid)
      .collect();
    pending.sort_unstable();
    pending
  }

  /// `(is_friend, friendship_confirmed)` from `user_id`'s perspective.
  pub fn friendship_flags(&self, user_id: u64, other_id: u64) -> (bool, bool) {
    match self.friendships.read().get(&(user_id, other_id)) {
      Some(accepted) => (true, *accepted),
      None => (false, false),
    }
  }

  // --- Profiles & users ---

  /// Names for the given ids; absent users are simply missing from the map.
  pub fn user_names(&self, user_ids: &[u64]) -> HashMap<u64, String> {
    let guard = self.profiles.read();
    user_ids
      .iter()
      .filter_map(|id| guard.get(id).map(|p| (*id, p.name.clone())))
      .collect()
  }

  /// All known users ordered by id.
  pub fn users_sorted(&self, limit: u64) -> Vec<(u64, String)> {
    let guard = self.profiles.read();
    let mut users: Vec<(u64, String)> = guard.iter().map(|(id, p)| (*id, p.name.clone())).collect();
    users.sort_by_key(|(id, _)| *id);
    users.truncate(limit as usize);
    users
  }

  pub fn get_profile(&self, user_id: u64) -> Option<Profile> {
    self.profiles.read().get(&user_id).cloned()
  }

  pub fn city_id_for_name(&self, city_name: &str) -> u64 {
    let mut guard = self.cities.write();
    if let Some(id) = guard.get(city_name) {
      return *id;
    }
    let id = self.next_id();
    guard.insert(city_name.to_string(), id);
    id
  }

  pub fn upsert_profile(&self, user_id: u64, profile: Profile) {
    self.profiles.write().insert(user_id, profile);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn message_log_orders_newest_first_and_respects_date_end() {
    let store = InMemoryStore::new();
    store.log_message(7, 9, true, "first", 100);
    store.log_message(7, 9, true, "second", 200);
    store.log_message(7, 11, true, "other peer", 150);

    let rows = store.messages_between(7, 9, 1000, 10);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].text, "second");
    assert_eq!(rows[1].text, "first");

    let rows = store.messages_between(7, 9, 200, 10);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text, "first");
  }

  #[test]
  fn friend_request_is_accepted_for_initiator_and_pending_for_target() {
    let store = InMemoryStore::new();
    store.add_friend_request(7, 9);

    assert_eq!(store.friends_of(7), vec![9]);
    assert_eq!(store.friends_of(9), Vec::<u64>::new());
    assert_eq!(store.friend_requests_of(9), vec![7]);

    store.confirm_friendship(9, 7);
    assert_eq!(store.friends_of(9), vec![7]);
    assert!(store.friend_requests_of(9).is_empty());
  }

  #[test]
  fn re_adding_a_friend_does_not_reset_a_confirmed_row() {
    let store = InMemoryStore::new();
    store.add_friend_request(7, 9);
    store.confirm_friendship(9, 7);

    store.add_friend_request(7, 9);
    assert_eq!(store.friendship_flags(9, 7), (true, true));
  }

  #[test]
  fn conversation_peers_come_back_most_recent_first() {
    let store = InMemoryStore::new();
    store.log_message(7, 9, true, "old", 100);
    store.log_message(7, 11, true, "new", 300);
    store.log_message(7, 9, false, "newer for 9", 200);

    assert_eq!(store.conversation_peers(7, 10), vec![11, 9]);
  }

  #[test]
  fn cities_are_created_once() {
    let store = InMemoryStore::new();
    let id = store.city_id_for_name("Springfield");
    assert_eq!(store.city_id_for_name("Springfield"), id);
    assert_ne!(store.city_id_for_name("Shelbyville"), id);
  }
}
