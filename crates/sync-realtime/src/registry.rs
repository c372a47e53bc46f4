use crate::event::OutboundEvent;
use crate::rooms::{room_instance, room_key, room_user};
use chrono::{DateTime, Duration, Utc};
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use sync_types::Session;

/// Whatever `sync-server` uses to push a message down a live connection —
/// a WebSocket sink, in production; a `Vec`-backed recorder in tests.
pub trait FanoutSink: Send + Sync + std::fmt::Debug {
	fn deliver(&self, event: &OutboundEvent);
}

impl<T: FanoutSink> FanoutSink for Arc<T> {
	fn deliver(&self, event: &OutboundEvent) {
		(**self).deliver(event);
	}
}

#[derive(Debug)]
struct RegisteredConnection<S> {
	user_id: String,
	instance_id: String,
	connection_id: String,
	connected_at: DateTime<Utc>,
	last_activity_millis: AtomicI64,
	client_metadata: Option<Value>,
	sink: S,
	rooms: DashSet<String>,
}

impl<S> RegisteredConnection<S> {
	fn session(&self) -> Session {
		Session {
			user_id: self.user_id.clone(),
			instance_id: self.instance_id.clone(),
			connection_id: self.connection_id.clone(),
			connected_at: self.connected_at,
			last_activity: DateTime::from_timestamp_millis(self.last_activity_millis.load(Ordering::Relaxed)).unwrap_or(self.connected_at),
			client_metadata: self.client_metadata.clone(),
		}
	}
}

/// In-memory registry of live connections, keyed by `connectionId` with a
/// secondary per-user index, plus the logical room index used for fan-out
/// (§4.E, §3 "Session"). Process-lifetime only — see §5/§9 on cross-process
/// fan-out.
#[derive(Debug)]
pub struct SessionRegistry<S: FanoutSink> {
	connections: DashMap<String, Arc<RegisteredConnection<S>>>,
	by_user: DashMap<String, DashSet<String>>,
	rooms: DashMap<String, DashSet<String>>,
}

impl<S: FanoutSink> Default for SessionRegistry<S> {
	fn default() -> Self {
		Self::new()
	}
}

impl<S: FanoutSink> SessionRegistry<S> {
	pub fn new() -> Self {
		Self { connections: DashMap::new(), by_user: DashMap::new(), rooms: DashMap::new() }
	}

	/// Registers a connection and joins it to `user:<userId>` and
	/// `instance:<instanceId>`. Handshakes missing `userId`/`instanceId`
	/// never reach this point — the caller drops them immediately (§4.E).
	pub fn connect(&self, user_id: &str, instance_id: &str, connection_id: &str, client_metadata: Option<Value>, sink: S, now: DateTime<Utc>) {
		let conn = Arc::new(RegisteredConnection {
			user_id: user_id.to_string(),
			instance_id: instance_id.to_string(),
			connection_id: connection_id.to_string(),
			connected_at: now,
			last_activity_millis: AtomicI64::new(now.timestamp_millis()),
			client_metadata,
			sink,
			rooms: DashSet::new(),
		});

		self.connections.insert(connection_id.to_string(), conn.clone());
		self.by_user.entry(user_id.to_string()).or_default().insert(connection_id.to_string());
		self.join(connection_id, &room_user(user_id));
		self.join(connection_id, &room_instance(instance_id));
	}

	pub fn disconnect(&self, connection_id: &str) -> Option<()> {
		let (_, conn) = self.connections.remove(connection_id)?;
		for room in conn.rooms.iter() {
			if let Some(members) = self.rooms.get(room.key()) {
				members.remove(connection_id);
			}
		}
		if let Some(members) = self.by_user.get(&conn.user_id) {
			members.remove(connection_id);
		}
		Some(())
	}

	pub fn touch(&self, connection_id: &str, now: DateTime<Utc>) {
		if let Some(conn) = self.connections.get(connection_id) {
			conn.last_activity_millis.store(now.timestamp_millis(), Ordering::Relaxed);
		}
	}

	/// Joins `key:<userId>:<key>` for each requested key (§4.E
	/// "Subscription").
	pub fn subscribe(&self, connection_id: &str, user_id: &str, keys: &[String]) {
		for key in keys {
			self.join(connection_id, &room_key(user_id, key));
		}
	}

	pub fn unsubscribe(&self, connection_id: &str, user_id: &str, keys: &[String]) {
		for key in keys {
			self.leave(connection_id, &room_key(user_id, key));
		}
	}

	pub fn sessions_of_user(&self, user_id: &str) -> Vec<Session> {
		let Some(ids) = self.by_user.get(user_id) else { return Vec::new() };
		ids.iter().filter_map(|id| self.connections.get(id.key()).map(|c| c.session())).collect()
	}

	pub fn instances_of_user(&self, user_id: &str) -> Vec<String> {
		let mut instances: Vec<String> = self.sessions_of_user(user_id).into_iter().map(|s| s.instance_id).collect();
		instances.sort();
		instances.dedup();
		instances
	}

	pub fn connection_count(&self) -> usize {
		self.connections.len()
	}

	/// Scavenges connections whose `lastActivity` predates the inactivity
	/// threshold (§3 "Session" invariant, §4.E). Returns the number removed.
	pub fn cleanup_inactive(&self, max_inactive: Duration, now: DateTime<Utc>) -> usize {
		let cutoff = now - max_inactive;
		let stale: Vec<String> = self
			.connections
			.iter()
			.filter(|entry| DateTime::from_timestamp_millis(entry.last_activity_millis.load(Ordering::Relaxed)).unwrap_or(now) < cutoff)
			.map(|entry| entry.key().clone())
			.collect();
		for id in &stale {
			self.disconnect(id);
		}
		stale.len()
	}

	pub fn deliver_to_connection(&self, connection_id: &str, event: &OutboundEvent) -> bool {
		match self.connections.get(connection_id) {
			Some(conn) => {
				conn.sink.deliver(event);
				true
			}
			None => false,
		}
	}

	/// Delivers to every member of `room` except `exclude`, never echoing to
	/// the originating connection (§8 invariant "Fan-out never echoes to the
	/// originating connection").
	fn deliver_to_room(&self, room: &str, exclude: Option<&str>, event: &OutboundEvent) {
		let Some(members) = self.rooms.get(room) else { return };
		for connection_id in members.iter() {
			if Some(connection_id.key().as_str()) == exclude {
				continue;
			}
			if let Some(conn) = self.connections.get(connection_id.key()) {
				conn.sink.deliver(event);
			}
		}
	}

	/// Fan-out after a successful SetItem (§4.E "Fan-out rules").
	/// `exclude_connection_id` is `None` for writes with no originating
	/// WebSocket connection (e.g. a plain HTTP `PUT`).
	pub fn fanout_set(
		&self, user_id: &str, key: &str, exclude_connection_id: Option<&str>, value: Value, metadata: Option<Value>, timestamp: i64,
		version: Option<i64>,
	) {
		let event = OutboundEvent::Update { key: key.to_string(), value, metadata, timestamp, version };
		self.deliver_to_room(&room_user(user_id), exclude_connection_id, &event);
		self.deliver_to_room(&room_key(user_id, key), exclude_connection_id, &event);
	}

	/// Fan-out after a successful RemoveItem.
	pub fn fanout_remove(&self, user_id: &str, key: &str, exclude_connection_id: Option<&str>, timestamp: i64) {
		let event = OutboundEvent::Remove { key: key.to_string(), timestamp };
		self.deliver_to_room(&room_user(user_id), exclude_connection_id, &event);
		self.deliver_to_room(&room_key(user_id, key), exclude_connection_id, &event);
	}

	/// Optional single clear notification after ClearStorage (§4.E).
	pub fn fanout_clear(&self, user_id: &str, exclude_connection_id: Option<&str>, timestamp: i64) {
		let event = OutboundEvent::Clear { timestamp };
		self.deliver_to_room(&room_user(user_id), exclude_connection_id, &event);
	}

	fn join(&self, connection_id: &str, room: &str) {
		self.rooms.entry(room.to_string()).or_default().insert(connection_id.to_string());
		if let Some(conn) = self.connections.get(connection_id) {
			conn.rooms.insert(room.to_string());
		}
	}

	fn leave(&self, connection_id: &str, room: &str) {
		if let Some(members) = self.rooms.get(room) {
			members.remove(connection_id);
		}
		if let Some(conn) = self.connections.get(connection_id) {
			conn.rooms.remove(room);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	#[derive(Debug, Default)]
	struct RecordingSink(Mutex<Vec<OutboundEvent>>);

	impl FanoutSink for RecordingSink {
		fn deliver(&self, event: &OutboundEvent) {
			self.0.lock().unwrap().push(event.clone());
		}
	}

	fn registry() -> SessionRegistry<Arc<RecordingSink>> {
		SessionRegistry::new()
	}

	#[test]
	fn fanout_never_echoes_to_originator() {
		let reg = registry();
		let now = Utc::now();
		let a = Arc::new(RecordingSink::default());
		let b = Arc::new(RecordingSink::default());
		reg.connect("u1", "instA", "connA", None, a.clone(), now);
		reg.connect("u1", "instB", "connB", None, b.clone(), now);

		reg.fanout_set("u1", "k", Some("connA"), Value::from(1), None, 100, Some(2));

		assert!(a.0.lock().unwrap().is_empty());
		assert_eq!(b.0.lock().unwrap().len(), 1);
	}

	#[test]
	fn key_room_delivery_is_additive_and_deduped_by_caller() {
		let reg = registry();
		let now = Utc::now();
		let a = Arc::new(RecordingSink::default());
		reg.connect("u1", "instA", "connA", None, a.clone(), now);
		reg.subscribe("connA", "u1", &["k".to_string()]);
		let other = Arc::new(RecordingSink::default());
		reg.connect("u1", "instB", "connB", None, other.clone(), now);

		reg.fanout_set("u1", "k", Some("connB"), Value::from(1), None, 100, Some(2));

		// connA is a member of both user:u1 and key:u1:k but is not the
		// excluded connection, so it legitimately receives two deliveries.
		assert_eq!(a.0.lock().unwrap().len(), 2);
	}

	#[test]
	fn disconnect_removes_from_all_rooms() {
		let reg = registry();
		let now = Utc::now();
		let a = Arc::new(RecordingSink::default());
		reg.connect("u1", "instA", "connA", None, a, now);
		reg.subscribe("connA", "u1", &["k".to_string()]);
		reg.disconnect("connA");

		assert_eq!(reg.sessions_of_user("u1").len(), 0);
		assert_eq!(reg.connection_count(), 0);
	}

	#[test]
	fn cleanup_inactive_scavenges_stale_connections() {
		let reg = registry();
		let now = Utc::now();
		let a = Arc::new(RecordingSink::default());
		reg.connect("u1", "instA", "connA", None, a, now - Duration::minutes(30));

		let removed = reg.cleanup_inactive(Duration::minutes(15), now);
		assert_eq!(removed, 1);
		assert_eq!(reg.connection_count(), 0);
	}
}
