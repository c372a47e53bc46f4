use crate::command::Command;
use crate::directory::InstanceDirectory;
use crate::error::Error;
use crate::event::DomainEvent;
use crate::query::Query;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use sync_conflict::{ConflictEngine, WriteProbe};
use sync_realtime::{FanoutSink, OutboundEvent, SessionRegistry};
use sync_queue::OfflineQueue;
use sync_storage::ItemRepository;
use sync_types::{Item, NewItem};
use tokio::sync::broadcast;

/// Result of dispatching a `Query` (§4.B).
#[derive(Debug, Clone)]
pub enum QueryResult {
	Item(Option<Item>),
	Items(Vec<Item>),
	Keys(Vec<String>),
}

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Binds storage, the conflict engine, realtime fan-out, and the offline
/// queue behind the typed command/query surface of §4.B. The in-process
/// event bus (`tokio::sync::broadcast`) is grounded in the same pattern the
/// teacher uses for its auth/event actors (`broadcast::Sender<Event>`); the
/// two in-tree subscribers (fan-out, offline queue) are driven directly
/// rather than via their own receiver task, with the channel reserved for
/// additional observers (metrics, audit logging).
pub struct SyncEngine<S: FanoutSink> {
	items: ItemRepository,
	conflicts: ConflictEngine,
	registry: Arc<SessionRegistry<S>>,
	offline: Arc<OfflineQueue>,
	directory: InstanceDirectory,
	events: broadcast::Sender<DomainEvent>,
}

impl<S: FanoutSink> SyncEngine<S> {
	pub fn new(items: ItemRepository, conflicts: ConflictEngine, registry: Arc<SessionRegistry<S>>, offline: Arc<OfflineQueue>) -> Self {
		let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
		Self { items, conflicts, registry, offline, directory: InstanceDirectory::new(), events }
	}

	pub fn subscribe_events(&self) -> broadcast::Receiver<DomainEvent> {
		self.events.subscribe()
	}

	pub fn registry(&self) -> &Arc<SessionRegistry<S>> {
		&self.registry
	}

	pub fn offline_queue(&self) -> &Arc<OfflineQueue> {
		&self.offline
	}

	/// Registers a connected session, learns its instance for future
	/// offline-queue targeting, and delivers any updates queued while it was
	/// disconnected as a single `pending-updates` batch (§4.E "Connection
	/// lifecycle").
	pub fn connect_session(&self, user_id: &str, instance_id: &str, connection_id: &str, client_metadata: Option<Value>, sink: S, now: DateTime<Utc>) {
		self.registry.connect(user_id, instance_id, connection_id, client_metadata, sink, now);
		self.directory.record(user_id, instance_id);

		let pending = self.offline.pending_updates(user_id, instance_id, None, now);
		if !pending.is_empty() {
			self.registry.deliver_to_connection(connection_id, &OutboundEvent::PendingUpdates { updates: pending });
		}
	}

	pub fn disconnect_session(&self, connection_id: &str) {
		self.registry.disconnect(connection_id);
	}

	pub async fn dispatch_command(&self, command: Command, originating_connection: Option<&str>, now: DateTime<Utc>) -> Result<DomainEvent, Error> {
		match command {
			Command::SetItem { user_id, instance_id, key, value, metadata, expected_version } => {
				self.set_item(user_id, instance_id, key, value, metadata, expected_version, originating_connection, now).await
			}
			Command::RemoveItem { user_id, instance_id, key } => self.remove_item(user_id, instance_id, key, originating_connection, now).await,
			Command::ClearStorage { user_id, instance_id } => self.clear_storage(user_id, instance_id, originating_connection, now).await,
		}
	}

	pub async fn dispatch_query(&self, query: Query) -> Result<QueryResult, Error> {
		match query {
			Query::GetItem { user_id, key } => Ok(QueryResult::Item(self.items.find_by_key(&user_id, &key).await?)),
			Query::GetAllItems { user_id, prefix } => Ok(QueryResult::Items(self.items.find_all(&user_id, prefix.as_deref()).await?)),
			Query::GetKeys { user_id, prefix } => Ok(QueryResult::Keys(self.items.find_keys(&user_id, prefix.as_deref()).await?)),
		}
	}

	#[allow(clippy::too_many_arguments)]
	async fn set_item(
		&self, user_id: String, instance_id: String, key: String, value: Value, metadata: Option<Value>, expected_version: Option<i64>,
		originating_connection: Option<&str>, now: DateTime<Utc>,
	) -> Result<DomainEvent, Error> {
		let current = self.items.find_by_key(&user_id, &key).await?;

		let probe = WriteProbe { new_value: &value, expected_version, instance_id: &instance_id, now };
		let outcome = self.conflicts.process_write(&user_id, &key, current.as_ref(), &value, metadata.as_ref(), &probe).await?;

		let item = self
			.items
			.upsert(NewItem {
				user_id: user_id.clone(),
				instance_id: instance_id.clone(),
				key: key.clone(),
				value: outcome.value,
				metadata: outcome.metadata,
				timestamp: now.timestamp_millis(),
			})
			.await?;

		self.directory.record(&user_id, &instance_id);
		self.registry.fanout_set(&user_id, &key, originating_connection, item.value.clone(), item.metadata.clone(), item.timestamp, Some(item.version));
		self.queue_for_disconnected_siblings(&user_id, &instance_id, |offline, sibling| {
			offline.queue_update(&user_id, sibling, &key, item.value.clone(), item.metadata.clone(), item.timestamp, Some(item.version));
		});

		let event = DomainEvent::ItemSynced {
			user_id,
			instance_id,
			key,
			value: item.value,
			metadata: item.metadata,
			version: item.version,
			timestamp: item.timestamp,
		};
		let _ = self.events.send(event.clone());
		Ok(event)
	}

	async fn remove_item(
		&self, user_id: String, instance_id: String, key: String, originating_connection: Option<&str>, now: DateTime<Utc>,
	) -> Result<DomainEvent, Error> {
		self.items.delete(&user_id, &key).await?;
		let timestamp = now.timestamp_millis();

		self.directory.record(&user_id, &instance_id);
		self.registry.fanout_remove(&user_id, &key, originating_connection, timestamp);
		self.queue_for_disconnected_siblings(&user_id, &instance_id, |offline, sibling| {
			offline.queue_removal(&user_id, sibling, &key, timestamp);
		});

		let event = DomainEvent::ItemRemoved { user_id, instance_id, key, timestamp };
		let _ = self.events.send(event.clone());
		Ok(event)
	}

	async fn clear_storage(
		&self, user_id: String, instance_id: String, originating_connection: Option<&str>, now: DateTime<Utc>,
	) -> Result<DomainEvent, Error> {
		self.items.clear_all(&user_id).await?;
		let timestamp = now.timestamp_millis();

		self.directory.record(&user_id, &instance_id);
		self.registry.fanout_clear(&user_id, originating_connection, timestamp);

		let event = DomainEvent::StorageCleared { user_id, instance_id, timestamp };
		let _ = self.events.send(event.clone());
		Ok(event)
	}

	/// Every instance this user has ever connected from, minus the
	/// originating one and any currently live connection — those already
	/// received the fan-out directly.
	fn queue_for_disconnected_siblings(&self, user_id: &str, instance_id: &str, mut queue_one: impl FnMut(&OfflineQueue, &str)) {
		let connected: HashSet<String> = self.registry.instances_of_user(user_id).into_iter().collect();
		for sibling in disconnected_siblings(&self.directory.instances_of(user_id), &connected, instance_id) {
			queue_one(&self.offline, &sibling);
		}
	}
}

/// Pure selection logic behind `queue_for_disconnected_siblings`: every
/// known instance except the originator and anything currently connected.
fn disconnected_siblings(known: &[String], connected: &HashSet<String>, originating_instance: &str) -> Vec<String> {
	known.iter().filter(|id| id.as_str() != originating_instance && !connected.contains(id.as_str())).cloned().collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn excludes_originator_and_connected_instances() {
		let known = vec!["a".to_string(), "b".to_string(), "c".to_string()];
		let connected: HashSet<String> = ["b".to_string()].into_iter().collect();
		let mut siblings = disconnected_siblings(&known, &connected, "a");
		siblings.sort();
		assert_eq!(siblings, vec!["c".to_string()]);
	}

	#[test]
	fn empty_known_set_yields_no_siblings() {
		let connected = HashSet::new();
		assert!(disconnected_siblings(&[], &connected, "a").is_empty());
	}
}
