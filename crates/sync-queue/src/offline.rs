use crate::metrics::QueueMetricsSink;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::DashSet;
use serde_json::Value;
use std::collections::VecDeque;
use sync_types::{QueuedUpdate, UpdateKind};

const MAX_QUEUE_LEN: usize = 100;
const MAX_AGE: Duration = Duration::hours(1);

#[derive(Debug, Clone, Copy, Default)]
pub struct SweepStats {
	pub evicted_entries: usize,
	pub removed_queues: usize,
}

/// Per-`(userId, instanceId)` bounded, newest-first update buffer for
/// disconnected devices (§3 "Queued update", §4.F).
#[derive(Debug, Default)]
pub struct OfflineQueue {
	queues: DashMap<(String, String), VecDeque<QueuedUpdate>>,
	by_user: DashMap<String, DashSet<String>>,
}

impl OfflineQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn queue_update(&self, user_id: &str, instance_id: &str, key: &str, value: Value, metadata: Option<Value>, timestamp: i64, version: Option<i64>) {
		self.push(
			user_id,
			instance_id,
			QueuedUpdate { kind: UpdateKind::Set, user_id: user_id.to_string(), instance_id: instance_id.to_string(), key: key.to_string(), value: Some(value), metadata, timestamp, version },
		);
	}

	pub fn queue_removal(&self, user_id: &str, instance_id: &str, key: &str, timestamp: i64) {
		self.push(
			user_id,
			instance_id,
			QueuedUpdate { kind: UpdateKind::Remove, user_id: user_id.to_string(), instance_id: instance_id.to_string(), key: key.to_string(), value: None, metadata: None, timestamp, version: None },
		);
	}

	fn push(&self, user_id: &str, instance_id: &str, update: QueuedUpdate) {
		let key = (user_id.to_string(), instance_id.to_string());
		let mut entry = self.queues.entry(key).or_default();
		entry.push_front(update);
		if entry.len() > MAX_QUEUE_LEN {
			entry.pop_back();
		}
		self.by_user.entry(user_id.to_string()).or_default().insert(instance_id.to_string());
	}

	/// Snapshot of pending updates, newest-first, optionally filtered to
	/// `timestamp > since`. Opportunistically evicts age-expired entries.
	pub fn pending_updates(&self, user_id: &str, instance_id: &str, since: Option<i64>, now: DateTime<Utc>) -> Vec<QueuedUpdate> {
		let key = (user_id.to_string(), instance_id.to_string());
		let Some(mut entry) = self.queues.get_mut(&key) else { return Vec::new() };
		evict_expired(&mut entry, now);
		match since {
			Some(cutoff) => entry.iter().filter(|u| u.timestamp > cutoff).cloned().collect(),
			None => entry.iter().cloned().collect(),
		}
	}

	/// Drops the queue for one target instance, or all of a user's queues
	/// when `instance_id` is `None` (§4.F "clearQueue").
	pub fn clear_queue(&self, user_id: &str, instance_id: Option<&str>) {
		match instance_id {
			Some(instance_id) => {
				self.queues.remove(&(user_id.to_string(), instance_id.to_string()));
				if let Some(instances) = self.by_user.get(user_id) {
					instances.remove(instance_id);
				}
			}
			None => {
				if let Some((_, instances)) = self.by_user.remove(user_id) {
					for instance_id in instances.iter() {
						self.queues.remove(&(user_id.to_string(), instance_id.key().clone()));
					}
				}
			}
		}
	}

	/// Periodic maintenance: evicts age-expired entries and drops queues
	/// left empty, across every tracked `(userId, instanceId)` (§4.F).
	/// Reports the post-eviction depth of every surviving queue (and `0` for
	/// ones it just dropped) to `metrics`.
	pub fn sweep(&self, now: DateTime<Utc>, metrics: &dyn QueueMetricsSink) -> SweepStats {
		let mut stats = SweepStats::default();
		let empties: Vec<(String, String)> = self
			.queues
			.iter_mut()
			.filter_map(|mut entry| {
				let before = entry.len();
				evict_expired(&mut entry, now);
				stats.evicted_entries += before - entry.len();
				let (user_id, instance_id) = entry.key().clone();
				if entry.is_empty() {
					Some((user_id, instance_id))
				} else {
					metrics.set_queue_depth(&user_id, &instance_id, entry.len());
					None
				}
			})
			.collect();

		for key in empties {
			metrics.set_queue_depth(&key.0, &key.1, 0);
			self.queues.remove(&key);
			if let Some(instances) = self.by_user.get(&key.0) {
				instances.remove(&key.1);
			}
			stats.removed_queues += 1;
		}
		stats
	}
}

fn evict_expired(queue: &mut VecDeque<QueuedUpdate>, now: DateTime<Utc>) {
	let cutoff = (now - MAX_AGE).timestamp_millis();
	while queue.back().is_some_and(|u| u.timestamp < cutoff) {
		queue.pop_back();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn queue_is_newest_first_and_bounded() {
		let q = OfflineQueue::new();
		let now = Utc::now();
		for i in 0..150 {
			q.queue_update("u", "i", "k", json!(i), None, now.timestamp_millis() + i, None);
		}
		let pending = q.pending_updates("u", "i", None, now + Duration::seconds(1));
		assert_eq!(pending.len(), MAX_QUEUE_LEN);
		assert_eq!(pending[0].value, Some(json!(149)));
	}

	#[test]
	fn since_filter_excludes_older_entries() {
		let q = OfflineQueue::new();
		let now = Utc::now();
		q.queue_update("u", "i", "k1", json!(1), None, 1000, None);
		q.queue_update("u", "i", "k2", json!(2), None, 2000, None);
		let pending = q.pending_updates("u", "i", Some(1000), now);
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].key, "k2");
	}

	#[test]
	fn age_expired_entries_are_evicted_on_access() {
		let q = OfflineQueue::new();
		let now = Utc::now();
		let old_ts = (now - Duration::hours(2)).timestamp_millis();
		q.queue_update("u", "i", "stale", json!(1), None, old_ts, None);
		q.queue_update("u", "i", "fresh", json!(2), None, now.timestamp_millis(), None);

		let pending = q.pending_updates("u", "i", None, now);
		assert_eq!(pending.len(), 1);
		assert_eq!(pending[0].key, "fresh");
	}

	#[test]
	fn clear_queue_one_instance_leaves_others() {
		let q = OfflineQueue::new();
		let now = Utc::now();
		q.queue_update("u", "a", "k", json!(1), None, now.timestamp_millis(), None);
		q.queue_update("u", "b", "k", json!(1), None, now.timestamp_millis(), None);
		q.clear_queue("u", Some("a"));
		assert!(q.pending_updates("u", "a", None, now).is_empty());
		assert_eq!(q.pending_updates("u", "b", None, now).len(), 1);
	}

	#[test]
	fn clear_queue_all_drops_every_instance() {
		let q = OfflineQueue::new();
		let now = Utc::now();
		q.queue_update("u", "a", "k", json!(1), None, now.timestamp_millis(), None);
		q.queue_update("u", "b", "k", json!(1), None, now.timestamp_millis(), None);
		q.clear_queue("u", None);
		assert!(q.pending_updates("u", "a", None, now).is_empty());
		assert!(q.pending_updates("u", "b", None, now).is_empty());
	}

	#[test]
	fn sweep_removes_empty_queues() {
		let q = OfflineQueue::new();
		let now = Utc::now();
		let old_ts = (now - Duration::hours(2)).timestamp_millis();
		q.queue_update("u", "i", "stale", json!(1), None, old_ts, None);
		let stats = q.sweep(now, &crate::metrics::NoopQueueMetricsSink);
		assert_eq!(stats.evicted_entries, 1);
		assert_eq!(stats.removed_queues, 1);
	}

	#[test]
	fn sweep_reports_depth_of_surviving_queues() {
		use std::sync::atomic::{AtomicUsize, Ordering};

		#[derive(Default)]
		struct RecordingSink(AtomicUsize);
		impl QueueMetricsSink for RecordingSink {
			fn set_queue_depth(&self, _user_id: &str, _instance_id: &str, depth: usize) {
				self.0.store(depth, Ordering::SeqCst);
			}
		}

		let q = OfflineQueue::new();
		let now = Utc::now();
		q.queue_update("u", "i", "k1", json!(1), None, now.timestamp_millis(), None);
		q.queue_update("u", "i", "k2", json!(2), None, now.timestamp_millis(), None);

		let sink = RecordingSink::default();
		q.sweep(now, &sink);
		assert_eq!(sink.0.load(Ordering::SeqCst), 2);
	}
}
