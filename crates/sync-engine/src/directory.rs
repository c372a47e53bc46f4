use dashmap::{DashMap, DashSet};

/// Tracks every `instanceId` ever seen for a user, independent of whether
/// that instance is currently connected. `SessionRegistry` only knows about
/// connections live *right now* — it forgets an instance the moment it
/// disconnects — so offline-queue targeting (§4.F) needs this separate,
/// append-only record of "devices this user owns" to know who else to queue
/// an update for.
#[derive(Debug, Default)]
pub struct InstanceDirectory {
	by_user: DashMap<String, DashSet<String>>,
}

impl InstanceDirectory {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record(&self, user_id: &str, instance_id: &str) {
		self.by_user.entry(user_id.to_string()).or_default().insert(instance_id.to_string());
	}

	pub fn instances_of(&self, user_id: &str) -> Vec<String> {
		self.by_user.get(user_id).map(|set| set.iter().map(|e| e.key().clone()).collect()).unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn records_are_deduplicated_per_user() {
		let dir = InstanceDirectory::new();
		dir.record("u1", "a");
		dir.record("u1", "a");
		dir.record("u1", "b");
		let mut instances = dir.instances_of("u1");
		instances.sort();
		assert_eq!(instances, vec!["a".to_string(), "b".to_string()]);
	}

	#[test]
	fn unknown_user_has_no_instances() {
		let dir = InstanceDirectory::new();
		assert!(dir.instances_of("nobody").is_empty());
	}
}
