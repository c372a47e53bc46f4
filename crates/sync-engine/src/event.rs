use serde_json::Value;

/// Exactly one of these is published per successful command (§4.B).
/// Subscribers within this process are `sync-realtime`'s fan-out and
/// `sync-queue`'s offline-queue writer; delivery to both is at-least-once.
#[derive(Debug, Clone)]
pub enum DomainEvent {
	ItemSynced {
		user_id: String,
		instance_id: String,
		key: String,
		value: Value,
		metadata: Option<Value>,
		version: i64,
		timestamp: i64,
	},
	ItemRemoved {
		user_id: String,
		instance_id: String,
		key: String,
		timestamp: i64,
	},
	StorageCleared {
		user_id: String,
		instance_id: String,
		timestamp: i64,
	},
}

impl DomainEvent {
	pub fn user_id(&self) -> &str {
		match self {
			Self::ItemSynced { user_id, .. } | Self::ItemRemoved { user_id, .. } | Self::StorageCleared { user_id, .. } => user_id,
		}
	}

	pub fn timestamp(&self) -> i64 {
		match self {
			Self::ItemSynced { timestamp, .. } | Self::ItemRemoved { timestamp, .. } | Self::StorageCleared { timestamp, .. } => *timestamp,
		}
	}
}
