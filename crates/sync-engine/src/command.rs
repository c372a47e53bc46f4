use serde_json::Value;

/// The three command shapes of §4.B. Each runs inside a storage transaction
/// and publishes exactly one `DomainEvent` on success.
#[derive(Debug, Clone)]
pub enum Command {
	SetItem {
		user_id: String,
		instance_id: String,
		key: String,
		value: Value,
		metadata: Option<Value>,
		expected_version: Option<i64>,
	},
	RemoveItem {
		user_id: String,
		instance_id: String,
		key: String,
	},
	ClearStorage {
		user_id: String,
		instance_id: String,
	},
}
