use serde::Serialize;
use serde_json::Value;
use sync_types::QueuedUpdate;

/// A message pushed to a live connection over the `/sync` WebSocket
/// namespace (§4.E "Fan-out rules", §6 "Server emits").
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
	#[serde(rename = "sync:update")]
	Update { key: String, value: Value, metadata: Option<Value>, timestamp: i64, version: Option<i64> },

	#[serde(rename = "sync:remove")]
	Remove { key: String, timestamp: i64 },

	#[serde(rename = "sync:clear")]
	Clear { timestamp: i64 },

	#[serde(rename = "pending-updates")]
	PendingUpdates { updates: Vec<QueuedUpdate> },
}
