use chrono::{DateTime, Utc};
use serde_json::Value;
use sync_types::{ConflictType, Item};

/// Everything an in-flight write needs to be checked against the stored item.
pub struct WriteProbe<'a> {
	pub new_value: &'a Value,
	pub expected_version: Option<i64>,
	pub instance_id: &'a str,
	pub now: DateTime<Utc>,
}

/// Output of `detect` — at most one conflict type is ever reported per call.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
	pub conflict_type: ConflictType,
	pub reason: String,
	/// Populated only for `ConcurrentUpdate`; drives the <1s severity split in `analyze`.
	pub time_delta_ms: Option<i64>,
}

/// Detects a write conflict against the currently stored item, in the fixed
/// precedence order version mismatch, concurrent update, schema change
/// (§4.D). Returns `None` when no current item exists or no rule matches.
pub fn detect(current: &Item, probe: &WriteProbe<'_>) -> Option<Detection> {
	if let Some(expected) = probe.expected_version {
		if expected != current.version {
			return Some(Detection {
				conflict_type: ConflictType::VersionMismatch,
				reason: format!("expected version {expected}, current version {}", current.version),
				time_delta_ms: None,
			});
		}
	}

	let delta_ms = (probe.now - current.last_modified).num_milliseconds();
	if delta_ms < 5000 && current.value != *probe.new_value && probe.instance_id != current.instance_id {
		return Some(Detection {
			conflict_type: ConflictType::ConcurrentUpdate,
			reason: format!("concurrent update {delta_ms}ms after the last write, from a different instance"),
			time_delta_ms: Some(delta_ms),
		});
	}

	if let Some(reason) = schema_diff(&current.value, probe.new_value) {
		return Some(Detection { conflict_type: ConflictType::SchemaChange, reason, time_delta_ms: None });
	}

	None
}

/// Compares two values as JSON objects. Non-object values are skipped rather
/// than treated as a conflict — mirrors "JSON-parse failures are logged and
/// skipped" for a representation where both sides are already parsed.
fn schema_diff(current: &Value, incoming: &Value) -> Option<String> {
	let (Value::Object(a), Value::Object(b)) = (current, incoming) else {
		return None;
	};

	let a_keys: std::collections::BTreeSet<&String> = a.keys().collect();
	let b_keys: std::collections::BTreeSet<&String> = b.keys().collect();
	if a_keys != b_keys {
		return Some(format!("top-level keys changed: {a_keys:?} -> {b_keys:?}"));
	}

	for key in a_keys {
		let ta = json_type_name(&a[key]);
		let tb = json_type_name(&b[key]);
		if ta != tb {
			return Some(format!("key '{key}' changed type: {ta} -> {tb}"));
		}
	}
	None
}

fn json_type_name(v: &Value) -> &'static str {
	match v {
		Value::Null => "null",
		Value::Bool(_) => "bool",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use serde_json::json;

	fn item(value: Value, version: i64, instance_id: &str, last_modified: DateTime<Utc>) -> Item {
		Item {
			user_id: "u".into(),
			key: "k".into(),
			value,
			metadata: None,
			version,
			last_modified,
			timestamp: last_modified.timestamp_millis(),
			instance_id: instance_id.into(),
			size: 0,
			is_deleted: false,
		}
	}

	#[test]
	fn version_mismatch_wins_over_everything_else() {
		let now = Utc::now();
		let current = item(json!({"x": 1}), 3, "b", now);
		let probe = WriteProbe { new_value: &json!({"x": 2}), expected_version: Some(2), instance_id: "a", now };
		let d = detect(&current, &probe).unwrap();
		assert_eq!(d.conflict_type, ConflictType::VersionMismatch);
	}

	#[test]
	fn concurrent_update_requires_different_instance_and_value() {
		let now = Utc::now();
		let current = item(json!({"x": 1}), 3, "a", now - Duration::milliseconds(1000));
		let probe = WriteProbe { new_value: &json!({"x": 2}), expected_version: None, instance_id: "b", now };
		let d = detect(&current, &probe).unwrap();
		assert_eq!(d.conflict_type, ConflictType::ConcurrentUpdate);
		assert_eq!(d.time_delta_ms, Some(1000));
	}

	#[test]
	fn same_instance_is_not_a_conflict() {
		let now = Utc::now();
		let current = item(json!({"x": 1}), 3, "a", now - Duration::milliseconds(100));
		let probe = WriteProbe { new_value: &json!({"x": 2}), expected_version: None, instance_id: "a", now };
		assert!(detect(&current, &probe).is_none());
	}

	#[test]
	fn schema_change_on_type_mismatch() {
		let now = Utc::now();
		let current = item(json!({"a": 1, "b": 2}), 3, "a", now - Duration::seconds(30));
		let probe = WriteProbe { new_value: &json!({"a": 1, "c": 3}), expected_version: None, instance_id: "a", now };
		let d = detect(&current, &probe).unwrap();
		assert_eq!(d.conflict_type, ConflictType::SchemaChange);
	}

	#[test]
	fn non_object_values_never_trigger_schema_change() {
		let now = Utc::now();
		let current = item(json!([1, 2, 3]), 3, "a", now - Duration::seconds(30));
		let probe = WriteProbe { new_value: &json!([2, 3, 4]), expected_version: None, instance_id: "a", now };
		assert!(detect(&current, &probe).is_none());
	}
}
