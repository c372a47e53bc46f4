use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sync_types::ResolutionStrategy;

/// One side of a conflicting write: the stored value and its recorded
/// timestamp/metadata.
pub struct Side<'a> {
	pub value: &'a Value,
	pub timestamp: i64,
	pub metadata: Option<&'a Value>,
}

#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
	pub value: Value,
	pub metadata: Option<Value>,
	pub confidence: f64,
	pub strategy: ResolutionStrategy,
	pub reason: String,
	pub needs_manual_resolution: bool,
}

/// Applies a resolution strategy to the existing and incoming sides of a
/// conflict (§4.D "Strategies"). Metadata is always the entry-wise merge of
/// both sides plus a `mergedAt` stamp, independent of which strategy wins.
pub fn resolve(strategy: ResolutionStrategy, existing: &Side<'_>, incoming: &Side<'_>, ai_model: Option<&str>, now: DateTime<Utc>) -> ResolutionOutcome {
	let metadata = Some(merge_metadata(existing.metadata, incoming.metadata, now));
	let mut outcome = match strategy {
		ResolutionStrategy::LastWriteWins => last_write_wins(existing, incoming),
		ResolutionStrategy::FirstWriteWins => first_write_wins(existing, incoming),
		ResolutionStrategy::Merge => merge(existing, incoming),
		ResolutionStrategy::Manual => manual(existing, incoming),
		ResolutionStrategy::AiAssisted => ai_assisted(existing, incoming, ai_model),
	};
	outcome.metadata = metadata;
	outcome
}

fn last_write_wins(existing: &Side<'_>, incoming: &Side<'_>) -> ResolutionOutcome {
	let incoming_wins = incoming.timestamp >= existing.timestamp;
	let value = if incoming_wins { incoming.value.clone() } else { existing.value.clone() };
	ResolutionOutcome {
		value,
		metadata: None,
		confidence: 0.8,
		strategy: ResolutionStrategy::LastWriteWins,
		reason: if incoming_wins { "last-write-wins: incoming update is newer (or tied)".into() } else { "last-write-wins: existing value is newer".into() },
		needs_manual_resolution: false,
	}
}

fn first_write_wins(existing: &Side<'_>, incoming: &Side<'_>) -> ResolutionOutcome {
	let existing_wins = existing.timestamp <= incoming.timestamp;
	let value = if existing_wins { existing.value.clone() } else { incoming.value.clone() };
	ResolutionOutcome {
		value,
		metadata: None,
		confidence: 0.7,
		strategy: ResolutionStrategy::FirstWriteWins,
		reason: if existing_wins { "first-write-wins: existing value is older-or-equal".into() } else { "first-write-wins: incoming update predates the stored value".into() },
		needs_manual_resolution: false,
	}
}

fn merge(existing: &Side<'_>, incoming: &Side<'_>) -> ResolutionOutcome {
	match (existing.value, incoming.value) {
		(Value::Object(a), Value::Object(b)) => ResolutionOutcome {
			value: Value::Object(deep_merge(a, b)),
			metadata: None,
			confidence: 0.6,
			strategy: ResolutionStrategy::Merge,
			reason: "merge: objects deep-merged, incoming keys win at collisions".into(),
			needs_manual_resolution: false,
		},
		(Value::Array(a), Value::Array(b)) => ResolutionOutcome {
			value: Value::Array(set_union(a, b)),
			metadata: None,
			confidence: 0.7,
			strategy: ResolutionStrategy::Merge,
			reason: "merge: arrays set-unioned, preserving order of first appearance".into(),
			needs_manual_resolution: false,
		},
		_ => {
			let mut fallback = last_write_wins(existing, incoming);
			fallback.strategy = ResolutionStrategy::Merge;
			fallback.reason = "merge fallback".into();
			fallback
		}
	}
}

fn manual(existing: &Side<'_>, incoming: &Side<'_>) -> ResolutionOutcome {
	let envelope = serde_json::json!({
		"existing": { "value": existing.value, "timestamp": existing.timestamp },
		"incoming": { "value": incoming.value, "timestamp": incoming.timestamp },
	});
	ResolutionOutcome {
		value: envelope,
		metadata: None,
		confidence: 0.0,
		strategy: ResolutionStrategy::Manual,
		reason: "manual resolution required".into(),
		needs_manual_resolution: true,
	}
}

fn ai_assisted(existing: &Side<'_>, incoming: &Side<'_>, ai_model: Option<&str>) -> ResolutionOutcome {
	let merged = merge(existing, incoming);
	let model = ai_model.unwrap_or("heuristic-merge");
	ResolutionOutcome {
		confidence: (merged.confidence + 0.2_f64).min(0.95),
		strategy: ResolutionStrategy::AiAssisted,
		reason: format!("ai-assisted ({model}): {}", merged.reason),
		..merged
	}
}

fn deep_merge(a: &Map<String, Value>, b: &Map<String, Value>) -> Map<String, Value> {
	let mut out = a.clone();
	for (k, bv) in b {
		match out.get(k) {
			Some(Value::Object(av)) if bv.is_object() => {
				let merged = deep_merge(av, bv.as_object().expect("checked above"));
				out.insert(k.clone(), Value::Object(merged));
			}
			_ => {
				out.insert(k.clone(), bv.clone());
			}
		}
	}
	out
}

fn set_union(a: &[Value], b: &[Value]) -> Vec<Value> {
	let mut out = Vec::with_capacity(a.len() + b.len());
	for v in a.iter().chain(b.iter()) {
		if !out.contains(v) {
			out.push(v.clone());
		}
	}
	out
}

fn merge_metadata(existing: Option<&Value>, incoming: Option<&Value>, now: DateTime<Utc>) -> Value {
	let mut out = existing.and_then(Value::as_object).cloned().unwrap_or_default();
	if let Some(incoming_obj) = incoming.and_then(Value::as_object) {
		for (k, v) in incoming_obj {
			out.insert(k.clone(), v.clone());
		}
	}
	out.insert("mergedAt".into(), Value::String(now.to_rfc3339()));
	Value::Object(out)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn last_write_wins_ties_favor_incoming() {
		let existing = Side { value: &json!(1), timestamp: 100, metadata: None };
		let incoming = Side { value: &json!(2), timestamp: 100, metadata: None };
		let out = resolve(ResolutionStrategy::LastWriteWins, &existing, &incoming, None, Utc::now());
		assert_eq!(out.value, json!(2));
		assert_eq!(out.confidence, 0.8);
	}

	#[test]
	fn last_write_wins_and_first_write_wins_are_duals() {
		let existing = Side { value: &json!("old"), timestamp: 100, metadata: None };
		let incoming = Side { value: &json!("new"), timestamp: 200, metadata: None };
		let lww = resolve(ResolutionStrategy::LastWriteWins, &existing, &incoming, None, Utc::now());
		let fww = resolve(ResolutionStrategy::FirstWriteWins, &existing, &incoming, None, Utc::now());
		assert_eq!(lww.value, json!("new"));
		assert_eq!(fww.value, json!("old"));

		let swapped_existing = Side { value: &json!("old"), timestamp: 200, metadata: None };
		let swapped_incoming = Side { value: &json!("new"), timestamp: 100, metadata: None };
		let lww2 = resolve(ResolutionStrategy::LastWriteWins, &swapped_existing, &swapped_incoming, None, Utc::now());
		let fww2 = resolve(ResolutionStrategy::FirstWriteWins, &swapped_existing, &swapped_incoming, None, Utc::now());
		assert_eq!(lww2.value, json!("old"));
		assert_eq!(fww2.value, json!("new"));
	}

	#[test]
	fn merge_on_disjoint_objects_is_shallow_union() {
		let existing = Side { value: &json!({"a": 1}), timestamp: 0, metadata: None };
		let incoming = Side { value: &json!({"b": 2}), timestamp: 0, metadata: None };
		let out = resolve(ResolutionStrategy::Merge, &existing, &incoming, None, Utc::now());
		assert_eq!(out.value, json!({"a": 1, "b": 2}));
	}

	#[test]
	fn merge_on_arrays_is_order_preserving_set_union() {
		let existing = Side { value: &json!([1, 2, 3]), timestamp: 0, metadata: None };
		let incoming = Side { value: &json!([2, 3, 4]), timestamp: 0, metadata: None };
		let out = resolve(ResolutionStrategy::Merge, &existing, &incoming, None, Utc::now());
		assert_eq!(out.value, json!([1, 2, 3, 4]));
		assert_eq!(out.confidence, 0.7);
	}

	#[test]
	fn merge_falls_back_to_last_write_wins_on_scalars() {
		let existing = Side { value: &json!(1), timestamp: 0, metadata: None };
		let incoming = Side { value: &json!(2), timestamp: 5, metadata: None };
		let out = resolve(ResolutionStrategy::Merge, &existing, &incoming, None, Utc::now());
		assert_eq!(out.value, json!(2));
		assert_eq!(out.reason, "merge fallback");
	}

	#[test]
	fn manual_needs_resolution_and_carries_both_sides() {
		let existing = Side { value: &json!(1), timestamp: 0, metadata: None };
		let incoming = Side { value: &json!(2), timestamp: 5, metadata: None };
		let out = resolve(ResolutionStrategy::Manual, &existing, &incoming, None, Utc::now());
		assert!(out.needs_manual_resolution);
		assert_eq!(out.confidence, 0.0);
	}

	#[test]
	fn ai_assisted_boosts_merge_confidence_and_caps_at_0_95() {
		let existing = Side { value: &json!([1, 2, 3]), timestamp: 0, metadata: None };
		let incoming = Side { value: &json!([2, 3, 4]), timestamp: 0, metadata: None };
		let out = resolve(ResolutionStrategy::AiAssisted, &existing, &incoming, Some("gpt-test"), Utc::now());
		assert!((out.confidence - 0.9).abs() < 1e-9);
		assert!(out.reason.contains("gpt-test"));
	}

	#[test]
	fn metadata_merge_adds_merged_at() {
		let existing_meta = json!({"tag": "old"});
		let incoming_meta = json!({"tag": "new", "extra": true});
		let existing = Side { value: &json!(1), timestamp: 0, metadata: Some(&existing_meta) };
		let incoming = Side { value: &json!(2), timestamp: 1, metadata: Some(&incoming_meta) };
		let out = resolve(ResolutionStrategy::LastWriteWins, &existing, &incoming, None, Utc::now());
		let meta = out.metadata.unwrap();
		assert_eq!(meta["tag"], json!("new"));
		assert_eq!(meta["extra"], json!(true));
		assert!(meta.get("mergedAt").is_some());
	}
}
