use crate::analyze::{self, Analysis};
use crate::detect::{self, Detection, WriteProbe};
use crate::error::Error;
use crate::metrics::ConflictMetricsSink;
use crate::resolve::{self, ResolutionOutcome, Side};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use sync_storage::{ConflictRepository, ConflictStats};
use sync_types::{ConflictRecord, ConflictStatus, ConflictType, Item, ResolutionStrategy};
use uuid::Uuid;

/// Result of running a write through the conflict pipeline: the value (and
/// metadata) actually persisted by `sync-engine`, plus the audit record if a
/// conflict was detected.
pub struct WriteOutcome {
	pub value: Value,
	pub metadata: Option<Value>,
	pub conflict: Option<ConflictRecord>,
}

/// Owns conflict detection, analysis, and resolution, and the audit trail in
/// `sync-storage` (§4.D).
#[derive(Clone)]
pub struct ConflictEngine {
	repo: ConflictRepository,
	metrics: Arc<dyn ConflictMetricsSink>,
}

impl ConflictEngine {
	pub fn new(repo: ConflictRepository, metrics: Arc<dyn ConflictMetricsSink>) -> Self {
		Self { repo, metrics }
	}

	/// Pure detect+analyze, with no storage side effects — backs
	/// `POST /conflicts/analyze`.
	pub fn analyze_write(current: Option<&Item>, probe: &WriteProbe<'_>) -> Option<(Detection, Analysis)> {
		let current = current?;
		let detection = detect::detect(current, probe)?;
		let analysis = analyze::analyze(&detection);
		Some((detection, analysis))
	}

	/// Write-time pipeline (§4.D "Write-time pipeline"): detect against the
	/// current item; on conflict, persist a pending audit record and resolve
	/// inline under the default strategy so the caller always has a value to
	/// store. The audit record itself stays pending — only explicit
	/// resolve-by-id transitions it.
	pub async fn process_write(
		&self, user_id: &str, key: &str, current: Option<&Item>, new_value: &Value, new_metadata: Option<&Value>, probe: &WriteProbe<'_>,
	) -> Result<WriteOutcome, Error> {
		let Some(current) = current else {
			return Ok(WriteOutcome { value: new_value.clone(), metadata: new_metadata.cloned(), conflict: None });
		};

		let Some(detection) = detect::detect(current, probe) else {
			return Ok(WriteOutcome { value: new_value.clone(), metadata: new_metadata.cloned(), conflict: None });
		};

		tracing::warn!(user_id, key, conflict_type = ?detection.conflict_type, reason = %detection.reason, "write conflict detected");
		self.metrics.record_conflict(conflict_type_label(detection.conflict_type));

		let existing_side = Side { value: &current.value, timestamp: current.timestamp, metadata: current.metadata.as_ref() };
		let incoming_timestamp = probe.now.timestamp_millis();
		let incoming_side = Side { value: new_value, timestamp: incoming_timestamp, metadata: new_metadata };
		let outcome = resolve::resolve(ResolutionStrategy::LastWriteWins, &existing_side, &incoming_side, None, probe.now);

		let record = ConflictRecord {
			id: Uuid::new_v4(),
			user_id: user_id.to_string(),
			key: key.to_string(),
			conflict_type: detection.conflict_type,
			original_value: current.value.clone(),
			conflicting_value: new_value.clone(),
			resolution_strategy: None,
			resolved_value: None,
			reason: detection.reason.clone(),
			confidence: 0.0,
			status: ConflictStatus::Pending,
			created_at: probe.now,
			resolved_at: None,
			ai_model: None,
			human_reviewed: false,
		};
		self.repo.create(&record).await?;

		Ok(WriteOutcome { value: outcome.value, metadata: outcome.metadata, conflict: Some(record) })
	}

	pub async fn history(&self, user_id: &str, key: &str) -> Result<Vec<ConflictRecord>, Error> {
		Ok(self.repo.history(user_id, key).await?)
	}

	pub async fn stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<ConflictStats, Error> {
		Ok(self.repo.stats(start, end).await?)
	}

	/// Explicit resolve-by-id (§4.D "Audit trail"). Idempotent once resolved:
	/// re-resolving an already-resolved record returns its existing
	/// resolution unchanged, regardless of the strategy passed in (§9,
	/// "Conflict write semantics").
	///
	/// `original_value`/`conflicting_value` carry no per-side timestamps, so
	/// last-write-wins/first-write-wins treat the conflicting value as the
	/// later write: `original` sorts before `conflicting`. This is a
	/// deliberate reading of an otherwise unspecified detail — see
	/// DESIGN.md.
	pub async fn resolve_by_id(
		&self, id: Uuid, strategy: ResolutionStrategy, ai_model: Option<&str>, user_review: Option<bool>, now: DateTime<Utc>,
	) -> Result<ResolutionOutcome, Error> {
		let record = self.repo.get(id).await?.ok_or(Error::NotFound)?;

		if record.status == ConflictStatus::Resolved {
			return Ok(ResolutionOutcome {
				value: record.resolved_value.clone().unwrap_or(Value::Null),
				metadata: None,
				confidence: record.confidence,
				strategy: record.resolution_strategy.unwrap_or(ResolutionStrategy::LastWriteWins),
				reason: record.reason.clone(),
				needs_manual_resolution: false,
			});
		}

		let existing = Side { value: &record.original_value, timestamp: 0, metadata: None };
		let incoming = Side { value: &record.conflicting_value, timestamp: 1, metadata: None };
		let outcome = resolve::resolve(strategy, &existing, &incoming, ai_model, now);

		if !outcome.needs_manual_resolution {
			self.repo.resolve(id, &outcome.value, outcome.strategy, &outcome.reason, outcome.confidence, ai_model, now).await?;
		}

		if let Some(reviewed) = user_review {
			self.repo.set_human_reviewed(id, reviewed).await?;
		}

		Ok(outcome)
	}
}

fn conflict_type_label(t: ConflictType) -> &'static str {
	match t {
		ConflictType::VersionMismatch => "version_mismatch",
		ConflictType::ConcurrentUpdate => "concurrent_update",
		ConflictType::SchemaChange => "schema_change",
		ConflictType::DataCorruption => "data_corruption",
	}
}
