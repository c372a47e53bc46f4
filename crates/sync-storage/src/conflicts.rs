use crate::error::Error;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sync_types::{ConflictRecord, ConflictStatus, ConflictType, ResolutionStrategy};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct ConflictRow {
	id: Uuid,
	user_id: String,
	key: String,
	conflict_type: String,
	original_value: String,
	conflicting_value: String,
	resolution_strategy: Option<String>,
	resolved_value: Option<String>,
	reason: String,
	confidence: f64,
	status: String,
	created_at: DateTime<Utc>,
	resolved_at: Option<DateTime<Utc>>,
	ai_model: Option<String>,
	human_reviewed: bool,
}

fn conflict_type_str(t: ConflictType) -> &'static str {
	match t {
		ConflictType::VersionMismatch => "version_mismatch",
		ConflictType::ConcurrentUpdate => "concurrent_update",
		ConflictType::SchemaChange => "schema_change",
		ConflictType::DataCorruption => "data_corruption",
	}
}

fn parse_conflict_type(s: &str) -> ConflictType {
	match s {
		"version_mismatch" => ConflictType::VersionMismatch,
		"concurrent_update" => ConflictType::ConcurrentUpdate,
		"schema_change" => ConflictType::SchemaChange,
		_ => ConflictType::DataCorruption,
	}
}

fn status_str(s: ConflictStatus) -> &'static str {
	match s {
		ConflictStatus::Pending => "pending",
		ConflictStatus::Resolved => "resolved",
		ConflictStatus::Escalated => "escalated",
	}
}

fn parse_status(s: &str) -> ConflictStatus {
	match s {
		"resolved" => ConflictStatus::Resolved,
		"escalated" => ConflictStatus::Escalated,
		_ => ConflictStatus::Pending,
	}
}

fn strategy_str(s: ResolutionStrategy) -> &'static str {
	match s {
		ResolutionStrategy::LastWriteWins => "last-write-wins",
		ResolutionStrategy::FirstWriteWins => "first-write-wins",
		ResolutionStrategy::Merge => "merge",
		ResolutionStrategy::Manual => "manual",
		ResolutionStrategy::AiAssisted => "ai-assisted",
	}
}

fn parse_strategy(s: &str) -> Option<ResolutionStrategy> {
	match s {
		"last-write-wins" => Some(ResolutionStrategy::LastWriteWins),
		"first-write-wins" => Some(ResolutionStrategy::FirstWriteWins),
		"merge" => Some(ResolutionStrategy::Merge),
		"manual" => Some(ResolutionStrategy::Manual),
		"ai-assisted" => Some(ResolutionStrategy::AiAssisted),
		_ => None,
	}
}

impl ConflictRow {
	fn into_record(self) -> Result<ConflictRecord, Error> {
		Ok(ConflictRecord {
			id: self.id,
			user_id: self.user_id,
			key: self.key,
			conflict_type: parse_conflict_type(&self.conflict_type),
			original_value: serde_json::from_str(&self.original_value)?,
			conflicting_value: serde_json::from_str(&self.conflicting_value)?,
			resolution_strategy: self.resolution_strategy.as_deref().and_then(parse_strategy),
			resolved_value: self.resolved_value.as_deref().map(serde_json::from_str).transpose()?,
			reason: self.reason,
			confidence: self.confidence,
			status: parse_status(&self.status),
			created_at: self.created_at,
			resolved_at: self.resolved_at,
			ai_model: self.ai_model,
			human_reviewed: self.human_reviewed,
		})
	}
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictTypeStats {
	pub conflict_type: String,
	pub total: i64,
	pub resolved: i64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictStats {
	pub total: i64,
	pub resolved: i64,
	pub auto_resolution_rate: f64,
	pub by_type: Vec<ConflictTypeStats>,
}

/// Repository for conflict audit records (§3 "Conflict record", §4.D).
#[derive(Clone)]
pub struct ConflictRepository {
	pool: PgPool,
}

impl ConflictRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn create(&self, record: &ConflictRecord) -> Result<(), Error> {
		sqlx::query(
			r#"
            INSERT INTO sync_conflicts
                (id, user_id, key, conflict_type, original_value, conflicting_value, resolution_strategy,
                 resolved_value, reason, confidence, status, created_at, resolved_at, ai_model, human_reviewed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
		)
		.bind(record.id)
		.bind(&record.user_id)
		.bind(&record.key)
		.bind(conflict_type_str(record.conflict_type))
		.bind(serde_json::to_string(&record.original_value)?)
		.bind(serde_json::to_string(&record.conflicting_value)?)
		.bind(record.resolution_strategy.map(strategy_str))
		.bind(record.resolved_value.as_ref().map(serde_json::to_string).transpose()?)
		.bind(&record.reason)
		.bind(record.confidence)
		.bind(status_str(record.status))
		.bind(record.created_at)
		.bind(record.resolved_at)
		.bind(&record.ai_model)
		.bind(record.human_reviewed)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn get(&self, id: Uuid) -> Result<Option<ConflictRecord>, Error> {
		let row = sqlx::query_as::<_, ConflictRow>(
			"SELECT id, user_id, key, conflict_type, original_value, conflicting_value, resolution_strategy, \
             resolved_value, reason, confidence, status, created_at, resolved_at, ai_model, human_reviewed \
             FROM sync_conflicts WHERE id = $1",
		)
		.bind(id)
		.fetch_optional(&self.pool)
		.await?;
		row.map(ConflictRow::into_record).transpose()
	}

	/// History of conflicts for a given `(user_id, key)`, newest first.
	pub async fn history(&self, user_id: &str, key: &str) -> Result<Vec<ConflictRecord>, Error> {
		let rows = sqlx::query_as::<_, ConflictRow>(
			"SELECT id, user_id, key, conflict_type, original_value, conflicting_value, resolution_strategy, \
             resolved_value, reason, confidence, status, created_at, resolved_at, ai_model, human_reviewed \
             FROM sync_conflicts WHERE user_id = $1 AND key = $2 ORDER BY created_at DESC",
		)
		.bind(user_id)
		.bind(key)
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(ConflictRow::into_record).collect()
	}

	/// Marks a record resolved. Callers must check `status == Pending`
	/// first; §9 requires that re-resolving an already-resolved record is a
	/// no-op, which `sync-conflict` enforces before calling this.
	pub async fn resolve(
		&self, id: Uuid, resolved_value: &serde_json::Value, strategy: ResolutionStrategy, reason: &str, confidence: f64, ai_model: Option<&str>,
		resolved_at: DateTime<Utc>,
	) -> Result<(), Error> {
		sqlx::query(
			r#"
            UPDATE sync_conflicts SET
                resolution_strategy = $1,
                resolved_value = $2,
                reason = $3,
                confidence = $4,
                ai_model = $5,
                status = 'resolved',
                resolved_at = $6
            WHERE id = $7
            "#,
		)
		.bind(strategy_str(strategy))
		.bind(serde_json::to_string(resolved_value)?)
		.bind(reason)
		.bind(confidence)
		.bind(ai_model)
		.bind(resolved_at)
		.bind(id)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn set_human_reviewed(&self, id: Uuid, reviewed: bool) -> Result<(), Error> {
		sqlx::query("UPDATE sync_conflicts SET human_reviewed = $1 WHERE id = $2").bind(reviewed).bind(id).execute(&self.pool).await?;
		Ok(())
	}

	/// `groupBy(conflictType, status)` aggregation over a time range (§4.D
	/// "Statistics").
	pub async fn stats(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<ConflictStats, Error> {
		let totals: (i64, i64) = sqlx::query_as(
			"SELECT COUNT(*), COUNT(*) FILTER (WHERE status = 'resolved') FROM sync_conflicts WHERE created_at BETWEEN $1 AND $2",
		)
		.bind(start)
		.bind(end)
		.fetch_one(&self.pool)
		.await?;

		let by_type: Vec<(String, i64, i64)> = sqlx::query_as(
			"SELECT conflict_type, COUNT(*), COUNT(*) FILTER (WHERE status = 'resolved') \
             FROM sync_conflicts WHERE created_at BETWEEN $1 AND $2 GROUP BY conflict_type",
		)
		.bind(start)
		.bind(end)
		.fetch_all(&self.pool)
		.await?;

		let auto_resolution_rate = if totals.0 > 0 { totals.1 as f64 / totals.0 as f64 } else { 0.0 };

		Ok(ConflictStats {
			total: totals.0,
			resolved: totals.1,
			auto_resolution_rate,
			by_type: by_type
				.into_iter()
				.map(|(conflict_type, total, resolved)| ConflictTypeStats { conflict_type, total, resolved })
				.collect(),
		})
	}
}
