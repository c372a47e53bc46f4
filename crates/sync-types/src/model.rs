use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A versioned key/value item owned by a single user.
///
/// Identity is the pair `(user_id, key)`; `version` increases strictly on
/// every accepted write and `is_deleted` hides soft-deleted rows from reads
/// while retaining them for audit (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
	pub user_id: String,
	pub key: String,
	pub value: serde_json::Value,
	pub metadata: Option<serde_json::Value>,
	pub version: i64,
	pub last_modified: DateTime<Utc>,
	pub timestamp: i64,
	pub instance_id: String,
	pub size: i64,
	pub is_deleted: bool,
}

impl Item {
	/// UTF-8 byte length of the serialized value, per §3's invariant that
	/// `size` tracks the stored value encoding.
	pub fn encoded_size(value: &serde_json::Value) -> i64 {
		serde_json::to_string(value).map(|s| s.len() as i64).unwrap_or(0)
	}
}

/// A request to write `key` for `user_id`, prior to version assignment.
#[derive(Debug, Clone)]
pub struct NewItem {
	pub user_id: String,
	pub instance_id: String,
	pub key: String,
	pub value: serde_json::Value,
	pub metadata: Option<serde_json::Value>,
	pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
	VersionMismatch,
	ConcurrentUpdate,
	SchemaChange,
	DataCorruption,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
	Pending,
	Resolved,
	Escalated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
	LastWriteWins,
	FirstWriteWins,
	Merge,
	Manual,
	AiAssisted,
}

impl ResolutionStrategy {
	pub const ALL: [Self; 5] = [Self::LastWriteWins, Self::FirstWriteWins, Self::Merge, Self::Manual, Self::AiAssisted];

	pub fn description(self) -> &'static str {
		match self {
			Self::LastWriteWins => "the update with the newer timestamp wins; ties favor the incoming update",
			Self::FirstWriteWins => "the existing, older-or-equal value is kept",
			Self::Merge => "objects are deep-merged and arrays set-unioned; otherwise falls back to last-write-wins",
			Self::Manual => "both values are returned to the caller for human resolution",
			Self::AiAssisted => "currently an alias for merge with boosted confidence",
		}
	}
}

/// An audit record for a detected write conflict (§3 "Conflict record").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
	pub id: Uuid,
	pub user_id: String,
	pub key: String,
	pub conflict_type: ConflictType,
	pub original_value: serde_json::Value,
	pub conflicting_value: serde_json::Value,
	pub resolution_strategy: Option<ResolutionStrategy>,
	pub resolved_value: Option<serde_json::Value>,
	pub reason: String,
	pub confidence: f64,
	pub status: ConflictStatus,
	pub created_at: DateTime<Utc>,
	pub resolved_at: Option<DateTime<Utc>>,
	pub ai_model: Option<String>,
	pub human_reviewed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum QuotaPeriod {
	Minute = 0,
	Hour = 1,
	Day = 2,
	Month = 3,
}

impl QuotaPeriod {
	pub const ALL: [Self; 4] = [Self::Minute, Self::Hour, Self::Day, Self::Month];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Minute => "minute",
			Self::Hour => "hour",
			Self::Day => "day",
			Self::Month => "month",
		}
	}
}

/// One rolling quota counter. `limit = None` means unlimited.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaWindow {
	pub limit: Option<i64>,
	pub current_usage: i64,
}

impl QuotaWindow {
	pub fn is_exceeded(&self) -> bool {
		matches!(self.limit, Some(limit) if self.current_usage >= limit)
	}
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionMode {
	Allow,
	Deny,
}

/// API-key restriction configuration (§3 "API key").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
	pub allowed_key_patterns: Vec<String>,
	pub blocked_key_patterns: Vec<String>,
	pub allowed_domains: Vec<String>,
	pub ip_restrictions: Vec<String>,
	pub country_restrictions: Vec<String>,
	pub allowed_methods: Vec<String>,
	pub allowed_user_agent_patterns: Vec<String>,
	pub blocked_user_agent_patterns: Vec<String>,
	pub restriction_mode: Option<RestrictionMode>,
	pub require_https: bool,
	pub max_users_per_ip: Option<u32>,
	pub max_users_per_domain: Option<u32>,
}

/// A caller credential, with restrictions and rolling quota counters
/// (§3 "API key", §4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
	pub id: Uuid,
	pub secret: String,
	pub is_active: bool,
	pub expires_at: Option<DateTime<Utc>>,
	pub restrictions: Restrictions,
	pub minute: QuotaWindow,
	pub hour: QuotaWindow,
	pub day: QuotaWindow,
	pub month: QuotaWindow,
	pub total_calls: i64,
	pub successful_calls: i64,
	pub failed_calls: i64,
	pub security_violations: i64,
	pub last_used_at: Option<DateTime<Utc>>,
	pub last_failure_at: Option<DateTime<Utc>>,
	pub last_failure_reason: Option<String>,
	pub avg_response_time_ms: f64,
}

impl ApiKey {
	pub fn quota(&self, period: QuotaPeriod) -> &QuotaWindow {
		match period {
			QuotaPeriod::Minute => &self.minute,
			QuotaPeriod::Hour => &self.hour,
			QuotaPeriod::Day => &self.day,
			QuotaPeriod::Month => &self.month,
		}
	}

	pub fn quota_mut(&mut self, period: QuotaPeriod) -> &mut QuotaWindow {
		match period {
			QuotaPeriod::Minute => &mut self.minute,
			QuotaPeriod::Hour => &mut self.hour,
			QuotaPeriod::Day => &mut self.day,
			QuotaPeriod::Month => &mut self.month,
		}
	}

	/// First exceeded quota period, in the order minute, hour, day, month.
	pub fn exceeded_period(&self) -> Option<QuotaPeriod> {
		QuotaPeriod::ALL.into_iter().find(|p| self.quota(*p).is_exceeded())
	}
}

/// A live connection of one device for one user (§3 "Session").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
	pub user_id: String,
	pub instance_id: String,
	pub connection_id: String,
	pub connected_at: DateTime<Utc>,
	pub last_activity: DateTime<Utc>,
	pub client_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
	Set,
	Remove,
}

/// An update buffered for a disconnected `(user_id, instance_id)` (§3
/// "Queued update").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedUpdate {
	pub kind: UpdateKind,
	pub user_id: String,
	pub instance_id: String,
	pub key: String,
	pub value: Option<serde_json::Value>,
	pub metadata: Option<serde_json::Value>,
	pub timestamp: i64,
	pub version: Option<i64>,
}
