use crate::detect::Detection;
use serde::Serialize;
use sync_types::{ConflictType, ResolutionStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	Low,
	Medium,
	High,
	Critical,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
	pub severity: Severity,
	pub auto_resolvable: bool,
	pub recommended_strategy: ResolutionStrategy,
	pub reason: String,
}

/// Maps a detection to severity/auto-resolvability/recommended-strategy
/// (§4.D "Analysis"). `Detection` carries enough context (the concurrent-
/// update time delta) to make the <1s split without re-querying storage.
pub fn analyze(detection: &Detection) -> Analysis {
	match detection.conflict_type {
		ConflictType::VersionMismatch => Analysis {
			severity: Severity::High,
			auto_resolvable: true,
			recommended_strategy: ResolutionStrategy::Merge,
			reason: detection.reason.clone(),
		},
		ConflictType::ConcurrentUpdate => {
			let severity = match detection.time_delta_ms {
				Some(delta) if delta < 1000 => Severity::Critical,
				_ => Severity::High,
			};
			Analysis { severity, auto_resolvable: true, recommended_strategy: ResolutionStrategy::FirstWriteWins, reason: detection.reason.clone() }
		}
		ConflictType::SchemaChange => {
			Analysis { severity: Severity::Critical, auto_resolvable: false, recommended_strategy: ResolutionStrategy::Manual, reason: detection.reason.clone() }
		}
		ConflictType::DataCorruption => {
			Analysis { severity: Severity::Low, auto_resolvable: true, recommended_strategy: ResolutionStrategy::LastWriteWins, reason: detection.reason.clone() }
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use sync_types::ConflictType;

	fn detection(conflict_type: ConflictType, delta: Option<i64>) -> Detection {
		Detection { conflict_type, reason: "x".into(), time_delta_ms: delta }
	}

	#[test]
	fn concurrent_under_one_second_is_critical() {
		let a = analyze(&detection(ConflictType::ConcurrentUpdate, Some(500)));
		assert_eq!(a.severity, Severity::Critical);
	}

	#[test]
	fn concurrent_at_or_over_one_second_is_high() {
		let a = analyze(&detection(ConflictType::ConcurrentUpdate, Some(4000)));
		assert_eq!(a.severity, Severity::High);
	}

	#[test]
	fn schema_change_is_not_auto_resolvable() {
		let a = analyze(&detection(ConflictType::SchemaChange, None));
		assert!(!a.auto_resolvable);
		assert_eq!(a.recommended_strategy, ResolutionStrategy::Manual);
	}
}
