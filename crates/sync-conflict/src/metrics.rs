/// External collaborator for conflict-rate observability (SPEC_FULL §10.7),
/// the same narrow-trait shape as `sync-admission::GeoIpResolver` — the
/// conflict engine itself stays ignorant of Prometheus.
pub trait ConflictMetricsSink: Send + Sync {
	fn record_conflict(&self, conflict_type: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConflictMetricsSink;

impl ConflictMetricsSink for NoopConflictMetricsSink {
	fn record_conflict(&self, _conflict_type: &str) {}
}
