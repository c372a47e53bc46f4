/// External collaborator for queue-depth observability (SPEC_FULL §10.7),
/// the same narrow-trait shape as `sync-admission::GeoIpResolver` — the
/// queue itself stays ignorant of Prometheus.
pub trait QueueMetricsSink: Send + Sync {
	fn set_queue_depth(&self, user_id: &str, instance_id: &str, depth: usize);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopQueueMetricsSink;

impl QueueMetricsSink for NoopQueueMetricsSink {
	fn set_queue_depth(&self, _user_id: &str, _instance_id: &str, _depth: usize) {}
}
