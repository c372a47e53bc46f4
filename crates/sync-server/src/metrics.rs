use prometheus::{GaugeVec, IntCounterVec, IntGauge, Opts, Registry};

/// Ambient observability surface (SPEC_FULL §10.7), grounded in
/// `task_queue::pool::WorkerPool`'s `Registry` + typed metric fields. Not
/// excluded by any Non-goal — logging/metrics/config are carried regardless.
#[derive(Clone)]
pub struct Metrics {
	pub live_sessions: IntGauge,
	pub offline_queue_depth: GaugeVec,
	pub quota_rejections: IntCounterVec,
	pub conflicts_detected: IntCounterVec,
}

impl Metrics {
	/// # Panics
	///
	/// Panics if a metric name collides within `registry` — this only
	/// happens if `new` is called twice against the same registry, which
	/// would be a construction bug.
	#[must_use]
	pub fn new(registry: &Registry) -> Self {
		let live_sessions = IntGauge::new("sync_live_sessions", "Live WebSocket sessions across all users").expect("valid metric");
		let offline_queue_depth = GaugeVec::new(
			Opts::new("sync_offline_queue_depth", "Pending updates queued for a disconnected instance"),
			&["user_id", "instance_id"],
		)
		.expect("valid metric");
		let quota_rejections =
			IntCounterVec::new(Opts::new("sync_quota_rejections_total", "Admission rejections due to exceeded quota"), &["period"])
				.expect("valid metric");
		let conflicts_detected =
			IntCounterVec::new(Opts::new("sync_conflicts_detected_total", "Write conflicts detected"), &["conflict_type"]).expect("valid metric");

		registry.register(Box::new(live_sessions.clone())).expect("unique metric name");
		registry.register(Box::new(offline_queue_depth.clone())).expect("unique metric name");
		registry.register(Box::new(quota_rejections.clone())).expect("unique metric name");
		registry.register(Box::new(conflicts_detected.clone())).expect("unique metric name");

		Self { live_sessions, offline_queue_depth, quota_rejections, conflicts_detected }
	}

	pub fn record_quota_rejection(&self, period: &str) {
		self.quota_rejections.with_label_values(&[period]).inc();
	}

	pub fn record_conflict(&self, conflict_type: &str) {
		self.conflicts_detected.with_label_values(&[conflict_type]).inc();
	}

	pub fn set_offline_queue_depth(&self, user_id: &str, instance_id: &str, depth: usize) {
		self.offline_queue_depth.with_label_values(&[user_id, instance_id]).set(depth as f64);
	}
}

impl sync_queue::QueueMetricsSink for Metrics {
	fn set_queue_depth(&self, user_id: &str, instance_id: &str, depth: usize) {
		self.set_offline_queue_depth(user_id, instance_id, depth);
	}
}

impl sync_conflict::ConflictMetricsSink for Metrics {
	fn record_conflict(&self, conflict_type: &str) {
		Metrics::record_conflict(self, conflict_type);
	}
}
