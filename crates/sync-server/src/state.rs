use crate::config::Config;
use crate::metrics::Metrics;
use crate::ws::WsSink;
use std::sync::Arc;
use sync_admission::AdmissionGate;
use sync_conflict::ConflictEngine;
use sync_engine::SyncEngine;

/// Shared process state threaded through every axum handler, following the
/// teacher's `ApiContext` shape (`nest::lib::ApiContext`) but composing the
/// independently built sync-* collaborators instead of a single SQLite pool.
pub struct AppState {
	pub engine: SyncEngine<WsSink>,
	pub admission: AdmissionGate,
	pub conflicts: ConflictEngine,
	pub metrics: Metrics,
	pub registry: prometheus::Registry,
	pub config: Config,
}

pub type SharedState = Arc<AppState>;
