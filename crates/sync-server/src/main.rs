use anyhow::Context;
use std::sync::Arc;
use sync_admission::{AdmissionGate, NoopGeoIpResolver};
use sync_conflict::ConflictEngine;
use sync_engine::SyncEngine;
use sync_queue::{OfflineQueue, QuotaScheduler};
use sync_realtime::SessionRegistry;
use sync_server::config::Config;
use sync_server::metrics::Metrics;
use sync_server::state::AppState;
use sync_storage::{ApiKeyRepository, ConflictRepository, ItemRepository, SessionAuditRepository};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	dotenv::dotenv().ok();
	let config = Config::new();
	sync_server::init_tracing(&config);

	let pool = sync_storage::pool::connect(&config.database_url(), config.db_pool_size).await.context("could not connect to database")?;
	sync_storage::schema::init_schema(&pool).await.context("could not initialize schema")?;

	let items = ItemRepository::new(pool.clone());
	let conflicts_repo = ConflictRepository::new(pool.clone());
	let api_keys = ApiKeyRepository::new(pool.clone());
	let sessions_audit = SessionAuditRepository::new(pool.clone());

	let prometheus_registry = prometheus::Registry::new();
	let metrics = Metrics::new(&prometheus_registry);

	let conflicts = ConflictEngine::new(conflicts_repo, Arc::new(metrics.clone()));
	let admission = AdmissionGate::new(api_keys.clone(), sessions_audit, Arc::new(NoopGeoIpResolver));

	let registry = Arc::new(SessionRegistry::new());
	let offline = Arc::new(OfflineQueue::new());
	let engine = SyncEngine::new(items, conflicts.clone(), registry, offline.clone());

	let shutdown = CancellationToken::new();
	QuotaScheduler::new(api_keys, offline, shutdown, Arc::new(metrics.clone())).spawn();

	let state = Arc::new(AppState { engine, admission, conflicts, metrics, registry: prometheus_registry, config: config.clone() });

	sync_server::serve(config, state).await
}
