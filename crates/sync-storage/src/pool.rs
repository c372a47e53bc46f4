use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Mirrors the teacher's `SqlitePoolOptions::new().max_connections(..)`
/// connect pattern (`nest::main`), adapted to Postgres.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
	PgPoolOptions::new()
		.max_connections(max_connections)
		.acquire_timeout(Duration::from_secs(10))
		.connect(database_url)
		.await
}
