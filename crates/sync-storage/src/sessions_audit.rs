use crate::error::Error;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Append-only session-connect log, independent of the in-memory live
/// session registry in `sync-realtime` (§3 vs §4.A — see DESIGN.md
/// "Open Question decisions" #3). Exists solely to answer the admission
/// gate's "distinct users from this IP/domain in the last 24h" check,
/// which the process-lifetime-only registry cannot answer after a restart.
#[derive(Clone)]
pub struct SessionAuditRepository {
	pool: PgPool,
}

impl SessionAuditRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn record_connect(&self, user_id: &str, instance_id: &str, ip: Option<&str>, domain: Option<&str>, now: DateTime<Utc>) -> Result<(), Error> {
		sqlx::query("INSERT INTO sync_sessions (user_id, instance_id, ip, domain, connected_at) VALUES ($1, $2, $3, $4, $5)")
			.bind(user_id)
			.bind(instance_id)
			.bind(ip)
			.bind(domain)
			.bind(now)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn distinct_users_for_ip_since(&self, ip: &str, since: DateTime<Utc>) -> Result<i64, Error> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT user_id) FROM sync_sessions WHERE ip = $1 AND connected_at >= $2")
			.bind(ip)
			.bind(since)
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}

	pub async fn distinct_users_for_domain_since(&self, domain: &str, since: DateTime<Utc>) -> Result<i64, Error> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(DISTINCT user_id) FROM sync_sessions WHERE domain = $1 AND connected_at >= $2")
			.bind(domain)
			.bind(since)
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}
}
