use crate::error::Error;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sync_types::{ApiKey, QuotaPeriod, QuotaWindow, Restrictions};
use uuid::Uuid;

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
	id: Uuid,
	secret: String,
	is_active: bool,
	expires_at: Option<DateTime<Utc>>,
	restrictions: String,
	minute_limit: Option<i64>,
	minute_usage: i64,
	hour_limit: Option<i64>,
	hour_usage: i64,
	day_limit: Option<i64>,
	day_usage: i64,
	month_limit: Option<i64>,
	month_usage: i64,
	total_calls: i64,
	successful_calls: i64,
	failed_calls: i64,
	security_violations: i64,
	last_used_at: Option<DateTime<Utc>>,
	last_failure_at: Option<DateTime<Utc>>,
	last_failure_reason: Option<String>,
	avg_response_time_ms: f64,
}

impl ApiKeyRow {
	fn into_key(self) -> Result<ApiKey, Error> {
		Ok(ApiKey {
			id: self.id,
			secret: self.secret,
			is_active: self.is_active,
			expires_at: self.expires_at,
			restrictions: serde_json::from_str(&self.restrictions)?,
			minute: QuotaWindow { limit: self.minute_limit, current_usage: self.minute_usage },
			hour: QuotaWindow { limit: self.hour_limit, current_usage: self.hour_usage },
			day: QuotaWindow { limit: self.day_limit, current_usage: self.day_usage },
			month: QuotaWindow { limit: self.month_limit, current_usage: self.month_usage },
			total_calls: self.total_calls,
			successful_calls: self.successful_calls,
			failed_calls: self.failed_calls,
			security_violations: self.security_violations,
			last_used_at: self.last_used_at,
			last_failure_at: self.last_failure_at,
			last_failure_reason: self.last_failure_reason,
			avg_response_time_ms: self.avg_response_time_ms,
		})
	}
}

const SELECT_COLUMNS: &str = "id, secret, is_active, expires_at, restrictions, \
     minute_limit, minute_usage, hour_limit, hour_usage, day_limit, day_usage, month_limit, month_usage, \
     total_calls, successful_calls, failed_calls, security_violations, \
     last_used_at, last_failure_at, last_failure_reason, avg_response_time_ms";

/// Repository for API-key records (§3 "API key", §4.A).
#[derive(Clone)]
pub struct ApiKeyRepository {
	pool: PgPool,
}

impl ApiKeyRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	pub async fn create(&self, secret: &str, restrictions: &Restrictions, expires_at: Option<DateTime<Utc>>) -> Result<ApiKey, Error> {
		let id = Uuid::new_v4();
		sqlx::query("INSERT INTO sync_api_keys (id, secret, is_active, expires_at, restrictions) VALUES ($1, $2, TRUE, $3, $4)")
			.bind(id)
			.bind(secret)
			.bind(expires_at)
			.bind(serde_json::to_string(restrictions)?)
			.execute(&self.pool)
			.await?;
		self.find_by_secret(secret).await?.ok_or(Error::NotFound)
	}

	/// Exact-match lookup, the only admission-gate credential check (§4.A).
	pub async fn find_by_secret(&self, secret: &str) -> Result<Option<ApiKey>, Error> {
		let row = sqlx::query_as::<_, ApiKeyRow>(&format!("SELECT {SELECT_COLUMNS} FROM sync_api_keys WHERE secret = $1"))
			.bind(secret)
			.fetch_optional(&self.pool)
			.await?;
		row.map(ApiKeyRow::into_key).transpose()
	}

	/// Atomically bumps usage counters on admission (§4.A "records usage").
	pub async fn record_admission(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), Error> {
		sqlx::query(
			r#"
            UPDATE sync_api_keys SET
                total_calls = total_calls + 1,
                successful_calls = successful_calls + 1,
                minute_usage = minute_usage + 1,
                hour_usage = hour_usage + 1,
                day_usage = day_usage + 1,
                month_usage = month_usage + 1,
                last_used_at = $2
            WHERE id = $1
            "#,
		)
		.bind(id)
		.bind(now)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn record_failure(&self, id: Uuid, reason: &str, now: DateTime<Utc>) -> Result<(), Error> {
		let truncated: String = reason.chars().take(190).collect();
		sqlx::query("UPDATE sync_api_keys SET failed_calls = failed_calls + 1, last_failure_reason = $2, last_failure_at = $3 WHERE id = $1")
			.bind(id)
			.bind(truncated)
			.bind(now)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	pub async fn record_security_violation(&self, id: Uuid) -> Result<(), Error> {
		sqlx::query("UPDATE sync_api_keys SET security_violations = security_violations + 1 WHERE id = $1").bind(id).execute(&self.pool).await?;
		Ok(())
	}

	/// Running average: `round((old*total + elapsed) / (total+1))` (§4.A).
	pub async fn record_response_time(&self, id: Uuid, elapsed_ms: f64) -> Result<(), Error> {
		sqlx::query(
			"UPDATE sync_api_keys SET avg_response_time_ms = ROUND(((avg_response_time_ms * total_calls) + $2) / (total_calls + 1)) WHERE id = $1",
		)
		.bind(id)
		.bind(elapsed_ms)
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	pub async fn reset_quota(&self, period: QuotaPeriod) -> Result<u64, Error> {
		let column = match period {
			QuotaPeriod::Minute => "minute_usage",
			QuotaPeriod::Hour => "hour_usage",
			QuotaPeriod::Day => "day_usage",
			QuotaPeriod::Month => "month_usage",
		};
		let sql = format!("UPDATE sync_api_keys SET {column} = 0 WHERE {column} <> 0");
		let result = sqlx::query(&sql).execute(&self.pool).await?;
		Ok(result.rows_affected())
	}

	pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
		let result = sqlx::query("UPDATE sync_api_keys SET is_active = FALSE WHERE is_active = TRUE AND expires_at IS NOT NULL AND expires_at < $1")
			.bind(now)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}
}
