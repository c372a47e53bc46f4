use sqlx::PgPool;

/// Creates the engine's tables if they don't already exist. Production
/// deployments would use `sqlx migrate run` against `migrations/`; this
/// mirrors `mood_event::core::schema::init_schema` for local/dev bootstrap
/// and for the test pool.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS sync_items (
            user_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            metadata TEXT,
            version BIGINT NOT NULL,
            last_modified TIMESTAMPTZ NOT NULL,
            timestamp BIGINT NOT NULL,
            instance_id TEXT NOT NULL,
            size BIGINT NOT NULL,
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            PRIMARY KEY (user_id, key)
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_sync_items_user_ts ON sync_items(user_id, timestamp DESC)").execute(pool).await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_sync_items_user_key_prefix ON sync_items(user_id, key text_pattern_ops)").execute(pool).await?;

	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS sync_conflicts (
            id UUID PRIMARY KEY,
            user_id TEXT NOT NULL,
            key TEXT NOT NULL,
            conflict_type TEXT NOT NULL,
            original_value TEXT NOT NULL,
            conflicting_value TEXT NOT NULL,
            resolution_strategy TEXT,
            resolved_value TEXT,
            reason TEXT NOT NULL,
            confidence DOUBLE PRECISION NOT NULL,
            status TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            resolved_at TIMESTAMPTZ,
            ai_model TEXT,
            human_reviewed BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_sync_conflicts_user_key ON sync_conflicts(user_id, key)").execute(pool).await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_sync_conflicts_created_at ON sync_conflicts(created_at)").execute(pool).await?;

	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS sync_api_keys (
            id UUID PRIMARY KEY,
            secret TEXT NOT NULL UNIQUE,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            expires_at TIMESTAMPTZ,
            restrictions TEXT NOT NULL,
            minute_limit BIGINT,
            minute_usage BIGINT NOT NULL DEFAULT 0,
            hour_limit BIGINT,
            hour_usage BIGINT NOT NULL DEFAULT 0,
            day_limit BIGINT,
            day_usage BIGINT NOT NULL DEFAULT 0,
            month_limit BIGINT,
            month_usage BIGINT NOT NULL DEFAULT 0,
            total_calls BIGINT NOT NULL DEFAULT 0,
            successful_calls BIGINT NOT NULL DEFAULT 0,
            failed_calls BIGINT NOT NULL DEFAULT 0,
            security_violations BIGINT NOT NULL DEFAULT 0,
            last_used_at TIMESTAMPTZ,
            last_failure_at TIMESTAMPTZ,
            last_failure_reason TEXT,
            avg_response_time_ms DOUBLE PRECISION NOT NULL DEFAULT 0
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
        CREATE TABLE IF NOT EXISTS sync_sessions (
            id BIGSERIAL PRIMARY KEY,
            user_id TEXT NOT NULL,
            instance_id TEXT NOT NULL,
            ip TEXT,
            domain TEXT,
            connected_at TIMESTAMPTZ NOT NULL
        )
        "#,
	)
	.execute(pool)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_sync_sessions_ip_time ON sync_sessions(ip, connected_at)").execute(pool).await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_sync_sessions_domain_time ON sync_sessions(domain, connected_at)").execute(pool).await?;

	Ok(())
}
