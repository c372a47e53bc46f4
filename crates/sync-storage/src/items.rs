use crate::error::Error;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sync_types::{Item, NewItem};

#[derive(sqlx::FromRow)]
struct ItemRow {
	user_id: String,
	key: String,
	value: String,
	metadata: Option<String>,
	version: i64,
	last_modified: DateTime<Utc>,
	timestamp: i64,
	instance_id: String,
	size: i64,
	is_deleted: bool,
}

impl ItemRow {
	fn into_item(self) -> Result<Item, Error> {
		Ok(Item {
			user_id: self.user_id,
			key: self.key,
			value: serde_json::from_str(&self.value)?,
			metadata: self.metadata.as_deref().map(serde_json::from_str).transpose()?,
			version: self.version,
			last_modified: self.last_modified,
			timestamp: self.timestamp,
			instance_id: self.instance_id,
			size: self.size,
			is_deleted: self.is_deleted,
		})
	}
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
	pub live_items: i64,
	pub deleted_items: i64,
	pub total_bytes: i64,
}

/// Storage repository for items (§4.C). Every method is a single statement
/// or transaction; the (user_id, key) primary key is the linearization
/// point `upsert` relies on for version assignment under concurrent writers
/// (§5).
#[derive(Clone)]
pub struct ItemRepository {
	pool: PgPool,
}

impl ItemRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Soft-deleted items are reported absent.
	pub async fn find_by_key(&self, user_id: &str, key: &str) -> Result<Option<Item>, Error> {
		let row = sqlx::query_as::<_, ItemRow>(
			"SELECT user_id, key, value, metadata, version, last_modified, timestamp, instance_id, size, is_deleted \
             FROM sync_items WHERE user_id = $1 AND key = $2 AND is_deleted = FALSE",
		)
		.bind(user_id)
		.bind(key)
		.fetch_optional(&self.pool)
		.await?;
		row.map(ItemRow::into_item).transpose()
	}

	/// Live items for a user, newest first, optionally filtered by key prefix.
	pub async fn find_all(&self, user_id: &str, prefix: Option<&str>) -> Result<Vec<Item>, Error> {
		let rows = match prefix {
			Some(p) => {
				sqlx::query_as::<_, ItemRow>(
					"SELECT user_id, key, value, metadata, version, last_modified, timestamp, instance_id, size, is_deleted \
                     FROM sync_items WHERE user_id = $1 AND is_deleted = FALSE AND key LIKE $2 ORDER BY timestamp DESC",
				)
				.bind(user_id)
				.bind(format!("{p}%"))
				.fetch_all(&self.pool)
				.await?
			}
			None => {
				sqlx::query_as::<_, ItemRow>(
					"SELECT user_id, key, value, metadata, version, last_modified, timestamp, instance_id, size, is_deleted \
                     FROM sync_items WHERE user_id = $1 AND is_deleted = FALSE ORDER BY timestamp DESC",
				)
				.bind(user_id)
				.fetch_all(&self.pool)
				.await?
			}
		};
		rows.into_iter().map(ItemRow::into_item).collect()
	}

	/// Live keys for a user, lexicographically ascending.
	pub async fn find_keys(&self, user_id: &str, prefix: Option<&str>) -> Result<Vec<String>, Error> {
		let keys: Vec<(String,)> = match prefix {
			Some(p) => {
				sqlx::query_as("SELECT key FROM sync_items WHERE user_id = $1 AND is_deleted = FALSE AND key LIKE $2 ORDER BY key ASC")
					.bind(user_id)
					.bind(format!("{p}%"))
					.fetch_all(&self.pool)
					.await?
			}
			None => {
				sqlx::query_as("SELECT key FROM sync_items WHERE user_id = $1 AND is_deleted = FALSE ORDER BY key ASC")
					.bind(user_id)
					.fetch_all(&self.pool)
					.await?
			}
		};
		Ok(keys.into_iter().map(|(k,)| k).collect())
	}

	/// Atomic insert-or-update keyed on (user_id, key). Assigns the next
	/// version: 1 for a brand-new row, `current + 1` otherwise — including
	/// when reviving a soft-deleted row (§8 invariant).
	pub async fn upsert(&self, data: NewItem) -> Result<Item, Error> {
		let value_text = serde_json::to_string(&data.value)?;
		let metadata_text = data.metadata.as_ref().map(serde_json::to_string).transpose()?;
		let size = Item::encoded_size(&data.value);
		let now = Utc::now();

		let row = sqlx::query_as::<_, ItemRow>(
			r#"
            INSERT INTO sync_items (user_id, key, value, metadata, version, last_modified, timestamp, instance_id, size, is_deleted)
            VALUES ($1, $2, $3, $4, 1, $5, $6, $7, $8, FALSE)
            ON CONFLICT (user_id, key) DO UPDATE SET
                value = EXCLUDED.value,
                metadata = EXCLUDED.metadata,
                version = sync_items.version + 1,
                last_modified = EXCLUDED.last_modified,
                timestamp = EXCLUDED.timestamp,
                instance_id = EXCLUDED.instance_id,
                size = EXCLUDED.size,
                is_deleted = FALSE
            RETURNING user_id, key, value, metadata, version, last_modified, timestamp, instance_id, size, is_deleted
            "#,
		)
		.bind(&data.user_id)
		.bind(&data.key)
		.bind(&value_text)
		.bind(&metadata_text)
		.bind(now)
		.bind(data.timestamp)
		.bind(&data.instance_id)
		.bind(size)
		.fetch_one(&self.pool)
		.await?;

		row.into_item()
	}

	/// Soft-delete; a no-op (but not an error) if already deleted.
	pub async fn delete(&self, user_id: &str, key: &str) -> Result<(), Error> {
		sqlx::query("UPDATE sync_items SET is_deleted = TRUE, last_modified = $1 WHERE user_id = $2 AND key = $3 AND is_deleted = FALSE")
			.bind(Utc::now())
			.bind(user_id)
			.bind(key)
			.execute(&self.pool)
			.await?;
		Ok(())
	}

	/// Soft-delete every live item for the user in one statement.
	pub async fn clear_all(&self, user_id: &str) -> Result<u64, Error> {
		let result = sqlx::query("UPDATE sync_items SET is_deleted = TRUE, last_modified = $1 WHERE user_id = $2 AND is_deleted = FALSE")
			.bind(Utc::now())
			.bind(user_id)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}

	pub async fn count(&self, user_id: &str) -> Result<i64, Error> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_items WHERE user_id = $1 AND is_deleted = FALSE")
			.bind(user_id)
			.fetch_one(&self.pool)
			.await?;
		Ok(count)
	}

	pub async fn exists(&self, user_id: &str, key: &str) -> Result<bool, Error> {
		let (exists,): (bool,) =
			sqlx::query_as("SELECT EXISTS(SELECT 1 FROM sync_items WHERE user_id = $1 AND key = $2 AND is_deleted = FALSE)")
				.bind(user_id)
				.bind(key)
				.fetch_one(&self.pool)
				.await?;
		Ok(exists)
	}

	pub async fn get_storage_stats(&self, user_id: &str) -> Result<StorageStats, Error> {
		let row: (i64, i64, Option<i64>) = sqlx::query_as(
			"SELECT COUNT(*) FILTER (WHERE NOT is_deleted), COUNT(*) FILTER (WHERE is_deleted), SUM(size) FILTER (WHERE NOT is_deleted) \
             FROM sync_items WHERE user_id = $1",
		)
		.bind(user_id)
		.fetch_one(&self.pool)
		.await?;
		Ok(StorageStats {
			live_items: row.0,
			deleted_items: row.1,
			total_bytes: row.2.unwrap_or(0),
		})
	}

	/// Hard-deletes soft-deleted rows whose `last_modified` predates `before`.
	pub async fn cleanup(&self, before: DateTime<Utc>) -> Result<u64, Error> {
		let result = sqlx::query("DELETE FROM sync_items WHERE is_deleted = TRUE AND last_modified < $1").bind(before).execute(&self.pool).await?;
		Ok(result.rows_affected())
	}

	/// Bulk dump of every live item for a user, for `export`.
	pub async fn export(&self, user_id: &str) -> Result<Vec<Item>, Error> {
		self.find_all(user_id, None).await
	}

	/// Bulk upsert preserving the caller-provided version and timestamp,
	/// for `import`. Unlike `upsert`, this does not bump the version — it is
	/// restoring a prior export, not recording a new write.
	pub async fn import(&self, items: Vec<Item>) -> Result<u64, Error> {
		let mut tx = self.pool.begin().await?;
		let mut imported = 0u64;
		for item in items {
			let value_text = serde_json::to_string(&item.value)?;
			let metadata_text = item.metadata.as_ref().map(serde_json::to_string).transpose()?;
			sqlx::query(
				r#"
                INSERT INTO sync_items (user_id, key, value, metadata, version, last_modified, timestamp, instance_id, size, is_deleted)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (user_id, key) DO UPDATE SET
                    value = EXCLUDED.value,
                    metadata = EXCLUDED.metadata,
                    version = EXCLUDED.version,
                    last_modified = EXCLUDED.last_modified,
                    timestamp = EXCLUDED.timestamp,
                    instance_id = EXCLUDED.instance_id,
                    size = EXCLUDED.size,
                    is_deleted = EXCLUDED.is_deleted
                "#,
			)
			.bind(&item.user_id)
			.bind(&item.key)
			.bind(&value_text)
			.bind(&metadata_text)
			.bind(item.version)
			.bind(item.last_modified)
			.bind(item.timestamp)
			.bind(&item.instance_id)
			.bind(item.size)
			.bind(item.is_deleted)
			.execute(&mut *tx)
			.await?;
			imported += 1;
		}
		tx.commit().await?;
		Ok(imported)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encoded_size_matches_utf8_len() {
		let v = serde_json::json!({"a": "héllo"});
		let expected = serde_json::to_string(&v).unwrap().len() as i64;
		assert_eq!(Item::encoded_size(&v), expected);
	}
}
