use clap::Parser;
use serde::{Deserialize, Serialize};

/// Process-wide environment configuration (spec §6 "Environment
/// configuration"), parsed with `clap::Parser` exactly as
/// `task_queue::config::Config` and the teacher's own `nest` config are.
/// The API-key provisioning subset is delegated to `sync_admission::Config`
/// via `#[command(flatten)]` rather than duplicated here.
#[derive(Parser, Clone, Debug, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
pub struct Config {
	#[arg(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
	pub listen_host: String,

	#[arg(long, env = "LISTEN_PORT", default_value = "8080")]
	pub listen_port: u16,

	#[arg(long, env = "DB_HOST", default_value = "localhost")]
	pub db_host: String,

	#[arg(long, env = "DB_PORT", default_value = "5432")]
	pub db_port: u16,

	#[arg(long, env = "DB_USER", default_value = "postgres")]
	pub db_user: String,

	#[arg(long, env = "DB_PASSWORD", default_value = "")]
	pub db_password: String,

	#[arg(long, env = "DB_NAME", default_value = "sync_storage")]
	pub db_name: String,

	#[arg(long, env = "DB_POOL_SIZE", default_value = "10")]
	pub db_pool_size: u32,

	#[arg(long, env = "DB_TLS", default_value = "false")]
	pub db_tls: bool,

	#[arg(long, env = "DB_TIMEZONE", default_value = "UTC")]
	pub db_timezone: String,

	/// Reserved for future token-based auth; accepted and stored, unused by
	/// the core (spec §6).
	#[arg(long, env = "JWT_SECRET", default_value = "")]
	pub jwt_secret: String,

	#[arg(long, env = "JWT_TTL_SECS", default_value = "3600")]
	pub jwt_ttl_secs: u64,

	/// Reserved: `ApiKey` carries no scopes field yet (spec §3 omits one);
	/// accepted and stored for forward compatibility only.
	#[arg(long, env = "API_KEY_DEFAULT_SCOPES", value_delimiter = ',', default_value = "sync:read,sync:write")]
	pub api_key_default_scopes: Vec<String>,

	#[command(flatten)]
	pub api_keys: sync_admission::Config,

	#[arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value = "60")]
	pub rate_limit_window_secs: u64,

	#[arg(long, env = "RATE_LIMIT_MAX", default_value = "120")]
	pub rate_limit_max: u32,

	#[arg(long, env = "CORS_ORIGIN", default_value = "*")]
	pub cors_origin: String,

	#[arg(long, env = "CORS_CREDENTIALS", default_value = "false")]
	pub cors_credentials: bool,

	#[arg(long, env = "RUST_LOG", default_value = "sync_server=info,sync_engine=info,tower_http=info")]
	pub rust_log: String,

	#[arg(long, env = "LOG_JSON", default_value = "false")]
	pub log_json: bool,

	#[arg(long, env = "LOG_COLOR", default_value = "true")]
	pub log_color: bool,
}

impl Config {
	pub fn new() -> Self {
		Self::parse()
	}

	/// Assembles the `sqlx` connection string from the discrete fields
	/// spec §6 enumerates (host/port/user/password/database/TLS).
	pub fn database_url(&self) -> String {
		let sslmode = if self.db_tls { "require" } else { "disable" };
		format!(
			"postgres://{}:{}@{}:{}/{}?sslmode={}&options=-c%20timezone%3D{}",
			self.db_user, self.db_password, self.db_host, self.db_port, self.db_name, sslmode, self.db_timezone
		)
	}

	pub fn listen_addr(&self) -> String {
		format!("{}:{}", self.listen_host, self.listen_port)
	}

	#[cfg(any(test, feature = "test-util"))]
	pub fn test() -> Self {
		Self {
			listen_host: "127.0.0.1".into(),
			listen_port: 0,
			db_host: "localhost".into(),
			db_port: 5432,
			db_user: "postgres".into(),
			db_password: String::new(),
			db_name: "sync_storage_test".into(),
			db_pool_size: 2,
			db_tls: false,
			db_timezone: "UTC".into(),
			jwt_secret: String::new(),
			jwt_ttl_secs: 3600,
			api_key_default_scopes: vec!["sync:read".into(), "sync:write".into()],
			api_keys: sync_admission::Config::test(),
			rate_limit_window_secs: 60,
			rate_limit_max: 1000,
			cors_origin: "*".into(),
			cors_credentials: false,
			rust_log: "debug".into(),
			log_json: false,
			log_color: false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn database_url_includes_sslmode_and_timezone() {
		let config = Config::test();
		let url = config.database_url();
		assert!(url.starts_with("postgres://postgres:@localhost:5432/sync_storage_test"));
		assert!(url.contains("sslmode=disable"));
	}

	#[test]
	fn listen_addr_joins_host_and_port() {
		let mut config = Config::test();
		config.listen_host = "0.0.0.0".into();
		config.listen_port = 9000;
		assert_eq!(config.listen_addr(), "0.0.0.0:9000");
	}
}
