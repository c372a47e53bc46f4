use clap::Parser;
use serde::{Deserialize, Serialize};

/// API-key provisioning defaults (§6 "Environment configuration" — the
/// API-key-specific subset; listen/DB/CORS/logging live in `sync-server`).
#[derive(Parser, Clone, Debug, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
pub struct Config {
	#[arg(long, env = "API_KEYS_ENABLED", default_value = "true")]
	pub api_keys_enabled: bool,

	#[arg(long, env = "API_KEY_TOKEN_PREFIX", default_value = "sk_")]
	pub token_prefix: String,

	#[arg(long, env = "API_KEY_DEFAULT_ENVIRONMENT", default_value = "production")]
	pub default_environment: String,

	#[arg(long, env = "API_KEY_DEFAULT_EXPIRATION_DAYS", default_value = "365")]
	pub default_expiration_days: u32,
}

impl Config {
	pub fn new() -> Self {
		Self::parse()
	}

	#[cfg(any(test, feature = "test-util"))]
	pub fn test() -> Self {
		Self { api_keys_enabled: true, token_prefix: "sk_test_".into(), default_environment: "test".into(), default_expiration_days: 1 }
	}
}

impl Default for Config {
	fn default() -> Self {
		Self { api_keys_enabled: true, token_prefix: "sk_".into(), default_environment: "production".into(), default_expiration_days: 365 }
	}
}
