use crate::credential::extract_credential;
use crate::error::Error;
use crate::geoip::GeoIpResolver;
use crate::pattern::{domain_allowed, ip_matches, matches_any};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use sync_storage::{ApiKeyRepository, SessionAuditRepository};
use sync_types::{ApiKey, RestrictionMode};
use uuid::Uuid;

/// Everything the gate needs to know about one incoming request, independent
/// of transport (HTTP or WebSocket handshake) — §6 "Credentials".
pub struct AdmissionRequest<'a> {
	pub bearer: Option<&'a str>,
	pub api_key_header: Option<&'a str>,
	pub api_key_query: Option<&'a str>,
	pub https: bool,
	pub method: Option<&'a str>,
	pub user_agent: Option<&'a str>,
	pub domain: Option<&'a str>,
	pub ip: Option<&'a str>,
	/// The storage key this request targets, if any (§4.A step 8).
	pub key: Option<&'a str>,
	pub now: DateTime<Utc>,
}

/// Validates credentials, restrictions, and quota for every request
/// (§4.A). Owns the API-key and session-audit repositories; the session
/// registry itself lives in `sync-realtime`.
pub struct AdmissionGate {
	api_keys: ApiKeyRepository,
	sessions: SessionAuditRepository,
	geoip: Arc<dyn GeoIpResolver>,
}

impl AdmissionGate {
	pub fn new(api_keys: ApiKeyRepository, sessions: SessionAuditRepository, geoip: Arc<dyn GeoIpResolver>) -> Self {
		Self { api_keys, sessions, geoip }
	}

	/// Runs the full admission pipeline: credential lookup, restrictions
	/// (first violation wins), then quota. Records usage on success.
	pub async fn admit(&self, req: &AdmissionRequest<'_>) -> Result<ApiKey, Error> {
		let secret = extract_credential(req.bearer, req.api_key_header, req.api_key_query).ok_or(Error::Unauthenticated)?;

		let key = self.api_keys.find_by_secret(&secret).await?.ok_or(Error::Unauthenticated)?;
		if !key.is_active {
			return Err(Error::Unauthenticated);
		}
		if key.expires_at.is_some_and(|exp| exp < req.now) {
			return Err(Error::Unauthenticated);
		}

		if let Err(reason) = self.check_restrictions(&key, req).await {
			self.api_keys.record_security_violation(key.id).await?;
			return Err(Error::Forbidden(reason));
		}

		if let Some(period) = key.exceeded_period() {
			return Err(Error::Forbidden(format!("quota exceeded for period: {}", period.as_str())));
		}

		self.api_keys.record_admission(key.id, req.now).await?;
		Ok(key)
	}

	pub async fn record_failure(&self, key_id: Uuid, reason: &str, now: DateTime<Utc>) -> Result<(), Error> {
		Ok(self.api_keys.record_failure(key_id, reason, now).await?)
	}

	pub async fn record_response_time(&self, key_id: Uuid, elapsed_ms: f64) -> Result<(), Error> {
		Ok(self.api_keys.record_response_time(key_id, elapsed_ms).await?)
	}

	async fn check_restrictions(&self, key: &ApiKey, req: &AdmissionRequest<'_>) -> Result<(), String> {
		let r = &key.restrictions;

		if r.require_https && !req.https {
			return Err("HTTPS required".into());
		}

		if !r.allowed_methods.is_empty() {
			let method = req.method.ok_or_else(|| "request method missing".to_string())?;
			if !r.allowed_methods.iter().any(|m| m.eq_ignore_ascii_case(method)) {
				return Err(format!("method {method} not allowed"));
			}
		}

		if let Some(ua) = req.user_agent {
			check_block_then_allow(&r.blocked_user_agent_patterns, &r.allowed_user_agent_patterns, ua, "user agent")?;
		}

		if let Some(domain) = req.domain {
			if !domain_allowed(&r.allowed_domains, domain) {
				return Err(format!("domain {domain} not allowed"));
			}
		}

		if let Some(ip) = req.ip {
			if !r.ip_restrictions.is_empty() {
				let matched = ip_matches(&r.ip_restrictions, ip);
				let ok = match r.restriction_mode.unwrap_or(RestrictionMode::Allow) {
					RestrictionMode::Allow => matched,
					RestrictionMode::Deny => !matched,
				};
				if !ok {
					return Err(format!("ip {ip} restricted"));
				}
			}

			if !r.country_restrictions.is_empty() {
				if let Some(country) = self.geoip.resolve_country(ip) {
					let matched = r.country_restrictions.iter().any(|c| c.eq_ignore_ascii_case(&country));
					let ok = match r.restriction_mode.unwrap_or(RestrictionMode::Allow) {
						RestrictionMode::Allow => matched,
						RestrictionMode::Deny => !matched,
					};
					if !ok {
						return Err(format!("country {country} restricted"));
					}
				}
				// Lookup failure (None): logged upstream, never blocks.
			}

			if let Some(max) = r.max_users_per_ip {
				let since = req.now - Duration::hours(24);
				let count = self.sessions.distinct_users_for_ip_since(ip, since).await.map_err(|e| e.to_string())?;
				if count >= i64::from(max) {
					return Err(format!("max users per IP ({max}) exceeded"));
				}
			}
		}

		if let Some(domain) = req.domain {
			if let Some(max) = r.max_users_per_domain {
				let since = req.now - Duration::hours(24);
				let count = self.sessions.distinct_users_for_domain_since(domain, since).await.map_err(|e| e.to_string())?;
				if count >= i64::from(max) {
					return Err(format!("max users per domain ({max}) exceeded"));
				}
			}
		}

		if let Some(key_value) = req.key {
			check_block_then_allow(&r.blocked_key_patterns, &r.allowed_key_patterns, key_value, "key")?;
		}

		Ok(())
	}
}

fn check_block_then_allow(blocked: &[String], allowed: &[String], value: &str, label: &str) -> Result<(), String> {
	if matches_any(blocked, value) {
		return Err(format!("{label} '{value}' is blocked"));
	}
	if !allowed.is_empty() && !matches_any(allowed, value) {
		return Err(format!("{label} '{value}' is not in the allow-list"));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn block_then_allow_blocks_first() {
		let blocked = vec!["bad*".to_string()];
		let allowed = vec!["bad-ok".to_string()];
		assert!(check_block_then_allow(&blocked, &allowed, "bad-ok", "key").is_err());
	}

	#[test]
	fn block_then_allow_requires_allow_list_membership() {
		let blocked: Vec<String> = vec![];
		let allowed = vec!["users/*".to_string()];
		assert!(check_block_then_allow(&blocked, &allowed, "users/42", "key").is_ok());
		assert!(check_block_then_allow(&blocked, &allowed, "settings/theme", "key").is_err());
	}

	#[test]
	fn empty_allow_list_permits_everything_not_blocked() {
		let blocked: Vec<String> = vec![];
		let allowed: Vec<String> = vec![];
		assert!(check_block_then_allow(&blocked, &allowed, "anything", "key").is_ok());
	}
}
