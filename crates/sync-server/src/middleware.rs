use crate::error::ApiError;
use crate::state::SharedState;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::collections::HashMap;
use std::time::Instant;
use sync_admission::AdmissionRequest;
use uuid::Uuid;

/// Per-request identity and credential, attached to request extensions after
/// a successful admission check (spec §4.A, §6 "Credentials").
#[derive(Clone)]
pub struct RequestContext {
	pub request_id: String,
	pub user_id: String,
	pub instance_id: String,
	pub api_key_id: Uuid,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|v| v.to_str().ok())
}

/// Extracts the item key this request targets, for the gate's key-pattern
/// restriction check (§4.A rule on `allowedKeyPatterns`/`blockedKeyPatterns`).
fn key_from_path(path: &str) -> Option<&str> {
	path.split("/item/").nth(1)
}

/// Ordered middleware stage one (§9 "admission gate ... become ordered
/// middleware"): extracts credentials and identity, runs the full admission
/// pipeline, and stashes the result in request extensions for handlers and
/// the downstream metrics stage.
pub async fn admission_middleware(
	State(state): State<SharedState>, Query(params): Query<HashMap<String, String>>, mut req: Request<Body>, next: Next,
) -> Result<Response, ApiError> {
	let now = Utc::now();
	let request_id = Uuid::new_v4().to_string();
	let path = req.uri().path().to_string();
	let headers = req.headers().clone();
	let method = req.method().to_string();

	let bearer = header_str(&headers, "authorization");
	let api_key_header = header_str(&headers, "x-api-key");
	let api_key_query = params.get("api_key").map(String::as_str);
	let https = header_str(&headers, "x-forwarded-proto").is_some_and(|p| p.eq_ignore_ascii_case("https"));
	let user_agent = header_str(&headers, "user-agent");
	let domain = header_str(&headers, "host");
	let ip = header_str(&headers, "x-forwarded-for").map(|v| v.split(',').next().unwrap_or(v).trim()).or_else(|| header_str(&headers, "x-real-ip"));
	let key = key_from_path(&path);
	let user_id = header_str(&headers, "x-user-id").unwrap_or_default().to_string();
	let instance_id = header_str(&headers, "x-instance-id").unwrap_or_default().to_string();

	let admission_req = AdmissionRequest { bearer, api_key_header, api_key_query, https, method: Some(&method), user_agent, domain, ip, key, now };

	match state.admission.admit(&admission_req).await {
		Ok(api_key) => {
			req.extensions_mut().insert(RequestContext { request_id, user_id, instance_id, api_key_id: api_key.id });
			Ok(next.run(req).await)
		}
		Err(err) => {
			if let sync_admission::Error::Forbidden(reason) = &err {
				if reason.starts_with("quota exceeded for period") {
					let period = reason.rsplit(':').next().unwrap_or("unknown").trim();
					state.metrics.record_quota_rejection(period);
				}
			}
			Err(ApiError::new(err, request_id, path))
		}
	}
}

/// Stage three of §9's composition (metrics interceptor): records response
/// latency and success/failure against the admitted key's rolling
/// averages, regardless of which handler ran.
pub async fn metrics_middleware(State(state): State<SharedState>, req: Request<Body>, next: Next) -> Response {
	let context = req.extensions().get::<RequestContext>().cloned();
	let start = Instant::now();
	let response = next.run(req).await;
	let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

	if let Some(context) = context {
		let now = Utc::now();
		if response.status().is_client_error() || response.status().is_server_error() {
			let reason = response.status().canonical_reason().unwrap_or("request failed");
			if let Err(err) = state.admission.record_failure(context.api_key_id, reason, now).await {
				tracing::warn!(%err, "failed to record admission failure");
			}
		}
		if let Err(err) = state.admission.record_response_time(context.api_key_id, elapsed_ms).await {
			tracing::warn!(%err, "failed to record response time");
		}
	}

	response
}

pub async fn not_found(req: Request<Body>) -> Response {
	let request_id = req.extensions().get::<RequestContext>().map(|c| c.request_id.clone()).unwrap_or_default();
	ApiError::new(sync_types::SyncError::NotFound, request_id, req.uri().path().to_string()).into_response()
}
