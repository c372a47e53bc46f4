use crate::error::ApiError;
use crate::http::Envelope;
use crate::middleware::RequestContext;
use crate::state::SharedState;
use axum::extract::{Extension, Path, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use sync_conflict::{ConflictEngine, WriteProbe};
use sync_types::{ConflictRecord, ResolutionStrategy};

pub async fn history(
	State(state): State<SharedState>, Extension(ctx): Extension<RequestContext>, Path(item_id): Path<String>,
) -> Result<axum::Json<Envelope<Vec<ConflictRecord>>>, ApiError> {
	let records = state
		.conflicts
		.history(&ctx.user_id, &item_id)
		.await
		.map_err(|err| ApiError::new(err, ctx.request_id.clone(), format!("/conflicts/history/{item_id}")))?;
	Ok(Envelope::new(records, ctx.request_id))
}

#[derive(Debug, Serialize)]
struct StatsPayload {
	#[serde(flatten)]
	stats: sync_storage::ConflictStats,
}

pub async fn stats(
	State(state): State<SharedState>, Extension(ctx): Extension<RequestContext>, Query(params): Query<HashMap<String, String>>,
) -> Result<axum::Json<Envelope<StatsPayload>>, ApiError> {
	let start = parse_date(params.get("startDate")).unwrap_or_else(|| Utc::now() - chrono::Duration::days(30));
	let end = parse_date(params.get("endDate")).unwrap_or_else(Utc::now);

	let stats = state
		.conflicts
		.stats(start, end)
		.await
		.map_err(|err| ApiError::new(err, ctx.request_id.clone(), "/conflicts/stats".to_string()))?;
	Ok(Envelope::new(StatsPayload { stats }, ctx.request_id))
}

fn parse_date(raw: Option<&String>) -> Option<DateTime<Utc>> {
	raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
	pub strategy: ResolutionStrategy,
	#[serde(rename = "aiModel")]
	pub ai_model: Option<String>,
	#[serde(rename = "userReview")]
	pub user_review: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedPayload {
	value: Value,
	metadata: Option<Value>,
	confidence: f64,
	strategy: ResolutionStrategy,
	reason: String,
	needs_manual_resolution: bool,
}

pub async fn resolve(
	State(state): State<SharedState>, Extension(ctx): Extension<RequestContext>, Path(conflict_id): Path<uuid::Uuid>,
	axum::Json(body): axum::Json<ResolveBody>,
) -> Result<axum::Json<Envelope<ResolvedPayload>>, ApiError> {
	let now = Utc::now();
	let outcome = state
		.conflicts
		.resolve_by_id(conflict_id, body.strategy, body.ai_model.as_deref(), body.user_review, now)
		.await
		.map_err(|err| ApiError::new(err, ctx.request_id.clone(), format!("/conflicts/resolve/{conflict_id}")))?;

	let payload = ResolvedPayload {
		value: outcome.value,
		metadata: outcome.metadata,
		confidence: outcome.confidence,
		strategy: outcome.strategy,
		reason: outcome.reason,
		needs_manual_resolution: outcome.needs_manual_resolution,
	};
	Ok(Envelope::new(payload, ctx.request_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
	pub key: String,
	pub current: Option<sync_types::Item>,
	pub new_value: Value,
	#[serde(rename = "expectedVersion")]
	pub expected_version: Option<i64>,
	pub instance_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzePayload {
	conflict: Option<sync_conflict::Detection>,
	analysis: Option<sync_conflict::Analysis>,
}

pub async fn analyze(
	Extension(ctx): Extension<RequestContext>, axum::Json(body): axum::Json<AnalyzeBody>,
) -> Result<axum::Json<Envelope<AnalyzePayload>>, ApiError> {
	let now = Utc::now();
	let probe = WriteProbe { new_value: &body.new_value, expected_version: body.expected_version, instance_id: &body.instance_id, now };
	let outcome = ConflictEngine::analyze_write(body.current.as_ref(), &probe);

	let payload = match outcome {
		Some((detection, analysis)) => AnalyzePayload { conflict: Some(detection), analysis: Some(analysis) },
		None => AnalyzePayload { conflict: None, analysis: None },
	};
	Ok(Envelope::new(payload, ctx.request_id))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StrategyPayload {
	strategy: ResolutionStrategy,
	description: &'static str,
}

pub async fn strategies(Extension(ctx): Extension<RequestContext>) -> axum::Json<Envelope<Vec<StrategyPayload>>> {
	let payload = ResolutionStrategy::ALL.into_iter().map(|strategy| StrategyPayload { strategy, description: strategy.description() }).collect();
	Envelope::new(payload, ctx.request_id)
}
