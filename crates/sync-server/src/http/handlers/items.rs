use crate::error::ApiError;
use crate::http::Envelope;
use crate::middleware::RequestContext;
use crate::state::SharedState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use sync_engine::{Command, Query as EngineQuery, QueryResult};

#[derive(Debug, Deserialize)]
pub struct PutItemBody {
	pub value: Value,
	pub metadata: Option<Value>,
	#[serde(rename = "expectedVersion")]
	pub expected_version: Option<i64>,
}

pub async fn get_item(
	State(state): State<SharedState>, Extension(ctx): Extension<RequestContext>, Path(key): Path<String>,
) -> Result<axum::Json<Envelope<sync_types::Item>>, ApiError> {
	let result = state
		.engine
		.dispatch_query(EngineQuery::GetItem { user_id: ctx.user_id.clone(), key })
		.await
		.map_err(|err| ApiError::new(err, ctx.request_id.clone(), "/item".to_string()))?;

	match result {
		QueryResult::Item(Some(item)) => Ok(Envelope::new(item, ctx.request_id)),
		_ => Err(ApiError::new(sync_types::SyncError::NotFound, ctx.request_id, "/item".to_string())),
	}
}

/// Upserts, then re-reads the stored record: the spec's "returns stored
/// record" is the persisted `Item` (version, timestamp, size included), not
/// the narrower `ItemSynced` domain event the dispatcher publishes.
pub async fn put_item(
	State(state): State<SharedState>, Extension(ctx): Extension<RequestContext>, Path(key): Path<String>,
	axum::Json(body): axum::Json<PutItemBody>,
) -> Result<axum::Json<Envelope<sync_types::Item>>, ApiError> {
	let now = Utc::now();
	let command = Command::SetItem {
		user_id: ctx.user_id.clone(),
		instance_id: ctx.instance_id.clone(),
		key: key.clone(),
		value: body.value,
		metadata: body.metadata,
		expected_version: body.expected_version,
	};
	state.engine.dispatch_command(command, None, now).await.map_err(|err| ApiError::new(err, ctx.request_id.clone(), format!("/item/{key}")))?;

	let result = state
		.engine
		.dispatch_query(EngineQuery::GetItem { user_id: ctx.user_id.clone(), key: key.clone() })
		.await
		.map_err(|err| ApiError::new(err, ctx.request_id.clone(), format!("/item/{key}")))?;

	match result {
		QueryResult::Item(Some(item)) => Ok(Envelope::new(item, ctx.request_id)),
		_ => Err(ApiError::new(sync_types::SyncError::Internal("item missing after upsert".into()), ctx.request_id, format!("/item/{key}"))),
	}
}

pub async fn delete_item(
	State(state): State<SharedState>, Extension(ctx): Extension<RequestContext>, Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
	let now = Utc::now();
	let command = Command::RemoveItem { user_id: ctx.user_id.clone(), instance_id: ctx.instance_id.clone(), key: key.clone() };
	state.engine.dispatch_command(command, None, now).await.map_err(|err| ApiError::new(err, ctx.request_id.clone(), format!("/item/{key}")))?;
	Ok(StatusCode::NO_CONTENT)
}

pub async fn list_items(
	State(state): State<SharedState>, Extension(ctx): Extension<RequestContext>, Query(params): Query<HashMap<String, String>>,
) -> Result<axum::Json<Envelope<Vec<sync_types::Item>>>, ApiError> {
	let prefix = params.get("prefix").cloned();
	let result = state
		.engine
		.dispatch_query(EngineQuery::GetAllItems { user_id: ctx.user_id.clone(), prefix })
		.await
		.map_err(|err| ApiError::new(err, ctx.request_id.clone(), "/items".to_string()))?;

	let items = match result {
		QueryResult::Items(items) => items,
		_ => Vec::new(),
	};
	Ok(Envelope::new(items, ctx.request_id))
}

pub async fn list_keys(
	State(state): State<SharedState>, Extension(ctx): Extension<RequestContext>, Query(params): Query<HashMap<String, String>>,
) -> Result<axum::Json<Envelope<Vec<String>>>, ApiError> {
	let prefix = params.get("prefix").cloned();
	let result = state
		.engine
		.dispatch_query(EngineQuery::GetKeys { user_id: ctx.user_id.clone(), prefix })
		.await
		.map_err(|err| ApiError::new(err, ctx.request_id.clone(), "/keys".to_string()))?;

	let keys = match result {
		QueryResult::Keys(keys) => keys,
		_ => Vec::new(),
	};
	Ok(Envelope::new(keys, ctx.request_id))
}

pub async fn clear(State(state): State<SharedState>, Extension(ctx): Extension<RequestContext>) -> Result<StatusCode, ApiError> {
	let now = Utc::now();
	let command = Command::ClearStorage { user_id: ctx.user_id.clone(), instance_id: ctx.instance_id.clone() };
	state.engine.dispatch_command(command, None, now).await.map_err(|err| ApiError::new(err, ctx.request_id.clone(), "/clear".to_string()))?;
	Ok(StatusCode::NO_CONTENT)
}
