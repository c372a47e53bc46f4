use crate::state::SharedState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use sync_engine::{Command, Query as EngineQuery, QueryResult};
use sync_realtime::{FanoutSink, OutboundEvent};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Bridges `sync-realtime`'s synchronous `FanoutSink::deliver` to the async
/// WebSocket write half: `deliver` enqueues onto an unbounded channel that a
/// dedicated writer task drains, mirroring the split-socket/forwarding-task
/// pattern `ws-connection::core::conn` uses for its own connection actor.
#[derive(Debug, Clone)]
pub struct WsSink {
	tx: mpsc::UnboundedSender<ServerFrame>,
}

/// Everything the writer task can put on the wire: fan-out events verbatim,
/// plus the request/response and error frames the command loop below emits.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum ServerFrame {
	Outbound(OutboundEvent),
	Envelope(Envelope),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum Envelope {
	#[serde(rename = "response")]
	Response {
		#[serde(rename = "requestId")]
		request_id: Option<String>,
		payload: Value,
	},
	#[serde(rename = "error")]
	Error { error: String, timestamp: i64 },
	#[serde(rename = "connection:status")]
	ConnectionStatus { status: &'static str },
}

impl FanoutSink for WsSink {
	fn deliver(&self, event: &OutboundEvent) {
		let _ = self.tx.send(ServerFrame::Outbound(event.clone()));
	}
}

impl WsSink {
	fn send_envelope(&self, envelope: Envelope) {
		let _ = self.tx.send(ServerFrame::Envelope(envelope));
	}
}

#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
	#[serde(rename = "sync:set")]
	Set {
		#[serde(rename = "requestId")]
		request_id: Option<String>,
		key: String,
		value: Value,
		metadata: Option<Value>,
		#[serde(rename = "expectedVersion")]
		expected_version: Option<i64>,
	},
	#[serde(rename = "sync:remove")]
	Remove {
		#[serde(rename = "requestId")]
		request_id: Option<String>,
		key: String,
	},
	#[serde(rename = "sync:get")]
	Get {
		#[serde(rename = "requestId")]
		request_id: Option<String>,
		key: String,
	},
	#[serde(rename = "sync:getAll")]
	GetAll {
		#[serde(rename = "requestId")]
		request_id: Option<String>,
		prefix: Option<String>,
	},
	#[serde(rename = "sync:subscribe")]
	Subscribe { keys: Vec<String> },
	#[serde(rename = "sync:unsubscribe")]
	Unsubscribe { keys: Vec<String> },
}

/// Handshake for the `/sync` namespace (§4.E "Connection lifecycle", §6):
/// identity rides `userId`/`instanceId` query params the way HTTP carries it
/// in headers; credentials use the same `AdmissionRequest` shape as the HTTP
/// middleware, just sourced from query params since a raw upgrade request
/// has no opportunity to set custom headers from a browser WebSocket client.
pub async fn upgrade(ws: WebSocketUpgrade, Query(params): Query<HashMap<String, String>>, State(state): State<SharedState>) -> impl IntoResponse {
	ws.on_upgrade(move |socket| async move { handle_upgrade(socket, state, params).await })
}

async fn handle_upgrade(socket: WebSocket, state: SharedState, params: HashMap<String, String>) {
	let user_id = params.get("userId").cloned().unwrap_or_default();
	let instance_id = params.get("instanceId").cloned().unwrap_or_default();
	if user_id.is_empty() || instance_id.is_empty() {
		let mut socket = socket;
		let _ = socket.close().await;
		return;
	}

	let now = Utc::now();
	let admission_req = sync_admission::AdmissionRequest {
		bearer: None,
		api_key_header: None,
		api_key_query: params.get("api_key").map(String::as_str),
		https: false,
		method: Some("WEBSOCKET"),
		user_agent: None,
		domain: None,
		ip: None,
		key: None,
		now,
	};
	if state.admission.admit(&admission_req).await.is_err() {
		let mut socket = socket;
		let _ = socket.close().await;
		return;
	}

	handle_socket(socket, state, user_id, instance_id).await;
}

async fn handle_socket(socket: WebSocket, state: SharedState, user_id: String, instance_id: String) {
	let connection_id = Uuid::new_v4().to_string();
	let (mut sender, mut receiver) = socket.split();
	let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

	let writer = tokio::spawn(async move {
		while let Some(frame) = rx.recv().await {
			let Ok(text) = serde_json::to_string(&frame) else { continue };
			if sender.send(Message::Text(text)).await.is_err() {
				break;
			}
		}
	});

	let sink = WsSink { tx: tx.clone() };
	let now = Utc::now();
	state.engine.connect_session(&user_id, &instance_id, &connection_id, None, sink.clone(), now);
	state.metrics.live_sessions.set(state.engine.registry().connection_count() as i64);
	sink.send_envelope(Envelope::ConnectionStatus { status: "connected" });

	while let Some(Ok(message)) = receiver.next().await {
		let Message::Text(text) = message else { continue };
		let now = Utc::now();
		match serde_json::from_str::<ClientMessage>(&text) {
			Ok(client_message) => handle_client_message(&state, &connection_id, &user_id, &instance_id, client_message, &sink, now).await,
			Err(err) => sink.send_envelope(Envelope::Error { error: err.to_string(), timestamp: now.timestamp_millis() }),
		}
	}

	state.engine.disconnect_session(&connection_id);
	state.metrics.live_sessions.set(state.engine.registry().connection_count() as i64);
	writer.abort();
}

async fn handle_client_message(
	state: &SharedState, connection_id: &str, user_id: &str, instance_id: &str, message: ClientMessage, sink: &WsSink, now: DateTime<Utc>,
) {
	let (request_id, result) = match message {
		ClientMessage::Set { request_id, key, value, metadata, expected_version } => {
			let command = Command::SetItem {
				user_id: user_id.to_string(),
				instance_id: instance_id.to_string(),
				key,
				value,
				metadata,
				expected_version,
			};
			let result = state.engine.dispatch_command(command, Some(connection_id), now).await.map(|_| Value::Null).map_err(Into::into);
			(request_id, result)
		}
		ClientMessage::Remove { request_id, key } => {
			let command = Command::RemoveItem { user_id: user_id.to_string(), instance_id: instance_id.to_string(), key };
			let result = state.engine.dispatch_command(command, Some(connection_id), now).await.map(|_| Value::Null).map_err(Into::into);
			(request_id, result)
		}
		ClientMessage::Get { request_id, key } => {
			let result = state.engine.dispatch_query(EngineQuery::GetItem { user_id: user_id.to_string(), key }).await;
			(request_id, result.map(item_payload).map_err(Into::into))
		}
		ClientMessage::GetAll { request_id, prefix } => {
			let result = state.engine.dispatch_query(EngineQuery::GetAllItems { user_id: user_id.to_string(), prefix }).await;
			(request_id, result.map(items_payload).map_err(Into::into))
		}
		ClientMessage::Subscribe { keys } => {
			state.engine.registry().subscribe(connection_id, user_id, &keys);
			(None, Ok::<Value, sync_types::SyncError>(Value::Null))
		}
		ClientMessage::Unsubscribe { keys } => {
			state.engine.registry().unsubscribe(connection_id, user_id, &keys);
			(None, Ok::<Value, sync_types::SyncError>(Value::Null))
		}
	};

	match result {
		Ok(payload) => sink.send_envelope(Envelope::Response { request_id, payload }),
		Err(err) => sink.send_envelope(Envelope::Error { error: err.to_string(), timestamp: now.timestamp_millis() }),
	}
}

fn item_payload(result: QueryResult) -> Value {
	match result {
		QueryResult::Item(item) => serde_json::to_value(item).unwrap_or(Value::Null),
		_ => Value::Null,
	}
}

fn items_payload(result: QueryResult) -> Value {
	match result {
		QueryResult::Items(items) => serde_json::to_value(items).unwrap_or_else(|_| Value::Array(Vec::new())),
		_ => Value::Array(Vec::new()),
	}
}
