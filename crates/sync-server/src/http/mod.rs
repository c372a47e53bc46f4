pub mod handlers;
pub mod routes;

use serde::Serialize;

/// Success envelope for every HTTP response (spec §6: "Responses are JSON
/// envelopes `{ payload, requestId }`").
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
	pub payload: T,
	#[serde(rename = "requestId")]
	pub request_id: String,
}

impl<T: Serialize> Envelope<T> {
	pub fn new(payload: T, request_id: impl Into<String>) -> axum::Json<Self> {
		axum::Json(Self { payload, request_id: request_id.into() })
	}
}
