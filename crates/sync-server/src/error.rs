use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sync_types::SyncError;

/// RFC-7807-like error envelope (spec §6 "Errors use an RFC-7807-like
/// shape"), grounded in `nest::http::error::Error`'s status-code mapping but
/// always returning the structured body the spec calls for rather than the
/// teacher's plain string response.
#[derive(Debug)]
pub struct ApiError {
	pub inner: SyncError,
	pub request_id: String,
	pub path: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error: &'static str,
	message: String,
	path: String,
	#[serde(rename = "requestId")]
	request_id: String,
}

impl ApiError {
	pub fn new(inner: impl Into<SyncError>, request_id: impl Into<String>, path: impl Into<String>) -> Self {
		Self { inner: inner.into(), request_id: request_id.into(), path: path.into() }
	}

	const fn status_code(&self) -> StatusCode {
		match self.inner {
			SyncError::Unauthenticated => StatusCode::UNAUTHORIZED,
			SyncError::Forbidden(_) => StatusCode::FORBIDDEN,
			SyncError::Validation(_) => StatusCode::BAD_REQUEST,
			SyncError::NotFound => StatusCode::NOT_FOUND,
			SyncError::Conflict(_) => StatusCode::CONFLICT,
			SyncError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	const fn error_code(&self) -> &'static str {
		match self.inner {
			SyncError::Unauthenticated => "unauthenticated",
			SyncError::Forbidden(_) => "forbidden",
			SyncError::Validation(_) => "validation",
			SyncError::NotFound => "not_found",
			SyncError::Conflict(_) => "conflict",
			SyncError::Internal(_) => "internal",
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response<Body> {
		if matches!(self.inner, SyncError::Internal(_)) {
			tracing::error!(request_id = %self.request_id, path = %self.path, error = %self.inner, "internal error");
		}

		let body =
			ErrorBody { error: self.error_code(), message: self.inner.to_string(), path: self.path.clone(), request_id: self.request_id.clone() };
		(self.status_code(), Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn not_found_maps_to_404() {
		let err = ApiError::new(SyncError::NotFound, "req-1", "/api/v1/sync-storage/item/foo");
		assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
		assert_eq!(err.error_code(), "not_found");
	}

	#[test]
	fn forbidden_maps_to_403() {
		let err = ApiError::new(SyncError::Forbidden("quota exceeded".into()), "req-2", "/x");
		assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
	}
}
