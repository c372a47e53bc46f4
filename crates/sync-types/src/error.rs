use thiserror::Error;

/// Transport-independent error taxonomy (§7). Every collaborator crate maps
/// its own error type onto this one; `sync-server` maps it onto HTTP status
/// codes and the WebSocket error frame.
#[derive(Error, Debug)]
pub enum SyncError {
	#[error("authentication required")]
	Unauthenticated,

	#[error("forbidden: {0}")]
	Forbidden(String),

	#[error("validation failed: {0}")]
	Validation(String),

	#[error("not found")]
	NotFound,

	#[error("conflict: {0}")]
	Conflict(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl SyncError {
	pub fn is_recoverable_by_retry(&self) -> bool {
		matches!(self, Self::Internal(_))
	}
}
