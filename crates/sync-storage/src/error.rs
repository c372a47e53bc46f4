use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
	#[error("database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("value is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),

	#[error("item not found")]
	NotFound,
}

impl From<Error> for sync_types::SyncError {
	fn from(err: Error) -> Self {
		match err {
			Error::NotFound => Self::NotFound,
			Error::Sqlx(e) => Self::Internal(e.to_string()),
			Error::Json(e) => Self::Internal(e.to_string()),
		}
	}
}
