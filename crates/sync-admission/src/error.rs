use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("unauthenticated")]
	Unauthenticated,

	#[error("forbidden: {0}")]
	Forbidden(String),

	#[error(transparent)]
	Storage(#[from] sync_storage::Error),
}

impl From<Error> for sync_types::SyncError {
	fn from(err: Error) -> Self {
		match err {
			Error::Unauthenticated => Self::Unauthenticated,
			Error::Forbidden(reason) => Self::Forbidden(reason),
			Error::Storage(e) => Self::Internal(e.to_string()),
		}
	}
}
