use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("conflict record not found")]
	NotFound,

	#[error(transparent)]
	Storage(#[from] sync_storage::Error),
}

impl From<Error> for sync_types::SyncError {
	fn from(err: Error) -> Self {
		match err {
			Error::NotFound => Self::NotFound,
			Error::Storage(e) => Self::Internal(e.to_string()),
		}
	}
}
