use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Storage(#[from] sync_storage::Error),

	#[error(transparent)]
	Conflict(#[from] sync_conflict::Error),
}

impl From<Error> for sync_types::SyncError {
	fn from(err: Error) -> Self {
		match err {
			Error::Storage(e) => e.into(),
			Error::Conflict(e) => e.into(),
		}
	}
}
