pub mod error;
pub mod model;

pub use error::SyncError;
pub use model::{
	ApiKey, ConflictRecord, ConflictStatus, ConflictType, Item, QueuedUpdate, QuotaPeriod, QuotaWindow, ResolutionStrategy, RestrictionMode,
	Restrictions, Session, UpdateKind,
};

pub type Result<T> = std::result::Result<T, SyncError>;
