pub mod api_keys;
pub mod conflicts;
pub mod error;
pub mod items;
pub mod pool;
pub mod schema;
pub mod sessions_audit;

pub use api_keys::ApiKeyRepository;
pub use conflicts::{ConflictRepository, ConflictStats, ConflictTypeStats};
pub use error::Error;
pub use items::{ItemRepository, StorageStats};
pub use sessions_audit::SessionAuditRepository;
