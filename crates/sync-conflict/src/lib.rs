pub mod analyze;
pub mod detect;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod resolve;

pub use analyze::{analyze, Analysis, Severity};
pub use detect::{detect, Detection, WriteProbe};
pub use engine::{ConflictEngine, WriteOutcome};
pub use error::Error;
pub use metrics::{ConflictMetricsSink, NoopConflictMetricsSink};
pub use resolve::{resolve, ResolutionOutcome, Side};
