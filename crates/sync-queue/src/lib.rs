pub mod metrics;
pub mod offline;
pub mod schedule;

pub use metrics::{NoopQueueMetricsSink, QueueMetricsSink};
pub use offline::{OfflineQueue, SweepStats};
pub use schedule::{QuotaScheduler, SchedulerStats};
