use crate::metrics::QueueMetricsSink;
use crate::offline::OfflineQueue;
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use sync_storage::ApiKeyRepository;
use sync_types::QuotaPeriod;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(60);

/// Fires once per wall-clock boundary crossing, checked at `SWEEP_INTERVAL`
/// granularity. Treats "local" midnight/day-1/02:00 (§4.F) as UTC, since
/// nothing in the dependency stack carries timezone data.
#[derive(Debug, Default)]
struct WallClockTick {
	last_minute: Option<i64>,
	last_hour: Option<i64>,
	last_day: Option<i64>,
	last_month: Option<i64>,
	last_02h_day: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
	Minute,
	Hour,
	Midnight,
	MonthStart,
	Daily02,
}

impl WallClockTick {
	fn crossed(&mut self, now: DateTime<Utc>) -> Vec<Boundary> {
		let mut crossed = Vec::new();

		let minute_bucket = now.timestamp() / 60;
		if self.last_minute != Some(minute_bucket) {
			self.last_minute = Some(minute_bucket);
			crossed.push(Boundary::Minute);
		}

		let hour_bucket = now.timestamp() / 3600;
		if self.last_hour != Some(hour_bucket) {
			self.last_hour = Some(hour_bucket);
			crossed.push(Boundary::Hour);
		}

		let day_bucket = now.date_naive().num_days_from_ce() as i64;
		if now.hour() == 0 && self.last_day != Some(day_bucket) {
			self.last_day = Some(day_bucket);
			crossed.push(Boundary::Midnight);
			if now.day() == 1 {
				let month_bucket = now.year() as i64 * 12 + now.month() as i64;
				if self.last_month != Some(month_bucket) {
					self.last_month = Some(month_bucket);
					crossed.push(Boundary::MonthStart);
				}
			}
		}

		if now.hour() == 2 && self.last_02h_day != Some(day_bucket) {
			self.last_02h_day = Some(day_bucket);
			crossed.push(Boundary::Daily02);
		}

		crossed
	}
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
	pub quota_resets: u64,
	pub expired_keys_deactivated: u64,
	pub queue_sweeps: u64,
	pub tick_failures: u64,
}

/// Drives the scheduled maintenance named in §4.F: per-period quota resets,
/// expired-key deactivation, and offline-queue sweeps. Grounded on
/// `ws-connection`'s `TimeoutMonitor` (`CancellationToken` + `select!` +
/// `interval`), generalized to fire on wall-clock boundaries instead of a
/// single fixed period.
pub struct QuotaScheduler {
	api_keys: ApiKeyRepository,
	offline: Arc<OfflineQueue>,
	shutdown: CancellationToken,
	metrics: Arc<dyn QueueMetricsSink>,
}

impl QuotaScheduler {
	pub fn new(api_keys: ApiKeyRepository, offline: Arc<OfflineQueue>, shutdown: CancellationToken, metrics: Arc<dyn QueueMetricsSink>) -> Self {
		Self { api_keys, offline, shutdown, metrics }
	}

	pub fn spawn(self) -> tokio::task::JoinHandle<SchedulerStats> {
		tokio::spawn(async move { self.run().await })
	}

	async fn run(self) -> SchedulerStats {
		let mut ticker = interval(SWEEP_INTERVAL);
		let mut wall_clock = WallClockTick::default();
		let mut stats = SchedulerStats::default();

		info!("quota scheduler starting");

		loop {
			tokio::select! {
				_ = self.shutdown.cancelled() => {
					info!("quota scheduler received shutdown signal");
					break;
				}
				_ = ticker.tick() => {
					let now = Utc::now();
					for boundary in wall_clock.crossed(now) {
						if let Err(err) = self.fire(boundary, now, &mut stats).await {
							stats.tick_failures += 1;
							error!(?boundary, %err, "scheduled tick failed");
						}
					}
					self.offline.sweep(now, self.metrics.as_ref());
					stats.queue_sweeps += 1;
				}
			}
		}

		info!(
			quota_resets = stats.quota_resets,
			deactivated = stats.expired_keys_deactivated,
			sweeps = stats.queue_sweeps,
			failures = stats.tick_failures,
			"quota scheduler shutting down"
		);
		stats
	}

	async fn fire(&self, boundary: Boundary, now: DateTime<Utc>, stats: &mut SchedulerStats) -> Result<(), sync_storage::Error> {
		match boundary {
			Boundary::Minute => {
				let n = self.api_keys.reset_quota(QuotaPeriod::Minute).await?;
				stats.quota_resets += n;
			}
			Boundary::Hour => {
				let n = self.api_keys.reset_quota(QuotaPeriod::Hour).await?;
				stats.quota_resets += n;
			}
			Boundary::Midnight => {
				let n = self.api_keys.reset_quota(QuotaPeriod::Day).await?;
				stats.quota_resets += n;
			}
			Boundary::MonthStart => {
				let n = self.api_keys.reset_quota(QuotaPeriod::Month).await?;
				stats.quota_resets += n;
			}
			Boundary::Daily02 => {
				let n = self.api_keys.deactivate_expired(now).await?;
				stats.expired_keys_deactivated += n;
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
	}

	#[test]
	fn minute_and_hour_fire_every_tick_within_their_bucket() {
		let mut wc = WallClockTick::default();
		let first = wc.crossed(at(2026, 7, 27, 10, 30));
		assert!(first.contains(&Boundary::Minute));
		assert!(first.contains(&Boundary::Hour));

		let same_minute = wc.crossed(at(2026, 7, 27, 10, 30));
		assert!(same_minute.is_empty());

		let next_minute = wc.crossed(at(2026, 7, 27, 10, 31));
		assert!(next_minute.contains(&Boundary::Minute));
		assert!(!next_minute.contains(&Boundary::Hour));
	}

	#[test]
	fn midnight_fires_only_at_hour_zero_once_per_day() {
		let mut wc = WallClockTick::default();
		let midnight = wc.crossed(at(2026, 7, 27, 0, 0));
		assert!(midnight.contains(&Boundary::Midnight));

		let still_midnight_hour = wc.crossed(at(2026, 7, 27, 0, 30));
		assert!(!still_midnight_hour.contains(&Boundary::Midnight));

		let noon = wc.crossed(at(2026, 7, 27, 12, 0));
		assert!(!noon.contains(&Boundary::Midnight));
	}

	#[test]
	fn month_start_only_fires_on_day_one_midnight() {
		let mut wc = WallClockTick::default();
		let day27 = wc.crossed(at(2026, 7, 27, 0, 0));
		assert!(day27.contains(&Boundary::Midnight));
		assert!(!day27.contains(&Boundary::MonthStart));

		let day1 = wc.crossed(at(2026, 8, 1, 0, 0));
		assert!(day1.contains(&Boundary::Midnight));
		assert!(day1.contains(&Boundary::MonthStart));
	}

	#[test]
	fn daily_02h_fires_once_per_day() {
		let mut wc = WallClockTick::default();
		let two_am = wc.crossed(at(2026, 7, 27, 2, 0));
		assert!(two_am.contains(&Boundary::Daily02));

		let still_two_am = wc.crossed(at(2026, 7, 27, 2, 30));
		assert!(!still_two_am.contains(&Boundary::Daily02));

		let next_day = wc.crossed(at(2026, 7, 28, 2, 0));
		assert!(next_day.contains(&Boundary::Daily02));
	}
}
