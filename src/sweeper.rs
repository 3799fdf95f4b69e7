//! Background retirement of expired leases.
//!
//! Expiry is always derived from `expires_at`, so sweeping is not needed for correctness. The
//! sweeper moves expired active leases to the terminal expired status for audit clarity and frees
//! their slot in the active index. Sweeps are idempotent and safe to run concurrently.

// crates.io
use tokio::{task::JoinHandle, time::MissedTickBehavior};
// self
use crate::{
	_prelude::*,
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	store::LedgerStore,
};

/// Periodically expires leases past their TTL.
#[derive(Clone)]
pub struct LeaseSweeper {
	store: Arc<dyn LedgerStore>,
}
impl LeaseSweeper {
	/// Creates a sweeper over `store`.
	pub fn new(store: Arc<dyn LedgerStore>) -> Self {
		Self { store }
	}

	/// Runs one sweep as of `now`; returns the number of leases retired.
	pub async fn sweep_at(&self, now: OffsetDateTime) -> Result<usize> {
		const KIND: OperationKind = OperationKind::Sweep;

		let span = OperationSpan::new(KIND, "sweep");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span.instrument(self.store.expire_leases(now)).await.map_err(Error::from);

		match &result {
			Ok(expired) => {
				if *expired > 0 {
					tracing::info!(expired, "Retired expired budget leases.");
				}

				obs::record_operation_outcome(KIND, OperationOutcome::Success);
			},
			Err(e) => {
				tracing::error!(error = %e, "Lease sweep failed.");
				obs::record_operation_outcome(KIND, OperationOutcome::Failure);
			},
		}

		result
	}

	/// Spawns a task sweeping every `interval` until aborted.
	pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
		let period = std::time::Duration::try_from(interval)
			.unwrap_or(std::time::Duration::from_secs(60))
			.max(std::time::Duration::from_millis(1));

		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				ticker.tick().await;

				let _ = self.sweep_at(OffsetDateTime::now_utc()).await;
			}
		})
	}
}
impl Debug for LeaseSweeper {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LeaseSweeper").finish_non_exhaustive()
	}
}
