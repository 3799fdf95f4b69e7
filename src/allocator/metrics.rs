// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for lease allocations.
#[derive(Debug, Default)]
pub struct AllocationMetrics {
	attempts: AtomicU64,
	grants: AtomicU64,
	replays: AtomicU64,
	conflicts: AtomicU64,
	exhausted: AtomicU64,
}
impl AllocationMetrics {
	/// Returns the total number of allocation calls.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of freshly committed leases.
	pub fn grants(&self) -> u64 {
		self.grants.load(Ordering::Relaxed)
	}

	/// Returns the number of idempotent replays.
	pub fn replays(&self) -> u64 {
		self.replays.load(Ordering::Relaxed)
	}

	/// Returns the number of compare-and-swap conflicts observed (including retried ones).
	pub fn conflicts(&self) -> u64 {
		self.conflicts.load(Ordering::Relaxed)
	}

	/// Returns the number of committed leases that granted nothing in either dimension.
	pub fn exhausted(&self) -> u64 {
		self.exhausted.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_grant(&self, zero: bool) {
		self.grants.fetch_add(1, Ordering::Relaxed);

		if zero {
			self.exhausted.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_replay(&self) {
		self.replays.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_conflict(&self) {
		self.conflicts.fetch_add(1, Ordering::Relaxed);
	}
}
