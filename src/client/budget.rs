// self
use crate::{_prelude::*, allocator::AllocationGrant, ledger::Budget};

/// Local view of the lease a data plane is spending.
///
/// A refill is due once the lease has expired or less than a fifth of a granted dimension is left.
/// Dimensions granted as zero never trigger a refill on their own; a zero grant means the tenant
/// is exhausted until the lease expires.
#[derive(Clone, Debug, Default)]
pub struct LocalBudget {
	lease: Option<AllocationGrant>,
	remaining: Budget,
}
impl LocalBudget {
	/// Creates an empty budget with no lease.
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the current lease with `grant`.
	pub fn install(&mut self, grant: AllocationGrant) {
		self.remaining = Budget::new(grant.bandwidth_granted_bytes, grant.transforms_granted);
		self.lease = Some(grant);
	}

	/// Lease currently being spent.
	pub fn lease(&self) -> Option<&AllocationGrant> {
		self.lease.as_ref()
	}

	/// Unspent part of the current lease.
	pub fn remaining(&self) -> Budget {
		self.remaining
	}

	/// Returns `true` when `delta` fits into the unexpired lease.
	pub fn can_spend_at(&self, delta: Budget, now: OffsetDateTime) -> bool {
		self.lease.as_ref().is_some_and(|lease| now < lease.expires_at)
			&& delta.bandwidth_bytes <= self.remaining.bandwidth_bytes
			&& delta.transforms <= self.remaining.transforms
	}

	/// Spends `delta`, flooring at zero.
	pub fn consume(&mut self, delta: Budget) {
		self.remaining = self.remaining.saturating_sub(delta);
	}

	/// Returns `true` when a new lease should be requested.
	pub fn needs_refill_at(&self, now: OffsetDateTime) -> bool {
		let Some(lease) = &self.lease else {
			return true;
		};

		if now >= lease.expires_at {
			return true;
		}

		below_threshold(self.remaining.bandwidth_bytes, lease.bandwidth_granted_bytes)
			|| below_threshold(self.remaining.transforms, lease.transforms_granted)
	}
}

fn below_threshold(remaining: u64, granted: u64) -> bool {
	granted > 0 && u128::from(remaining) * 5 < u128::from(granted)
}
