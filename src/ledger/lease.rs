//! Budget leases handed to data planes.

// self
use crate::{
	_prelude::*,
	ledger::{
		budget::Budget,
		id::{DataplaneId, PeriodId, RequestId, TenantId},
	},
};

/// Stored lifecycle status for a lease.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
	/// Lease may be spent until `expires_at`.
	Active,
	/// Lease was superseded by a newer allocation for the same slot.
	Revoked,
	/// Lease passed `expires_at` and was retired by the sweeper.
	Expired,
}

/// Time-bounded budget grant for one (tenant, period, dataplane) slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLease {
	/// Server-assigned lease identifier.
	pub lease_id: Uuid,
	/// Tenant owning the budget.
	pub tenant_id: TenantId,
	/// Billing period the budget is carved from.
	pub period_id: PeriodId,
	/// Data plane holding the lease.
	pub dataplane_id: DataplaneId,
	/// Granted bandwidth in bytes.
	pub bandwidth_granted_bytes: u64,
	/// Granted transform operations.
	pub transforms_granted: u64,
	/// Grant instant.
	#[serde(with = "time::serde::rfc3339")]
	pub granted_at: OffsetDateTime,
	/// `granted_at + TTL`.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
	/// Stored status.
	pub status: LeaseStatus,
	/// Revocation instant, set together with [`LeaseStatus::Revoked`].
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub revoked_at: Option<OffsetDateTime>,
	/// Idempotency key supplied by the caller.
	pub request_id: RequestId,
}
impl BudgetLease {
	/// Amount granted by this lease.
	pub const fn granted(&self) -> Budget {
		Budget::new(self.bandwidth_granted_bytes, self.transforms_granted)
	}

	/// Status as observed at `instant`; an active lease past its expiry reads as expired.
	pub fn status_at(&self, instant: OffsetDateTime) -> LeaseStatus {
		match self.status {
			LeaseStatus::Active if instant >= self.expires_at => LeaseStatus::Expired,
			status => status,
		}
	}

	/// Returns `true` if the lease still counts against the period at `instant`.
	pub fn is_active_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), LeaseStatus::Active)
	}

	/// Marks the lease as revoked.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		self.status = LeaseStatus::Revoked;
		self.revoked_at = Some(instant);
	}

	/// Marks the lease as expired.
	pub fn expire(&mut self) {
		self.status = LeaseStatus::Expired;
	}
}
