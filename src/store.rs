//! Storage contracts and built-in ledger store implementations.
//!
//! Every mutating method is a single transaction: the store checks its constraints and applies the
//! change under one write lock, so a dropped caller future can never observe or leave a partial
//! mutation. The "one active lease per slot" index is the concurrency guard for allocations.

pub mod file;
pub mod memory;

mod tables;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	ledger::{
		BillingPeriod, Budget, BudgetLease, DataplaneId, PeriodId, QuotaKind, RequestId, TenantId,
		UsageReport,
	},
};

/// Boxed future returned by [`LedgerStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract implemented by ledger stores.
pub trait LedgerStore
where
	Self: Send + Sync,
{
	/// Fetches the lease created for `request_id`, regardless of its status.
	fn lease_by_request<'a>(
		&'a self,
		request_id: &'a RequestId,
	) -> StoreFuture<'a, Option<BudgetLease>>;

	/// Fetches a billing period by id.
	fn period<'a>(&'a self, period_id: &'a PeriodId) -> StoreFuture<'a, Option<BillingPeriod>>;

	/// Inserts `period` unless its id already exists; returns the stored row either way.
	fn insert_period(&self, period: BillingPeriod) -> StoreFuture<'_, BillingPeriod>;

	/// Sums grants of leases for (tenant, period) that are still active at `now`.
	fn leased_totals<'a>(
		&'a self,
		tenant_id: &'a TenantId,
		period_id: &'a PeriodId,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Budget>;

	/// Returns the lease currently holding the slot's active index entry, if any.
	fn active_lease<'a>(&'a self, slot: &'a LeaseSlot) -> StoreFuture<'a, Option<BudgetLease>>;

	/// Revokes the slot's current active lease and inserts `lease`, iff the slot's active lease id
	/// still equals `expected_active`.
	fn commit_lease(
		&self,
		lease: BudgetLease,
		expected_active: Option<Uuid>,
	) -> StoreFuture<'_, LeaseCommit>;

	/// Inserts `report` and increments its period's counters atomically.
	///
	/// `seed` is inserted when the report's period does not exist yet; without one the report is
	/// refused with [`UsageCommit::UnknownPeriod`].
	fn record_usage(
		&self,
		report: UsageReport,
		seed: Option<BillingPeriod>,
	) -> StoreFuture<'_, UsageCommit>;

	/// Lists every billing period.
	fn periods(&self) -> StoreFuture<'_, Vec<BillingPeriod>>;

	/// Moves active leases with `expires_at <= now` to [`LeaseStatus::Expired`](crate::ledger::LeaseStatus::Expired).
	fn expire_leases(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;

	/// Replaces one limit on a period; returns the updated row when it exists.
	fn override_limit<'a>(
		&'a self,
		period_id: &'a PeriodId,
		kind: QuotaKind,
		limit: u64,
	) -> StoreFuture<'a, Option<BillingPeriod>>;
}

/// Key of the "one active lease" index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseSlot {
	/// Tenant component.
	pub tenant_id: TenantId,
	/// Period component.
	pub period_id: PeriodId,
	/// Data plane component.
	pub dataplane_id: DataplaneId,
}
impl LeaseSlot {
	/// Builds a slot from its components.
	pub fn new(tenant_id: TenantId, period_id: PeriodId, dataplane_id: DataplaneId) -> Self {
		Self { tenant_id, period_id, dataplane_id }
	}

	/// Slot occupied by `lease`.
	pub fn of(lease: &BudgetLease) -> Self {
		Self::new(lease.tenant_id.clone(), lease.period_id.clone(), lease.dataplane_id.clone())
	}
}

/// Result of a lease compare-and-swap commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaseCommit {
	/// The lease was inserted; `revoked` names the lease it superseded.
	Committed {
		/// Lease id revoked by this commit.
		revoked: Option<Uuid>,
	},
	/// A lease with the same request id already exists and is returned unchanged.
	Replayed(BudgetLease),
	/// The slot's active lease changed since it was read.
	Conflict,
}

/// Result of recording a usage report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UsageCommit {
	/// Report stored and counters incremented.
	Applied {
		/// Consumption totals after the increment.
		totals: Budget,
		/// `true` when the seed period was inserted.
		created_period: bool,
	},
	/// Report id already known; nothing changed.
	Duplicate {
		/// Current consumption totals of the report's period.
		totals: Budget,
	},
	/// The referenced period belongs to another tenant; nothing changed.
	TenantMismatch,
	/// The referenced period does not exist and no seed was supplied; nothing changed.
	UnknownPeriod,
}

/// Error type produced by [`LedgerStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
