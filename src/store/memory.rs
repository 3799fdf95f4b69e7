//! Thread-safe in-memory [`LedgerStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	ledger::{
		BillingPeriod, Budget, BudgetLease, PeriodId, QuotaKind, RequestId, TenantId, UsageReport,
	},
	store::{
		LeaseCommit, LeaseSlot, LedgerStore, StoreFuture, UsageCommit, tables::LedgerTables,
	},
};

type SharedTables = Arc<RwLock<LedgerTables>>;

/// Storage backend that keeps the ledger in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SharedTables);
impl MemoryStore {
	fn read<T>(tables: SharedTables, op: impl FnOnce(&LedgerTables) -> T) -> T {
		op(&tables.read())
	}

	fn write<T>(tables: SharedTables, op: impl FnOnce(&mut LedgerTables) -> (T, bool)) -> T {
		op(&mut tables.write()).0
	}
}
impl LedgerStore for MemoryStore {
	fn lease_by_request<'a>(
		&'a self,
		request_id: &'a RequestId,
	) -> StoreFuture<'a, Option<BudgetLease>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read(tables, |t| t.lease_by_request(request_id))) })
	}

	fn period<'a>(&'a self, period_id: &'a PeriodId) -> StoreFuture<'a, Option<BillingPeriod>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read(tables, |t| t.period(period_id))) })
	}

	fn insert_period(&self, period: BillingPeriod) -> StoreFuture<'_, BillingPeriod> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::write(tables, |t| t.insert_period(period))) })
	}

	fn leased_totals<'a>(
		&'a self,
		tenant_id: &'a TenantId,
		period_id: &'a PeriodId,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Budget> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read(tables, |t| t.leased_totals(tenant_id, period_id, now))) })
	}

	fn active_lease<'a>(&'a self, slot: &'a LeaseSlot) -> StoreFuture<'a, Option<BudgetLease>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read(tables, |t| t.active_lease(slot))) })
	}

	fn commit_lease(
		&self,
		lease: BudgetLease,
		expected_active: Option<Uuid>,
	) -> StoreFuture<'_, LeaseCommit> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::write(tables, |t| t.commit_lease(lease, expected_active))) })
	}

	fn record_usage(
		&self,
		report: UsageReport,
		seed: Option<BillingPeriod>,
	) -> StoreFuture<'_, UsageCommit> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::write(tables, |t| t.record_usage(report, seed))) })
	}

	fn periods(&self) -> StoreFuture<'_, Vec<BillingPeriod>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::read(tables, LedgerTables::periods)) })
	}

	fn expire_leases(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::write(tables, |t| t.expire_leases(now))) })
	}

	fn override_limit<'a>(
		&'a self,
		period_id: &'a PeriodId,
		kind: QuotaKind,
		limit: u64,
	) -> StoreFuture<'a, Option<BillingPeriod>> {
		let tables = self.0.clone();

		Box::pin(async move { Ok(Self::write(tables, |t| t.override_limit(period_id, kind, limit))) })
	}
}
