//! Policy snapshot publication.
//!
//! A snapshot is a read-only, point-in-time view of every tenant that owns at least one billing
//! period. Each snapshot fully supersedes the previous one.

pub mod directory;

pub use directory::*;

// self
use crate::{
	_prelude::*,
	ledger::{BillingPeriod, PeriodId, TenantId},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	store::LedgerStore,
};

/// Published quota limits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaView {
	/// Bandwidth limit in bytes.
	pub bandwidth_limit_bytes: u64,
	/// Transform limit.
	pub transforms_limit: u64,
	/// Storage limit in bytes.
	pub storage_limit_bytes: u64,
	/// Domains limit.
	pub domains_limit: u32,
}

/// Published consumption of the current period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageView {
	/// Bandwidth consumed in bytes.
	pub bandwidth_consumed_bytes: u64,
	/// Transforms consumed.
	pub transforms_consumed: u64,
}

/// Snapshot record for one tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPolicy {
	/// Tenant identifier.
	pub tenant_id: TenantId,
	/// Period the quotas are taken from.
	pub current_period_id: PeriodId,
	/// Tenant status label.
	pub status: String,
	/// Plan code label.
	pub plan_code: String,
	/// Limits of the current period.
	pub quotas: QuotaView,
	/// Consumption of the current period.
	pub usage: UsageView,
	/// Registered domains.
	pub domains: Vec<DomainEntry>,
	/// Registered API keys.
	pub api_keys: Vec<ApiKeyEntry>,
}

/// Point-in-time policy view for data planes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
	/// Unique snapshot identifier.
	pub snapshot_id: Uuid,
	/// Generation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub generated_at: OffsetDateTime,
	/// One record per tenant, ordered by tenant id.
	pub tenants: Vec<TenantPolicy>,
}

/// Materializes [`PolicySnapshot`]s from the ledger.
pub struct PolicySnapshotPublisher {
	store: Arc<dyn LedgerStore>,
	directory: Arc<dyn TenantDirectory>,
}
impl PolicySnapshotPublisher {
	/// Creates a publisher reading `store` and decorating records from `directory`.
	pub fn new(store: Arc<dyn LedgerStore>, directory: Arc<dyn TenantDirectory>) -> Self {
		Self { store, directory }
	}

	/// Generates a snapshot using the current UTC clock.
	pub async fn snapshot(&self) -> Result<PolicySnapshot> {
		self.snapshot_at(OffsetDateTime::now_utc()).await
	}

	/// Generates a snapshot as of `now`.
	pub async fn snapshot_at(&self, now: OffsetDateTime) -> Result<PolicySnapshot> {
		const KIND: OperationKind = OperationKind::Snapshot;

		let span = OperationSpan::new(KIND, "snapshot");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result: Result<PolicySnapshot> = span
			.instrument(async move {
				let periods = self.store.periods().await?;

				Ok(self.materialize(periods, now))
			})
			.await;

		match &result {
			Ok(snapshot) => {
				tracing::info!(
					snapshot_id = %snapshot.snapshot_id,
					tenant_count = snapshot.tenants.len(),
					"Policy snapshot generated."
				);
				obs::record_operation_outcome(KIND, OperationOutcome::Success);
			},
			Err(_) => obs::record_operation_outcome(KIND, OperationOutcome::Failure),
		}

		result
	}

	fn materialize(&self, periods: Vec<BillingPeriod>, now: OffsetDateTime) -> PolicySnapshot {
		let mut by_tenant: BTreeMap<TenantId, Vec<BillingPeriod>> = BTreeMap::new();

		for period in periods {
			by_tenant.entry(period.tenant_id.clone()).or_default().push(period);
		}

		let tenants = by_tenant
			.into_iter()
			.filter_map(|(tenant_id, periods)| {
				let period = current_period(&periods, now)?;
				let profile = self.directory.profile(&tenant_id);

				Some(TenantPolicy {
					tenant_id,
					current_period_id: period.period_id.clone(),
					status: profile.status,
					plan_code: profile.plan_code,
					quotas: QuotaView {
						bandwidth_limit_bytes: period.limits.bandwidth_bytes,
						transforms_limit: period.limits.transforms,
						storage_limit_bytes: period.limits.storage_bytes,
						domains_limit: profile.domains_limit,
					},
					usage: UsageView {
						bandwidth_consumed_bytes: period.consumed.bandwidth_bytes,
						transforms_consumed: period.consumed.transforms,
					},
					domains: profile.domains,
					api_keys: profile.api_keys,
				})
			})
			.collect();

		PolicySnapshot { snapshot_id: Uuid::new_v4(), generated_at: now, tenants }
	}
}
impl Debug for PolicySnapshotPublisher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PolicySnapshotPublisher").finish_non_exhaustive()
	}
}

/// Picks the period containing `now`; otherwise the most recently started one; otherwise the
/// earliest upcoming one.
pub fn current_period(periods: &[BillingPeriod], now: OffsetDateTime) -> Option<&BillingPeriod> {
	let latest_started = periods
		.iter()
		.filter(|period| period.starts_at <= now)
		.max_by(|a, b| {
			a.contains(now)
				.cmp(&b.contains(now))
				.then(a.starts_at.cmp(&b.starts_at))
				.then(a.period_id.cmp(&b.period_id))
		});

	latest_started.or_else(|| {
		periods.iter().min_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.period_id.cmp(&b.period_id)))
	})
}
