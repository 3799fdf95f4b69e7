//! Budget lease allocation with idempotent replay and compare-and-swap hand-off.
//!
//! [`BudgetAllocator::allocate`] grants `min(requested, available)` per dimension, where
//! `available = limit - consumed - leased` and `leased` sums every lease of the (tenant, period)
//! that is still active, the caller's own current lease included. The new lease supersedes the
//! slot's active lease through [`LedgerStore::commit_lease`]; a concurrent allocation that moved
//! the slot in between triggers a jittered retry of the whole computation.

mod metrics;

pub use metrics::AllocationMetrics;

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	error::ValidationError,
	ledger::{
		BillingPeriod, Budget, BudgetLease, DataplaneId, LeaseStatus, PeriodId, QuotaLimits,
		RequestId, TenantId,
	},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	store::{LeaseCommit, LeaseSlot, LedgerStore},
};

const BACKOFF_BASE_MS: u64 = 10;
const BACKOFF_JITTER_MS: u64 = 25;

/// Validated allocation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationRequest {
	/// Tenant asking for budget.
	pub tenant_id: TenantId,
	/// Billing period to carve the budget from.
	pub period_id: PeriodId,
	/// Data plane that will hold the lease.
	pub dataplane_id: DataplaneId,
	/// Requested bandwidth in bytes.
	pub bandwidth_requested_bytes: u64,
	/// Requested transforms.
	pub transforms_requested: u64,
	/// Idempotency key.
	pub request_id: RequestId,
}
impl AllocationRequest {
	fn requested(&self) -> Budget {
		Budget::new(self.bandwidth_requested_bytes, self.transforms_requested)
	}

	fn slot(&self) -> LeaseSlot {
		LeaseSlot::new(self.tenant_id.clone(), self.period_id.clone(), self.dataplane_id.clone())
	}
}

/// Lease as returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationGrant {
	/// Lease identifier.
	pub lease_id: Uuid,
	/// Granted bandwidth in bytes.
	pub bandwidth_granted_bytes: u64,
	/// Granted transforms.
	pub transforms_granted: u64,
	/// Grant instant.
	#[serde(with = "time::serde::rfc3339")]
	pub granted_at: OffsetDateTime,
	/// Expiry instant.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}
impl From<&BudgetLease> for AllocationGrant {
	fn from(lease: &BudgetLease) -> Self {
		Self {
			lease_id: lease.lease_id,
			bandwidth_granted_bytes: lease.bandwidth_granted_bytes,
			transforms_granted: lease.transforms_granted,
			granted_at: lease.granted_at,
			expires_at: lease.expires_at,
		}
	}
}

/// Issues, hands off, and replays budget leases.
pub struct BudgetAllocator {
	store: Arc<dyn LedgerStore>,
	lease_ttl: Duration,
	default_limits: QuotaLimits,
	max_conflict_retries: u32,
	metrics: AllocationMetrics,
}
impl BudgetAllocator {
	/// Creates an allocator over `store`.
	pub fn new(
		store: Arc<dyn LedgerStore>,
		lease_ttl: Duration,
		default_limits: QuotaLimits,
		max_conflict_retries: u32,
	) -> Self {
		Self {
			store,
			lease_ttl,
			default_limits,
			max_conflict_retries,
			metrics: AllocationMetrics::default(),
		}
	}

	/// Allocation counters.
	pub fn metrics(&self) -> &AllocationMetrics {
		&self.metrics
	}

	/// Allocates a lease using the current UTC clock.
	pub async fn allocate(&self, request: AllocationRequest) -> Result<AllocationGrant> {
		self.allocate_at(request, OffsetDateTime::now_utc()).await
	}

	/// Allocates a lease as of `now`.
	pub async fn allocate_at(
		&self,
		request: AllocationRequest,
		now: OffsetDateTime,
	) -> Result<AllocationGrant> {
		const KIND: OperationKind = OperationKind::Allocate;

		let span = OperationSpan::new(KIND, "allocate");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.allocate_with_retries(&request, now)).await;

		match &result {
			Ok((_, true)) => obs::record_operation_outcome(KIND, OperationOutcome::Replay),
			Ok((_, false)) => obs::record_operation_outcome(KIND, OperationOutcome::Success),
			Err(_) => obs::record_operation_outcome(KIND, OperationOutcome::Failure),
		}

		result.map(|(grant, _)| grant)
	}

	async fn allocate_with_retries(
		&self,
		request: &AllocationRequest,
		now: OffsetDateTime,
	) -> Result<(AllocationGrant, bool)> {
		let mut attempt = 0;

		loop {
			attempt += 1;

			if let Some(outcome) = self.try_allocate(request, now).await? {
				return Ok(outcome);
			}

			self.metrics.record_conflict();

			if attempt > self.max_conflict_retries {
				tracing::warn!(
					tenant_id = %request.tenant_id,
					dataplane_id = %request.dataplane_id,
					attempts = attempt,
					"Lease allocation kept conflicting; giving up."
				);

				return Err(Error::Conflict { attempts: attempt });
			}

			let backoff = BACKOFF_BASE_MS * u64::from(attempt)
				+ rand::rng().random_range(0..=BACKOFF_JITTER_MS);

			tracing::debug!(
				tenant_id = %request.tenant_id,
				dataplane_id = %request.dataplane_id,
				attempt,
				backoff_ms = backoff,
				"Lease slot changed concurrently; retrying allocation."
			);
			tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
		}
	}

	/// One allocation pass; `Ok(None)` signals a compare-and-swap conflict.
	async fn try_allocate(
		&self,
		request: &AllocationRequest,
		now: OffsetDateTime,
	) -> Result<Option<(AllocationGrant, bool)>> {
		if let Some(existing) = self.store.lease_by_request(&request.request_id).await? {
			return Ok(Some(self.replay(&existing)));
		}

		let period = self.resolve_period(request, now).await?;
		// The token must not be newer than the totals the grant is computed from.
		let expected_active =
			self.store.active_lease(&request.slot()).await?.map(|lease| lease.lease_id);
		let leased =
			self.store.leased_totals(&request.tenant_id, &request.period_id, now).await?;
		let available = period.available(leased);
		let granted = request.requested().min(available);
		let lease = BudgetLease {
			lease_id: Uuid::new_v4(),
			tenant_id: request.tenant_id.clone(),
			period_id: request.period_id.clone(),
			dataplane_id: request.dataplane_id.clone(),
			bandwidth_granted_bytes: granted.bandwidth_bytes,
			transforms_granted: granted.transforms,
			granted_at: now,
			expires_at: now + self.lease_ttl,
			status: LeaseStatus::Active,
			revoked_at: None,
			request_id: request.request_id.clone(),
		};

		match self.store.commit_lease(lease.clone(), expected_active).await? {
			LeaseCommit::Committed { revoked } => {
				if let Some(revoked) = revoked {
					tracing::info!(
						%revoked,
						tenant_id = %request.tenant_id,
						dataplane_id = %request.dataplane_id,
						"Revoked previous lease for new allocation."
					);
				}

				tracing::info!(
					lease_id = %lease.lease_id,
					tenant_id = %request.tenant_id,
					dataplane_id = %request.dataplane_id,
					requested_bandwidth = request.bandwidth_requested_bytes,
					requested_transforms = request.transforms_requested,
					available_bandwidth = available.bandwidth_bytes,
					available_transforms = available.transforms,
					granted_bandwidth = granted.bandwidth_bytes,
					granted_transforms = granted.transforms,
					expires_at = %lease.expires_at,
					"Budget lease allocated."
				);
				self.metrics.record_grant(granted.is_zero());

				Ok(Some((AllocationGrant::from(&lease), false)))
			},
			LeaseCommit::Replayed(existing) => Ok(Some(self.replay(&existing))),
			LeaseCommit::Conflict => Ok(None),
		}
	}

	async fn resolve_period(
		&self,
		request: &AllocationRequest,
		now: OffsetDateTime,
	) -> Result<BillingPeriod> {
		let period = match self.store.period(&request.period_id).await? {
			Some(period) => period,
			None => {
				let seed = BillingPeriod::calendar_month(
					request.tenant_id.clone(),
					request.period_id.clone(),
					now,
					self.default_limits,
					now,
				)
				.ok_or(ValidationError::OutOfRange { field: "now" })?;
				let stored = self.store.insert_period(seed).await?;

				tracing::info!(
					period_id = %stored.period_id,
					tenant_id = %stored.tenant_id,
					period_key = %stored.period_key,
					"Created billing period on first allocation."
				);

				stored
			},
		};

		if period.tenant_id != request.tenant_id {
			return Err(ValidationError::PeriodTenantMismatch { period: period.period_id }.into());
		}

		Ok(period)
	}

	fn replay(&self, lease: &BudgetLease) -> (AllocationGrant, bool) {
		tracing::info!(
			lease_id = %lease.lease_id,
			request_id = %lease.request_id,
			"Idempotent allocation; returning existing lease."
		);
		self.metrics.record_replay();

		(AllocationGrant::from(lease), true)
	}
}
impl Debug for BudgetAllocator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BudgetAllocator")
			.field("lease_ttl", &self.lease_ttl)
			.field("default_limits", &self.default_limits)
			.field("max_conflict_retries", &self.max_conflict_retries)
			.field("metrics", &self.metrics)
			.finish_non_exhaustive()
	}
}
