//! Ledger tables and the constraint logic shared by the built-in stores.
//!
//! Mutators return the outcome together with a dirty flag so write-through backends only persist
//! when a row actually changed.

// self
use crate::{
	_prelude::*,
	ledger::{
		BillingPeriod, Budget, BudgetLease, LeaseStatus, PeriodId, QuotaKind, ReportId, RequestId,
		TenantId, UsageReport,
	},
	store::{LeaseCommit, LeaseSlot, StoreError, UsageCommit},
};

#[derive(Clone, Debug, Default)]
pub(crate) struct LedgerTables {
	periods: HashMap<PeriodId, BillingPeriod>,
	leases: HashMap<Uuid, BudgetLease>,
	lease_requests: HashMap<RequestId, Uuid>,
	active: HashMap<LeaseSlot, Uuid>,
	reports: HashMap<ReportId, UsageReport>,
}
impl LedgerTables {
	pub(crate) fn lease_by_request(&self, request_id: &RequestId) -> Option<BudgetLease> {
		self.lease_requests.get(request_id).and_then(|id| self.leases.get(id)).cloned()
	}

	pub(crate) fn period(&self, period_id: &PeriodId) -> Option<BillingPeriod> {
		self.periods.get(period_id).cloned()
	}

	pub(crate) fn periods(&self) -> Vec<BillingPeriod> {
		self.periods.values().cloned().collect()
	}

	pub(crate) fn leased_totals(
		&self,
		tenant_id: &TenantId,
		period_id: &PeriodId,
		now: OffsetDateTime,
	) -> Budget {
		self.active
			.iter()
			.filter(|(slot, _)| &slot.tenant_id == tenant_id && &slot.period_id == period_id)
			.filter_map(|(_, id)| self.leases.get(id))
			.filter(|lease| lease.is_active_at(now))
			.map(BudgetLease::granted)
			.sum()
	}

	pub(crate) fn active_lease(&self, slot: &LeaseSlot) -> Option<BudgetLease> {
		self.active.get(slot).and_then(|id| self.leases.get(id)).cloned()
	}

	pub(crate) fn insert_period(&mut self, period: BillingPeriod) -> (BillingPeriod, bool) {
		if let Some(existing) = self.periods.get(&period.period_id) {
			return (existing.clone(), false);
		}

		self.periods.insert(period.period_id.clone(), period.clone());

		(period, true)
	}

	pub(crate) fn commit_lease(
		&mut self,
		lease: BudgetLease,
		expected_active: Option<Uuid>,
	) -> (LeaseCommit, bool) {
		if let Some(existing) = self.lease_by_request(&lease.request_id) {
			return (LeaseCommit::Replayed(existing), false);
		}

		let slot = LeaseSlot::of(&lease);
		let current = self.active.get(&slot).copied();

		if current != expected_active {
			return (LeaseCommit::Conflict, false);
		}
		if let Some(previous) = current.and_then(|id| self.leases.get_mut(&id)) {
			previous.revoke(lease.granted_at);
		}

		let mut lease = lease;

		lease.status = LeaseStatus::Active;
		lease.revoked_at = None;

		self.active.insert(slot, lease.lease_id);
		self.lease_requests.insert(lease.request_id.clone(), lease.lease_id);
		self.leases.insert(lease.lease_id, lease);

		(LeaseCommit::Committed { revoked: current }, true)
	}

	pub(crate) fn record_usage(
		&mut self,
		report: UsageReport,
		seed: Option<BillingPeriod>,
	) -> (UsageCommit, bool) {
		if let Some(existing) = self.reports.get(&report.report_id) {
			let totals =
				self.periods.get(&existing.period_id).map(|p| p.consumed).unwrap_or(Budget::ZERO);

			return (UsageCommit::Duplicate { totals }, false);
		}

		let created_period = match self.periods.get(&report.period_id) {
			Some(period) if period.tenant_id != report.tenant_id =>
				return (UsageCommit::TenantMismatch, false),
			Some(_) => false,
			None => {
				let Some(seed) = seed else {
					return (UsageCommit::UnknownPeriod, false);
				};

				self.periods.insert(report.period_id.clone(), seed);

				true
			},
		};
		let Some(period) = self.periods.get_mut(&report.period_id) else {
			return (UsageCommit::UnknownPeriod, created_period);
		};

		period.record_consumption(report.delta());

		let totals = period.consumed;

		self.reports.insert(report.report_id.clone(), report);

		(UsageCommit::Applied { totals, created_period }, true)
	}

	pub(crate) fn expire_leases(&mut self, now: OffsetDateTime) -> (usize, bool) {
		let mut expired = Vec::new();

		for (slot, id) in &self.active {
			if self.leases.get(id).is_some_and(|lease| lease.expires_at <= now) {
				expired.push((slot.clone(), *id));
			}
		}
		for (slot, id) in &expired {
			self.active.remove(slot);

			if let Some(lease) = self.leases.get_mut(id) {
				lease.expire();
			}
		}

		(expired.len(), !expired.is_empty())
	}

	pub(crate) fn override_limit(
		&mut self,
		period_id: &PeriodId,
		kind: QuotaKind,
		limit: u64,
	) -> (Option<BillingPeriod>, bool) {
		match self.periods.get_mut(period_id) {
			Some(period) => {
				period.apply_override(kind, limit);

				(Some(period.clone()), true)
			},
			None => (None, false),
		}
	}

	pub(crate) fn to_snapshot(&self) -> TablesSnapshot {
		let mut snapshot = TablesSnapshot {
			periods: self.periods.values().cloned().collect(),
			leases: self.leases.values().cloned().collect(),
			reports: self.reports.values().cloned().collect(),
		};

		snapshot.periods.sort_by(|a, b| a.period_id.cmp(&b.period_id));
		snapshot.leases.sort_by_key(|lease| (lease.granted_at, lease.lease_id));
		snapshot.reports.sort_by(|a, b| a.report_id.cmp(&b.report_id));

		snapshot
	}

	/// Rebuilds the tables and their indexes, rejecting snapshots that break a uniqueness rule.
	pub(crate) fn from_snapshot(snapshot: TablesSnapshot) -> Result<Self, StoreError> {
		let mut tables = Self::default();

		for period in snapshot.periods {
			if tables.periods.insert(period.period_id.clone(), period).is_some() {
				return Err(StoreError::Serialization {
					message: "duplicate billing period id in snapshot".into(),
				});
			}
		}
		for lease in snapshot.leases {
			if tables.lease_requests.insert(lease.request_id.clone(), lease.lease_id).is_some() {
				return Err(StoreError::Serialization {
					message: format!("duplicate lease request id {} in snapshot", lease.request_id),
				});
			}
			if lease.status == LeaseStatus::Active
				&& tables.active.insert(LeaseSlot::of(&lease), lease.lease_id).is_some()
			{
				return Err(StoreError::Serialization {
					message: format!("more than one active lease for tenant {}", lease.tenant_id),
				});
			}

			tables.leases.insert(lease.lease_id, lease);
		}
		for report in snapshot.reports {
			if tables.reports.insert(report.report_id.clone(), report).is_some() {
				return Err(StoreError::Serialization {
					message: "duplicate usage report id in snapshot".into(),
				});
			}
		}

		Ok(tables)
	}
}

/// Serialized form of [`LedgerTables`]; indexes are rebuilt on load.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct TablesSnapshot {
	periods: Vec<BillingPeriod>,
	leases: Vec<BudgetLease>,
	reports: Vec<UsageReport>,
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;
	use crate::ledger::{DataplaneId, QuotaLimits};

	fn tenant(value: &str) -> TenantId {
		TenantId::new(value).expect("Tenant fixture should be valid.")
	}

	fn period_id() -> PeriodId {
		PeriodId::new("period-1").expect("Period fixture should be valid.")
	}

	fn lease(request: &str, granted_at: OffsetDateTime) -> BudgetLease {
		BudgetLease {
			lease_id: Uuid::new_v4(),
			tenant_id: tenant("tenant-1"),
			period_id: period_id(),
			dataplane_id: DataplaneId::new("eu-1").expect("Dataplane fixture should be valid."),
			bandwidth_granted_bytes: 100,
			transforms_granted: 10,
			granted_at,
			expires_at: granted_at + Duration::minutes(5),
			status: LeaseStatus::Active,
			revoked_at: None,
			request_id: RequestId::new(request).expect("Request fixture should be valid."),
		}
	}

	#[test]
	fn commit_revokes_previous_lease_at_grant_instant() {
		let mut tables = LedgerTables::default();
		let first = lease("req-1", datetime!(2024-05-01 12:00 UTC));
		let second = lease("req-2", datetime!(2024-05-01 12:01 UTC));
		let first_id = first.lease_id;

		assert_eq!(tables.commit_lease(first, None).0, LeaseCommit::Committed { revoked: None });
		assert_eq!(
			tables.commit_lease(second.clone(), Some(first_id)).0,
			LeaseCommit::Committed { revoked: Some(first_id) }
		);

		let revoked = tables
			.lease_by_request(&RequestId::new("req-1").expect("Request fixture should be valid."))
			.expect("Revoked lease should remain queryable.");

		assert_eq!(revoked.status, LeaseStatus::Revoked);
		assert_eq!(revoked.revoked_at, Some(second.granted_at));
		assert_eq!(
			tables.leased_totals(&tenant("tenant-1"), &period_id(), datetime!(2024-05-01 12:02 UTC)),
			Budget::new(100, 10)
		);
	}

	#[test]
	fn stale_expectation_conflicts_without_mutation() {
		let mut tables = LedgerTables::default();
		let first = lease("req-1", datetime!(2024-05-01 12:00 UTC));

		tables.commit_lease(first, None);

		let (outcome, dirty) =
			tables.commit_lease(lease("req-2", datetime!(2024-05-01 12:01 UTC)), None);

		assert_eq!(outcome, LeaseCommit::Conflict);
		assert!(!dirty);
		assert!(
			tables
				.lease_by_request(&RequestId::new("req-2").expect("Request fixture should be valid."))
				.is_none()
		);
	}

	#[test]
	fn expiry_frees_the_active_slot() {
		let mut tables = LedgerTables::default();
		let first = lease("req-1", datetime!(2024-05-01 12:00 UTC));
		let slot = LeaseSlot::of(&first);

		tables.commit_lease(first, None);

		assert_eq!(tables.expire_leases(datetime!(2024-05-01 12:04 UTC)), (0, false));
		assert_eq!(tables.expire_leases(datetime!(2024-05-01 12:05 UTC)), (1, true));
		assert!(tables.active_lease(&slot).is_none());
		assert_eq!(tables.expire_leases(datetime!(2024-05-01 12:06 UTC)), (0, false));
	}

	#[test]
	fn snapshot_round_trip_rebuilds_indexes() {
		let mut tables = LedgerTables::default();
		let now = datetime!(2024-05-01 12:00 UTC);
		let lease = lease("req-1", now);
		let slot = LeaseSlot::of(&lease);

		tables.insert_period(
			BillingPeriod::calendar_month(tenant("tenant-1"), period_id(), now, QuotaLimits::default(), now)
				.expect("May 2024 should have bounds."),
		);
		tables.commit_lease(lease.clone(), None);

		let payload =
			serde_json::to_vec(&tables.to_snapshot()).expect("Snapshot should serialize to JSON.");
		let snapshot: TablesSnapshot =
			serde_json::from_slice(&payload).expect("Snapshot should deserialize from JSON.");
		let restored =
			LedgerTables::from_snapshot(snapshot).expect("Snapshot should rebuild the tables.");

		assert_eq!(restored.active_lease(&slot), Some(lease));
		assert!(restored.period(&period_id()).is_some());
	}

	#[test]
	fn snapshot_with_two_active_leases_per_slot_is_rejected() {
		let now = datetime!(2024-05-01 12:00 UTC);
		let snapshot = TablesSnapshot {
			periods: Vec::new(),
			leases: vec![lease("req-1", now), lease("req-2", now)],
			reports: Vec::new(),
		};

		assert!(matches!(
			LedgerTables::from_snapshot(snapshot),
			Err(StoreError::Serialization { .. })
		));
	}
}
