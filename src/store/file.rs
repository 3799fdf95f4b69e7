//! File-backed [`LedgerStore`] for single-node deployments.
//!
//! Mutations are staged on a copy of the tables, written to a temporary file, renamed over the
//! snapshot, and only then published in memory. A failed write leaves both the file and the
//! in-memory view untouched.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	ledger::{
		BillingPeriod, Budget, BudgetLease, PeriodId, QuotaKind, RequestId, TenantId, UsageReport,
	},
	store::{
		LeaseCommit, LeaseSlot, LedgerStore, StoreError, StoreFuture, UsageCommit,
		tables::{LedgerTables, TablesSnapshot},
	},
};

/// Persists the ledger to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<LedgerTables>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let tables = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(tables)) })
	}

	fn load_snapshot(path: &Path) -> Result<LedgerTables, StoreError> {
		if !path.exists() {
			return Ok(LedgerTables::default());
		}

		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(LedgerTables::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let snapshot: TablesSnapshot =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		LedgerTables::from_snapshot(snapshot)
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, tables: &LedgerTables) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(&tables.to_snapshot()).map_err(|e| {
				StoreError::Serialization {
					message: format!("Failed to serialize ledger snapshot: {e}"),
				}
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn stage<T>(
		&self,
		op: impl FnOnce(&mut LedgerTables) -> (T, bool),
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let mut staged = guard.clone();
		let (outcome, dirty) = op(&mut staged);

		if dirty {
			self.persist(&staged)?;

			*guard = staged;
		}

		Ok(outcome)
	}
}
impl LedgerStore for FileStore {
	fn lease_by_request<'a>(
		&'a self,
		request_id: &'a RequestId,
	) -> StoreFuture<'a, Option<BudgetLease>> {
		Box::pin(async move { Ok(self.inner.read().lease_by_request(request_id)) })
	}

	fn period<'a>(&'a self, period_id: &'a PeriodId) -> StoreFuture<'a, Option<BillingPeriod>> {
		Box::pin(async move { Ok(self.inner.read().period(period_id)) })
	}

	fn insert_period(&self, period: BillingPeriod) -> StoreFuture<'_, BillingPeriod> {
		Box::pin(async move { self.stage(|t| t.insert_period(period)) })
	}

	fn leased_totals<'a>(
		&'a self,
		tenant_id: &'a TenantId,
		period_id: &'a PeriodId,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Budget> {
		Box::pin(async move { Ok(self.inner.read().leased_totals(tenant_id, period_id, now)) })
	}

	fn active_lease<'a>(&'a self, slot: &'a LeaseSlot) -> StoreFuture<'a, Option<BudgetLease>> {
		Box::pin(async move { Ok(self.inner.read().active_lease(slot)) })
	}

	fn commit_lease(
		&self,
		lease: BudgetLease,
		expected_active: Option<Uuid>,
	) -> StoreFuture<'_, LeaseCommit> {
		Box::pin(async move { self.stage(|t| t.commit_lease(lease, expected_active)) })
	}

	fn record_usage(
		&self,
		report: UsageReport,
		seed: Option<BillingPeriod>,
	) -> StoreFuture<'_, UsageCommit> {
		Box::pin(async move { self.stage(|t| t.record_usage(report, seed)) })
	}

	fn periods(&self) -> StoreFuture<'_, Vec<BillingPeriod>> {
		Box::pin(async move { Ok(self.inner.read().periods()) })
	}

	fn expire_leases(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		Box::pin(async move { self.stage(|t| t.expire_leases(now)) })
	}

	fn override_limit<'a>(
		&'a self,
		period_id: &'a PeriodId,
		kind: QuotaKind,
		limit: u64,
	) -> StoreFuture<'a, Option<BillingPeriod>> {
		Box::pin(async move { self.stage(|t| t.override_limit(period_id, kind, limit)) })
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use time::macros::datetime;
	use tokio::runtime::Runtime;
	// self
	use super::*;
	use crate::ledger::{DataplaneId, QuotaLimits, ReportId};

	fn temp_path() -> PathBuf {
		let unique = format!(
			"quota_broker_file_store_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn report(period: &BillingPeriod) -> UsageReport {
		UsageReport {
			report_id: ReportId::new("report-1").expect("Report fixture should be valid."),
			dataplane_id: DataplaneId::new("eu-1").expect("Dataplane fixture should be valid."),
			tenant_id: period.tenant_id.clone(),
			period_id: period.period_id.clone(),
			bandwidth_used_bytes: 512,
			transforms_used: 3,
			reported_at: datetime!(2024-05-02 10:00 UTC),
			received_at: datetime!(2024-05-02 10:00:01 UTC),
		}
	}

	#[test]
	fn usage_survives_reopen() {
		let path = temp_path();
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let now = datetime!(2024-05-02 10:00 UTC);
		let period = BillingPeriod::calendar_month(
			TenantId::new("tenant-1").expect("Tenant fixture should be valid."),
			PeriodId::new("period-1").expect("Period fixture should be valid."),
			now,
			QuotaLimits::default(),
			now,
		)
		.expect("May 2024 should have bounds.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");
		let commit = rt
			.block_on(store.record_usage(report(&period), Some(period.clone())))
			.expect("Recording usage into the file store should succeed.");

		assert!(matches!(commit, UsageCommit::Applied { created_period: true, .. }));

		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.period(&period.period_id))
			.expect("Fetching the period from the file store should succeed.")
			.expect("File store lost the period after reopen.");

		assert_eq!(fetched.consumed, Budget::new(512, 3));

		let duplicate = rt
			.block_on(reopened.record_usage(report(&period), None))
			.expect("Replaying a report should succeed.");

		assert_eq!(duplicate, UsageCommit::Duplicate { totals: Budget::new(512, 3) });

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_persist_leaves_memory_untouched() {
		let dir = temp_path();

		fs::create_dir_all(&dir).expect("Failed to create the temporary directory fixture.");

		// The snapshot path is a directory, so every rename fails.
		let store = FileStore {
			path: dir.clone(),
			inner: Arc::new(RwLock::new(LedgerTables::default())),
		};
		let now = datetime!(2024-05-02 10:00 UTC);
		let period = BillingPeriod::calendar_month(
			TenantId::new("tenant-1").expect("Tenant fixture should be valid."),
			PeriodId::new("period-1").expect("Period fixture should be valid."),
			now,
			QuotaLimits::default(),
			now,
		)
		.expect("May 2024 should have bounds.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		assert!(rt.block_on(store.insert_period(period.clone())).is_err());
		assert!(
			rt.block_on(store.period(&period.period_id))
				.expect("Reading the period should succeed.")
				.is_none()
		);

		let mut tmp_path = dir.clone();

		tmp_path.set_extension("tmp");

		let _ = fs::remove_file(&tmp_path);

		fs::remove_dir_all(&dir).unwrap_or_else(|e| {
			panic!("Failed to remove temporary directory {}: {e}", dir.display())
		});
	}
}
