//! Exactly-once usage ingestion.

// self
use crate::{
	_prelude::*,
	error::ValidationError,
	ledger::{
		BillingPeriod, Budget, DataplaneId, PeriodId, QuotaLimits, ReportId, TenantId, UsageReport,
	},
	obs::{self, OperationKind, OperationOutcome, OperationSpan},
	store::{LedgerStore, StoreError, UsageCommit},
};

/// Validated usage submission from a data plane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageSubmission {
	/// Idempotency key.
	pub report_id: ReportId,
	/// Reporting data plane.
	pub dataplane_id: DataplaneId,
	/// Tenant the usage belongs to.
	pub tenant_id: TenantId,
	/// Billing period the usage is charged against.
	pub period_id: PeriodId,
	/// Bandwidth delta in bytes.
	pub bandwidth_used_bytes: u64,
	/// Transform delta.
	pub transforms_used: u64,
	/// Data plane clock at report time.
	pub reported_at: OffsetDateTime,
}

/// Response to a usage submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
	/// Always `true` for stored or replayed reports.
	pub accepted: bool,
	/// Period bandwidth consumption after the report.
	pub total_bandwidth_bytes: u64,
	/// Period transform consumption after the report.
	pub total_transforms: u64,
}

/// Applies usage deltas to the ledger exactly once per report id.
pub struct UsageIngestor {
	store: Arc<dyn LedgerStore>,
	default_limits: QuotaLimits,
}
impl UsageIngestor {
	/// Creates an ingestor over `store`; lazily created periods get `default_limits`.
	pub fn new(store: Arc<dyn LedgerStore>, default_limits: QuotaLimits) -> Self {
		Self { store, default_limits }
	}

	/// Ingests a submission stamped with the current UTC clock.
	pub async fn ingest(&self, submission: UsageSubmission) -> Result<IngestReceipt> {
		self.ingest_at(submission, OffsetDateTime::now_utc()).await
	}

	/// Ingests a submission received at `received_at`.
	pub async fn ingest_at(
		&self,
		submission: UsageSubmission,
		received_at: OffsetDateTime,
	) -> Result<IngestReceipt> {
		const KIND: OperationKind = OperationKind::Ingest;

		let span = OperationSpan::new(KIND, "ingest");

		obs::record_operation_outcome(KIND, OperationOutcome::Attempt);

		let result = span.instrument(self.record(submission, received_at)).await;

		match &result {
			Ok((_, true)) => obs::record_operation_outcome(KIND, OperationOutcome::Replay),
			Ok((_, false)) => obs::record_operation_outcome(KIND, OperationOutcome::Success),
			Err(_) => obs::record_operation_outcome(KIND, OperationOutcome::Failure),
		}

		result.map(|(receipt, _)| receipt)
	}

	async fn record(
		&self,
		submission: UsageSubmission,
		received_at: OffsetDateTime,
	) -> Result<(IngestReceipt, bool)> {
		let seed = match self.store.period(&submission.period_id).await? {
			Some(_) => None,
			None => Some(
				BillingPeriod::calendar_month(
					submission.tenant_id.clone(),
					submission.period_id.clone(),
					submission.reported_at,
					self.default_limits,
					received_at,
				)
				.ok_or(ValidationError::OutOfRange { field: "reported_at" })?,
			),
		};
		let report = UsageReport {
			report_id: submission.report_id,
			dataplane_id: submission.dataplane_id,
			tenant_id: submission.tenant_id,
			period_id: submission.period_id,
			bandwidth_used_bytes: submission.bandwidth_used_bytes,
			transforms_used: submission.transforms_used,
			reported_at: submission.reported_at,
			received_at,
		};
		let report_id = report.report_id.clone();
		let period_id = report.period_id.clone();

		match self.store.record_usage(report, seed).await? {
			UsageCommit::Applied { totals, created_period } => {
				if created_period {
					tracing::warn!(
						%period_id,
						"Billing period was unknown; created it from the usage report."
					);
				}

				tracing::info!(
					%report_id,
					%period_id,
					total_bandwidth = totals.bandwidth_bytes,
					total_transforms = totals.transforms,
					"Usage report applied."
				);

				Ok((receipt(totals), false))
			},
			UsageCommit::Duplicate { totals } => {
				tracing::info!(%report_id, "Usage report already processed; returning current totals.");

				Ok((receipt(totals), true))
			},
			UsageCommit::TenantMismatch =>
				Err(ValidationError::PeriodTenantMismatch { period: period_id }.into()),
			UsageCommit::UnknownPeriod => Err(StoreError::Backend {
				message: format!("billing period {period_id} vanished while recording usage"),
			}
			.into()),
		}
	}
}
impl Debug for UsageIngestor {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UsageIngestor")
			.field("default_limits", &self.default_limits)
			.finish_non_exhaustive()
	}
}

fn receipt(totals: Budget) -> IngestReceipt {
	IngestReceipt {
		accepted: true,
		total_bandwidth_bytes: totals.bandwidth_bytes,
		total_transforms: totals.transforms,
	}
}
