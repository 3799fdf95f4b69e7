//! Immutable usage reports pushed by data planes.

// self
use crate::{
	_prelude::*,
	ledger::{
		budget::Budget,
		id::{DataplaneId, PeriodId, ReportId, TenantId},
	},
};

/// Usage delta reported once per `report_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
	/// Idempotency key.
	pub report_id: ReportId,
	/// Reporting data plane.
	pub dataplane_id: DataplaneId,
	/// Tenant the usage belongs to.
	pub tenant_id: TenantId,
	/// Billing period the usage is charged against.
	pub period_id: PeriodId,
	/// Bandwidth consumed since the previous report.
	pub bandwidth_used_bytes: u64,
	/// Transforms executed since the previous report.
	pub transforms_used: u64,
	/// Data plane clock at report time.
	#[serde(with = "time::serde::rfc3339")]
	pub reported_at: OffsetDateTime,
	/// Control plane clock at receipt.
	#[serde(with = "time::serde::rfc3339")]
	pub received_at: OffsetDateTime,
}
impl UsageReport {
	/// Delta carried by the report.
	pub const fn delta(&self) -> Budget {
		Budget::new(self.bandwidth_used_bytes, self.transforms_used)
	}
}
