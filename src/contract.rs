//! Inter-plane wire contracts and their validation into domain requests.
//!
//! Identifier fields are decoded as plain strings (missing means empty) so validation can name the
//! offending field instead of failing the whole document.

// self
use crate::{
	_prelude::*,
	allocator::AllocationRequest,
	error::ValidationError,
	ingest::UsageSubmission,
	ledger::{DataplaneId, IdentifierError, PeriodId, ReportId, RequestId, TenantId},
};

/// Path of the allocation endpoint.
pub const ALLOCATE_PATH: &str = "/internal/v1/budget/allocate";
/// Path of the usage report endpoint.
pub const USAGE_REPORT_PATH: &str = "/internal/v1/usage/report";
/// Path of the policy snapshot endpoint.
pub const POLICY_SNAPSHOT_PATH: &str = "/internal/v1/policy-snapshot";

/// `POST /internal/v1/budget/allocate` request body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateBody {
	/// Tenant identifier.
	#[serde(default)]
	pub tenant_id: String,
	/// Billing period identifier.
	#[serde(default)]
	pub period_id: String,
	/// Data plane identifier.
	#[serde(default)]
	pub dataplane_id: String,
	/// Requested bandwidth in bytes.
	pub bandwidth_requested_bytes: u64,
	/// Requested transforms.
	pub transforms_requested: u64,
	/// Idempotency key.
	#[serde(default)]
	pub request_id: String,
}
impl TryFrom<AllocateBody> for AllocationRequest {
	type Error = ValidationError;

	fn try_from(body: AllocateBody) -> Result<Self, Self::Error> {
		Ok(Self {
			tenant_id: field("tenant_id", TenantId::new(&body.tenant_id))?,
			period_id: field("period_id", PeriodId::new(&body.period_id))?,
			dataplane_id: field("dataplane_id", DataplaneId::new(&body.dataplane_id))?,
			bandwidth_requested_bytes: body.bandwidth_requested_bytes,
			transforms_requested: body.transforms_requested,
			request_id: field("request_id", RequestId::new(&body.request_id))?,
		})
	}
}
impl From<&AllocationRequest> for AllocateBody {
	fn from(request: &AllocationRequest) -> Self {
		Self {
			tenant_id: request.tenant_id.to_string(),
			period_id: request.period_id.to_string(),
			dataplane_id: request.dataplane_id.to_string(),
			bandwidth_requested_bytes: request.bandwidth_requested_bytes,
			transforms_requested: request.transforms_requested,
			request_id: request.request_id.to_string(),
		}
	}
}

/// `POST /internal/v1/usage/report` request body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReportBody {
	/// Idempotency key.
	#[serde(default)]
	pub report_id: String,
	/// Reporting data plane.
	#[serde(default)]
	pub dataplane_id: String,
	/// Tenant identifier.
	#[serde(default)]
	pub tenant_id: String,
	/// Billing period identifier.
	#[serde(default)]
	pub period_id: String,
	/// Bandwidth delta in bytes.
	pub bandwidth_used_bytes: u64,
	/// Transform delta.
	pub transforms_used: u64,
	/// Data plane clock at report time.
	#[serde(with = "time::serde::rfc3339")]
	pub reported_at: OffsetDateTime,
}
impl TryFrom<UsageReportBody> for UsageSubmission {
	type Error = ValidationError;

	fn try_from(body: UsageReportBody) -> Result<Self, Self::Error> {
		Ok(Self {
			report_id: field("report_id", ReportId::new(&body.report_id))?,
			dataplane_id: field("dataplane_id", DataplaneId::new(&body.dataplane_id))?,
			tenant_id: field("tenant_id", TenantId::new(&body.tenant_id))?,
			period_id: field("period_id", PeriodId::new(&body.period_id))?,
			bandwidth_used_bytes: body.bandwidth_used_bytes,
			transforms_used: body.transforms_used,
			reported_at: body.reported_at,
		})
	}
}
impl From<&UsageSubmission> for UsageReportBody {
	fn from(submission: &UsageSubmission) -> Self {
		Self {
			report_id: submission.report_id.to_string(),
			dataplane_id: submission.dataplane_id.to_string(),
			tenant_id: submission.tenant_id.to_string(),
			period_id: submission.period_id.to_string(),
			bandwidth_used_bytes: submission.bandwidth_used_bytes,
			transforms_used: submission.transforms_used,
			reported_at: submission.reported_at,
		}
	}
}

/// Decodes a JSON body, reporting the path of the first failing element.
pub fn decode<T>(bytes: &[u8]) -> Result<T, ValidationError>
where
	T: for<'de> Deserialize<'de>,
{
	let mut deserializer = serde_json::Deserializer::from_slice(bytes);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|e| ValidationError::MalformedBody {
		path: e.path().to_string(),
		message: e.inner().to_string(),
	})
}

fn field<T>(field: &'static str, parsed: Result<T, IdentifierError>) -> Result<T, ValidationError> {
	parsed.map_err(|source| ValidationError::InvalidField { field, source })
}
