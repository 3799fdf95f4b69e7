//! Observability helpers shared by the broker operations.
//!
//! Spans are named `quota_broker.operation` and carry the `operation` and `stage` fields. With the
//! `metrics` feature enabled every attempt, success, replay, and failure also increments the
//! `quota_broker_operation_total` counter, labelled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Broker operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Budget lease allocation.
	Allocate,
	/// Usage report ingestion.
	Ingest,
	/// Policy snapshot materialization.
	Snapshot,
	/// Inter-plane request verification.
	Authenticate,
	/// Expired lease sweep.
	Sweep,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::Allocate => "allocate",
			OperationKind::Ingest => "ingest",
			OperationKind::Snapshot => "snapshot",
			OperationKind::Authenticate => "authenticate",
			OperationKind::Sweep => "sweep",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// Entry to a broker operation.
	Attempt,
	/// Successful completion with a fresh side effect.
	Success,
	/// Idempotent replay of an earlier request.
	Replay,
	/// Failure propagated back to the caller.
	Failure,
}
impl OperationOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Replay => "replay",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
