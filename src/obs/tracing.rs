// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::OperationKind};

/// `quota_broker.operation` span carried by every ledger operation.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	span: Span,
}
impl OperationSpan {
	/// Opens the span for `kind` at `stage`.
	pub fn new(kind: OperationKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("quota_broker.operation", operation = kind.as_str(), stage) }
	}

	/// Runs `fut` inside the span.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrumented_operation_keeps_its_output() {
		let span = OperationSpan::new(OperationKind::Snapshot, "publish");
		let tenants = OperationSpan::instrument(&span, async { vec!["tenant-a", "tenant-b"] }).await;

		assert_eq!(tenants, ["tenant-a", "tenant-b"]);
	}
}
