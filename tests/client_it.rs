#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
use time::macros;
// self
use quota_broker::{
	_preludet::*,
	allocator::AllocationRequest,
	client::{ControlPlaneClient, LocalBudget},
	contract::{ALLOCATE_PATH, POLICY_SNAPSHOT_PATH, USAGE_REPORT_PATH},
	error::TransientError,
	ingest::UsageSubmission,
	ledger::{Budget, DataplaneId, PeriodId, ReportId, RequestId, TenantId},
	url::Url,
};

fn build_client(server: &MockServer) -> ControlPlaneClient {
	let base_url = Url::parse(&server.base_url()).expect("Mock server URL should parse.");

	ControlPlaneClient::new(base_url, Arc::new(test_authenticator()))
		.expect("Control plane client should build.")
}

fn allocation_request() -> AllocationRequest {
	AllocationRequest {
		tenant_id: TenantId::new("tenant-client").expect("Tenant fixture should be valid."),
		period_id: PeriodId::new("period-client").expect("Period fixture should be valid."),
		dataplane_id: DataplaneId::new("dp-client").expect("Dataplane fixture should be valid."),
		bandwidth_requested_bytes: 1_000,
		transforms_requested: 10,
		request_id: RequestId::new("req-client").expect("Request fixture should be valid."),
	}
}

#[tokio::test]
async fn allocate_sends_signed_json_and_parses_the_grant() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(ALLOCATE_PATH)
				.header_exists("x-signature")
				.header_exists("x-timestamp")
				.header("content-type", "application/json")
				.json_body(json!({
					"tenant_id": "tenant-client",
					"period_id": "period-client",
					"dataplane_id": "dp-client",
					"bandwidth_requested_bytes": 1_000,
					"transforms_requested": 10,
					"request_id": "req-client",
				}));
			then.status(200).header("content-type", "application/json").json_body(json!({
				"lease_id": "6f1c2a8e-5c43-4a3c-9a55-1d2d3b4c5e6f",
				"bandwidth_granted_bytes": 800,
				"transforms_granted": 10,
				"granted_at": "2024-05-10T12:00:00Z",
				"expires_at": "2024-05-10T12:05:00Z",
			}));
		})
		.await;
	let grant = build_client(&server)
		.allocate(&allocation_request())
		.await
		.expect("Allocation call should succeed.");

	mock.assert_async().await;

	assert_eq!(grant.bandwidth_granted_bytes, 800);
	assert_eq!(grant.expires_at, macros::datetime!(2024-05-10 12:05 UTC));

	let mut budget = LocalBudget::new();

	budget.install(grant);
	budget.consume(Budget::new(700, 1));

	assert!(budget.needs_refill_at(macros::datetime!(2024-05-10 12:01 UTC)));
}

#[tokio::test]
async fn report_usage_and_snapshot_round_through_the_client() {
	let server = MockServer::start_async().await;
	let usage = server
		.mock_async(|when, then| {
			when.method(POST).path(USAGE_REPORT_PATH).header_exists("x-signature");
			then.status(200).json_body(json!({
				"accepted": true,
				"total_bandwidth_bytes": 64,
				"total_transforms": 1,
			}));
		})
		.await;
	let snapshot = server
		.mock_async(|when, then| {
			when.method(GET).path(POLICY_SNAPSHOT_PATH).header_exists("x-signature");
			then.status(200).json_body(json!({
				"snapshot_id": "0b5d7c1e-8f3a-4d2b-9c6e-7a1f2e3d4c5b",
				"generated_at": "2024-05-10T12:00:00Z",
				"tenants": [],
			}));
		})
		.await;
	let client = build_client(&server);
	let receipt = client
		.report_usage(&UsageSubmission {
			report_id: ReportId::new("report-client").expect("Report fixture should be valid."),
			dataplane_id: DataplaneId::new("dp-client").expect("Dataplane fixture should be valid."),
			tenant_id: TenantId::new("tenant-client").expect("Tenant fixture should be valid."),
			period_id: PeriodId::new("period-client").expect("Period fixture should be valid."),
			bandwidth_used_bytes: 64,
			transforms_used: 1,
			reported_at: macros::datetime!(2024-05-10 12:00 UTC),
		})
		.await
		.expect("Usage call should succeed.");
	let published = client.policy_snapshot().await.expect("Snapshot call should succeed.");

	usage.assert_async().await;
	snapshot.assert_async().await;

	assert!(receipt.accepted);
	assert_eq!(receipt.total_bandwidth_bytes, 64);
	assert!(published.tenants.is_empty());
}

#[tokio::test]
async fn rejections_surface_the_error_code() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(ALLOCATE_PATH);
			then.status(409).json_body(json!({
				"error_code": "ALLOCATION_CONFLICT",
				"message": "Allocation kept conflicting.",
				"trace_id": "0b5d7c1e-8f3a-4d2b-9c6e-7a1f2e3d4c5b",
				"timestamp": "2024-05-10T12:00:00Z",
			}));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path(POLICY_SNAPSHOT_PATH);
			then.status(502).body("upstream unavailable");
		})
		.await;

	let client = build_client(&server);
	let err = client
		.allocate(&allocation_request())
		.await
		.expect_err("A 409 response must surface as an error.");

	assert!(matches!(
		err,
		Error::Rejected { status: 409, ref error_code } if error_code == "ALLOCATION_CONFLICT"
	));

	let err = client.policy_snapshot().await.expect_err("A 502 response must surface as an error.");

	assert!(matches!(
		err,
		Error::Rejected { status: 502, ref error_code } if error_code == "HTTP_502"
	));
}

#[tokio::test]
async fn malformed_success_bodies_are_transient() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(USAGE_REPORT_PATH);
			then.status(200).json_body(json!({ "accepted": "yes" }));
		})
		.await;

	let err = build_client(&server)
		.report_usage(&UsageSubmission {
			report_id: ReportId::new("report-client").expect("Report fixture should be valid."),
			dataplane_id: DataplaneId::new("dp-client").expect("Dataplane fixture should be valid."),
			tenant_id: TenantId::new("tenant-client").expect("Tenant fixture should be valid."),
			period_id: PeriodId::new("period-client").expect("Period fixture should be valid."),
			bandwidth_used_bytes: 1,
			transforms_used: 1,
			reported_at: macros::datetime!(2024-05-10 12:00 UTC),
		})
		.await
		.expect_err("A malformed receipt must surface as an error.");

	assert!(matches!(
		err,
		Error::Transient(TransientError::ResponseParse { status: Some(200), .. })
	));
}
