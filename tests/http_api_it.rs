// crates.io
use axum::{
	Router,
	body::Body,
	http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
// self
use quota_broker::{
	_preludet::*,
	auth::{InterPlaneAuthenticator, SIGNATURE_HEADER, SharedSecret, TIMESTAMP_HEADER},
	config::ServiceConfig,
	contract::{ALLOCATE_PATH, POLICY_SNAPSHOT_PATH, USAGE_REPORT_PATH},
	server::{self, AppState},
	store::{LedgerStore, MemoryStore},
};

fn app() -> Router {
	let (state, _) = build_test_state();

	server::router(state)
}

fn allocate_body(tenant_id: &str, request_id: &str) -> Vec<u8> {
	serde_json::to_vec(&json!({
		"tenant_id": tenant_id,
		"period_id": "period-http",
		"dataplane_id": "dp-http",
		"bandwidth_requested_bytes": 1_024,
		"transforms_requested": 4,
		"request_id": request_id,
	}))
	.expect("Allocate body fixture should serialize.")
}

fn signed_request(
	authenticator: &InterPlaneAuthenticator,
	method: &str,
	path: &str,
	body: Vec<u8>,
	timestamp: i64,
) -> Request<Body> {
	let signature = authenticator.sign(method, path, &body, timestamp);

	Request::builder()
		.method(method)
		.uri(path)
		.header("content-type", "application/json")
		.header(TIMESTAMP_HEADER, timestamp.to_string())
		.header(SIGNATURE_HEADER, signature)
		.body(Body::from(body))
		.expect("Signed request fixture should build.")
}

fn now_secs() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.oneshot(request).await.expect("Router should always produce a response.");
	let status = response.status();
	let bytes = response
		.into_body()
		.collect()
		.await
		.expect("Response body should be readable.")
		.to_bytes();
	let body = serde_json::from_slice(&bytes).expect("Response body should be JSON.");

	(status, body)
}

#[tokio::test]
async fn signed_allocation_is_granted() {
	let request = signed_request(
		&test_authenticator(),
		"POST",
		ALLOCATE_PATH,
		allocate_body("tenant-http", "req-1"),
		now_secs(),
	);
	let (status, body) = send(app(), request).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["bandwidth_granted_bytes"], 1_024);
	assert_eq!(body["transforms_granted"], 4);
	assert!(body["lease_id"].is_string());
	assert!(body["expires_at"].is_string());
}

#[tokio::test]
async fn wrong_secret_is_rejected_uniformly() {
	let other = InterPlaneAuthenticator::new(
		SharedSecret::new("a-completely-different-secret-value-0000")
			.expect("Secret fixture should be accepted."),
		Duration::minutes(5),
	)
	.expect("Authenticator fixture should build.");
	let request = signed_request(
		&other,
		"POST",
		ALLOCATE_PATH,
		allocate_body("tenant-http", "req-1"),
		now_secs(),
	);
	let (status, body) = send(app(), request).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body["error_code"], "UNAUTHORIZED");
	assert!(body["trace_id"].is_string());
}

#[tokio::test]
async fn stale_timestamp_is_rejected() {
	let request = signed_request(
		&test_authenticator(),
		"POST",
		ALLOCATE_PATH,
		allocate_body("tenant-http", "req-1"),
		now_secs() - 6 * 60,
	);
	let (status, body) = send(app(), request).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
	assert_eq!(body["error_code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn missing_headers_and_tampered_bodies_are_rejected() {
	let unsigned = Request::builder()
		.method("POST")
		.uri(ALLOCATE_PATH)
		.body(Body::from(allocate_body("tenant-http", "req-1")))
		.expect("Unsigned request fixture should build.");
	let (status, _) = send(app(), unsigned).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);

	let authenticator = test_authenticator();
	let timestamp = now_secs();
	let signature = authenticator.sign(
		"POST",
		ALLOCATE_PATH,
		&allocate_body("tenant-http", "req-1"),
		timestamp,
	);
	let tampered = Request::builder()
		.method("POST")
		.uri(ALLOCATE_PATH)
		.header(TIMESTAMP_HEADER, timestamp.to_string())
		.header(SIGNATURE_HEADER, signature)
		.body(Body::from(allocate_body("tenant-http", "req-2")))
		.expect("Tampered request fixture should build.");
	let (status, _) = send(app(), tampered).await;

	assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_identifiers_map_to_field_codes() {
	let authenticator = test_authenticator();
	let request = signed_request(
		&authenticator,
		"POST",
		ALLOCATE_PATH,
		allocate_body("", "req-1"),
		now_secs(),
	);
	let (status, body) = send(app(), request).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "INVALID_TENANT_ID");

	let malformed = signed_request(
		&authenticator,
		"POST",
		USAGE_REPORT_PATH,
		br#"{"report_id":"r-1","bandwidth_used_bytes":"lots"}"#.to_vec(),
		now_secs(),
	);
	let (status, body) = send(app(), malformed).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "INVALID_REQUEST_BODY");
}

fn usage_body(overrides: Value) -> Vec<u8> {
	let mut body = json!({
		"report_id": "report-http-1",
		"dataplane_id": "dp-http",
		"tenant_id": "tenant-http",
		"period_id": "period-http",
		"bandwidth_used_bytes": 2_048,
		"transforms_used": 3,
		"reported_at": "2024-05-10T12:00:00Z",
	});

	if let (Some(body), Value::Object(overrides)) = (body.as_object_mut(), overrides) {
		for (key, value) in overrides {
			if value.is_null() {
				body.remove(&key);
			} else {
				body.insert(key, value);
			}
		}
	}

	serde_json::to_vec(&body).expect("Usage body fixture should serialize.")
}

#[tokio::test]
async fn usage_reports_reject_missing_or_empty_identifiers() {
	let authenticator = test_authenticator();
	let cases = [
		(json!({"report_id": ""}), "INVALID_REPORT_ID"),
		(json!({"tenant_id": null}), "INVALID_TENANT_ID"),
		(json!({"period_id": " period-http"}), "INVALID_PERIOD_ID"),
		(json!({"dataplane_id": "dp http"}), "INVALID_DATAPLANE_ID"),
	];

	for (overrides, code) in cases {
		let (state, store) = build_test_state();
		let request = signed_request(
			&authenticator,
			"POST",
			USAGE_REPORT_PATH,
			usage_body(overrides),
			now_secs(),
		);
		let (status, body) = send(server::router(state), request).await;

		assert_eq!(status, StatusCode::BAD_REQUEST, "{code} should be a client error.");
		assert_eq!(body["error_code"], code);
		assert!(store.periods().await.expect("Listing periods should succeed.").is_empty());
	}
}

#[tokio::test]
async fn unrepresentable_report_month_is_a_client_error() {
	let authenticator = test_authenticator();
	let (state, store) = build_test_state();
	let app = server::router(state);
	let request = signed_request(
		&authenticator,
		"POST",
		USAGE_REPORT_PATH,
		usage_body(json!({"reported_at": "9999-12-15T00:00:00Z"})),
		now_secs(),
	);
	let (status, body) = send(app.clone(), request).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(body["error_code"], "INVALID_REPORTED_AT");
	assert!(store.periods().await.expect("Listing periods should succeed.").is_empty());

	let request =
		signed_request(&authenticator, "POST", USAGE_REPORT_PATH, usage_body(json!({})), now_secs());

	assert_eq!(send(app.clone(), request).await.0, StatusCode::OK);

	let request = signed_request(
		&authenticator,
		"POST",
		USAGE_REPORT_PATH,
		usage_body(json!({"report_id": "report-http-2", "reported_at": "9999-12-15T00:00:00Z"})),
		now_secs(),
	);
	let (status, body) = send(app, request).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["total_bandwidth_bytes"], 4_096);
}

#[tokio::test]
async fn usage_reports_are_idempotent_and_visible_in_snapshots() {
	let app = app();
	let authenticator = test_authenticator();
	let report = usage_body(json!({}));

	for _ in 0..2 {
		let request = signed_request(
			&authenticator,
			"POST",
			USAGE_REPORT_PATH,
			report.clone(),
			now_secs(),
		);
		let (status, body) = send(app.clone(), request).await;

		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, json!({"accepted": true, "total_bandwidth_bytes": 2_048, "total_transforms": 3}));
	}

	let request =
		signed_request(&authenticator, "GET", POLICY_SNAPSHOT_PATH, Vec::new(), now_secs());
	let (status, body) = send(app, request).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["tenants"][0]["tenant_id"], "tenant-http");
	assert_eq!(body["tenants"][0]["current_period_id"], "period-http");
	assert_eq!(body["tenants"][0]["usage"]["bandwidth_consumed_bytes"], 2_048);
	assert!(body["snapshot_id"].is_string());
}

#[tokio::test]
async fn disabled_authentication_accepts_unsigned_requests() {
	let secret = SharedSecret::new(TEST_SECRET).expect("Test secret should be accepted.");
	let config = ServiceConfig::builder(secret)
		.auth_enabled(false)
		.build()
		.expect("Configuration should validate.");
	let store: Arc<dyn LedgerStore> = Arc::new(MemoryStore::default());
	let state = AppState::from_config(&config, store).expect("State should build.");
	let request = Request::builder()
		.method("GET")
		.uri(POLICY_SNAPSHOT_PATH)
		.body(Body::empty())
		.expect("Unsigned request fixture should build.");
	let (status, body) = send(server::router(state), request).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(body["tenants"], json!([]));
}
