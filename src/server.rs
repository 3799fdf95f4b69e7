//! HTTP surface of the broker: inter-plane routes, signature middleware, and the serve loop.

mod authn;

pub mod error;

pub use error::{ApiError, ErrorBody};

// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::{DefaultBodyLimit, State},
	middleware,
	routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
// self
use crate::{
	_prelude::*,
	allocator::{AllocationGrant, AllocationRequest, BudgetAllocator},
	auth::InterPlaneAuthenticator,
	config::ServiceConfig,
	contract::{self, ALLOCATE_PATH, AllocateBody, POLICY_SNAPSHOT_PATH, USAGE_REPORT_PATH, UsageReportBody},
	error::ConfigError,
	ingest::{IngestReceipt, UsageIngestor, UsageSubmission},
	snapshot::{PolicySnapshot, PolicySnapshotPublisher, StaticTenantDirectory, TenantDirectory},
	store::LedgerStore,
	sweeper::LeaseSweeper,
};

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Lease allocator.
	pub allocator: Arc<BudgetAllocator>,
	/// Usage ingestor.
	pub ingestor: Arc<UsageIngestor>,
	/// Snapshot publisher.
	pub publisher: Arc<PolicySnapshotPublisher>,
	/// Signature verifier; `None` when authentication is disabled.
	pub authenticator: Option<Arc<InterPlaneAuthenticator>>,
	/// Request body limit in bytes.
	pub max_body_bytes: usize,
	/// Per-request timeout.
	pub request_timeout: std::time::Duration,
}
impl AppState {
	/// Wires the broker components over `store` using the static tenant directory.
	pub fn from_config(
		config: &ServiceConfig,
		store: Arc<dyn LedgerStore>,
	) -> Result<Self, ConfigError> {
		let directory: Arc<dyn TenantDirectory> =
			Arc::new(StaticTenantDirectory::new(config.domains_limit));

		Self::with_directory(config, store, directory)
	}

	/// Wires the broker components over `store` and a custom tenant directory.
	pub fn with_directory(
		config: &ServiceConfig,
		store: Arc<dyn LedgerStore>,
		directory: Arc<dyn TenantDirectory>,
	) -> Result<Self, ConfigError> {
		let authenticator = if config.auth_enabled {
			Some(Arc::new(InterPlaneAuthenticator::new(
				config.shared_secret.clone(),
				config.timestamp_window,
			)?))
		} else {
			None
		};
		let request_timeout = std::time::Duration::try_from(config.request_timeout)
			.map_err(|_| ConfigError::NonPositiveDuration { field: "request_timeout" })?;

		Ok(Self {
			allocator: Arc::new(BudgetAllocator::new(
				store.clone(),
				config.lease_ttl,
				config.default_limits,
				config.max_conflict_retries,
			)),
			ingestor: Arc::new(UsageIngestor::new(store.clone(), config.default_limits)),
			publisher: Arc::new(PolicySnapshotPublisher::new(store, directory)),
			authenticator,
			max_body_bytes: config.max_body_bytes,
			request_timeout,
		})
	}
}

/// Builds the broker router.
pub fn router(state: AppState) -> Router {
	if state.authenticator.is_none() {
		tracing::warn!("Inter-plane authentication is disabled; use for local development only.");
	}

	Router::new()
		.route(ALLOCATE_PATH, post(allocate))
		.route(USAGE_REPORT_PATH, post(report_usage))
		.route(POLICY_SNAPSHOT_PATH, get(policy_snapshot))
		.route_layer(middleware::from_fn_with_state(state.clone(), authn::verify_signature))
		.layer(DefaultBodyLimit::max(state.max_body_bytes))
		.layer(TimeoutLayer::new(state.request_timeout))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Serves the broker until `shutdown` resolves, sweeping expired leases in the background.
pub async fn serve<F>(config: ServiceConfig, store: Arc<dyn LedgerStore>, shutdown: F) -> Result<()>
where
	F: 'static + Send + Future<Output = ()>,
{
	let state = AppState::from_config(&config, store.clone())?;
	let listener = TcpListener::bind(config.bind_addr).await.map_err(ConfigError::from)?;
	let sweeper = LeaseSweeper::new(store).spawn(config.sweep_interval);

	tracing::info!(addr = %config.bind_addr, "Quota broker listening.");

	let served = axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await;

	sweeper.abort();
	tracing::info!("Quota broker stopped.");

	served.map_err(ConfigError::from)?;

	Ok(())
}

async fn allocate(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<AllocationGrant>, ApiError> {
	let request = AllocationRequest::try_from(contract::decode::<AllocateBody>(&body)?)?;

	Ok(Json(state.allocator.allocate(request).await?))
}

async fn report_usage(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<IngestReceipt>, ApiError> {
	let submission = UsageSubmission::try_from(contract::decode::<UsageReportBody>(&body)?)?;

	Ok(Json(state.ingestor.ingest(submission).await?))
}

async fn policy_snapshot(State(state): State<AppState>) -> Result<Json<PolicySnapshot>, ApiError> {
	Ok(Json(state.publisher.snapshot().await?))
}
