//! Data plane side of the inter-plane protocol.
//!
//! [`ControlPlaneClient`] signs and sends allocation, usage, and snapshot calls. [`LocalBudget`]
//! tracks how much of the current lease a data plane has spent and when to ask for a new one.

mod budget;

pub use budget::LocalBudget;

// crates.io
use reqwest::{Client as ReqwestClient, Method, header::CONTENT_TYPE, redirect::Policy};
use url::Url;
// self
use crate::{
	_prelude::*,
	allocator::{AllocationGrant, AllocationRequest},
	auth::{InterPlaneAuthenticator, SIGNATURE_HEADER, TIMESTAMP_HEADER},
	contract::{ALLOCATE_PATH, AllocateBody, POLICY_SNAPSHOT_PATH, USAGE_REPORT_PATH, UsageReportBody},
	error::{ConfigError, TransientError, TransportError},
	ingest::{IngestReceipt, UsageSubmission},
	server::ErrorBody,
	snapshot::PolicySnapshot,
};

const DEFAULT_CLIENT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Signed HTTP client for the control plane's inter-plane endpoints.
#[derive(Clone, Debug)]
pub struct ControlPlaneClient {
	http: ReqwestClient,
	base_url: Url,
	authenticator: Arc<InterPlaneAuthenticator>,
}
impl ControlPlaneClient {
	/// Builds a client with a dedicated reqwest instance (no redirects, 30 s timeout).
	pub fn new(base_url: Url, authenticator: Arc<InterPlaneAuthenticator>) -> Result<Self, ConfigError> {
		let http = ReqwestClient::builder()
			.redirect(Policy::none())
			.timeout(DEFAULT_CLIENT_TIMEOUT)
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self::with_client(http, base_url, authenticator))
	}

	/// Wraps an existing reqwest client.
	pub fn with_client(
		http: ReqwestClient,
		base_url: Url,
		authenticator: Arc<InterPlaneAuthenticator>,
	) -> Self {
		Self { http, base_url, authenticator }
	}

	/// Requests a budget lease.
	pub async fn allocate(&self, request: &AllocationRequest) -> Result<AllocationGrant> {
		let body = serde_json::to_vec(&AllocateBody::from(request)).map_err(TransportError::from)?;

		self.send(Method::POST, ALLOCATE_PATH, body).await
	}

	/// Pushes a usage delta.
	pub async fn report_usage(&self, submission: &UsageSubmission) -> Result<IngestReceipt> {
		let body =
			serde_json::to_vec(&UsageReportBody::from(submission)).map_err(TransportError::from)?;

		self.send(Method::POST, USAGE_REPORT_PATH, body).await
	}

	/// Fetches the current policy snapshot.
	pub async fn policy_snapshot(&self) -> Result<PolicySnapshot> {
		self.send(Method::GET, POLICY_SNAPSHOT_PATH, Vec::new()).await
	}

	async fn send<T>(&self, method: Method, path: &str, body: Vec<u8>) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let url = self
			.base_url
			.join(path)
			.map_err(|source| ConfigError::InvalidBaseUrl { source })?;
		let timestamp = OffsetDateTime::now_utc().unix_timestamp();
		let signature = self.authenticator.sign(method.as_str(), url.path(), &body, timestamp);
		let mut builder = self
			.http
			.request(method, url)
			.header(TIMESTAMP_HEADER, timestamp.to_string())
			.header(SIGNATURE_HEADER, signature);

		if !body.is_empty() {
			builder = builder.header(CONTENT_TYPE, "application/json").body(body);
		}

		let response = builder.send().await.map_err(TransportError::from)?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(TransportError::from)?;

		if !status.is_success() {
			let error_code = serde_json::from_slice::<ErrorBody>(&bytes)
				.map(|body| body.error_code)
				.unwrap_or_else(|_| format!("HTTP_{}", status.as_u16()));

			tracing::warn!(status = status.as_u16(), %error_code, path, "Control plane rejected the request.");

			return Err(Error::Rejected { status: status.as_u16(), error_code });
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
			TransientError::ResponseParse { source, status: Some(status.as_u16()) }.into()
		})
	}
}
