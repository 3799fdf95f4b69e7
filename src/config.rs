//! Service configuration assembled through a validating builder.

// std
use std::{
	net::{Ipv4Addr, SocketAddr},
	path::PathBuf,
};
// self
use crate::{
	_prelude::*,
	auth::{DEFAULT_TIMESTAMP_WINDOW, SharedSecret},
	error::ConfigError,
	ledger::QuotaLimits,
};

/// Default lease lifetime.
pub const DEFAULT_LEASE_TTL: Duration = Duration::minutes(5);
/// Default bound on allocation retries after a compare-and-swap conflict.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;
/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(30);
/// Default request body limit in bytes.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default interval between lease sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::seconds(60);
/// Default number of domains published per tenant.
pub const DEFAULT_DOMAINS_LIMIT: u32 = 10;

/// Validated runtime configuration for the quota broker.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
	/// Listen address.
	pub bind_addr: SocketAddr,
	/// Inter-plane pre-shared secret.
	pub shared_secret: SharedSecret,
	/// Whether inter-plane signatures are enforced.
	pub auth_enabled: bool,
	/// Accepted clock skew for signed requests.
	pub timestamp_window: Duration,
	/// Lease lifetime.
	pub lease_ttl: Duration,
	/// Limits applied to lazily created billing periods.
	pub default_limits: QuotaLimits,
	/// Retries after a lease compare-and-swap conflict.
	pub max_conflict_retries: u32,
	/// Per-request timeout.
	pub request_timeout: Duration,
	/// Request body limit in bytes.
	pub max_body_bytes: usize,
	/// Interval between lease sweeps.
	pub sweep_interval: Duration,
	/// Snapshot file for the file-backed store; `None` keeps the ledger in memory.
	pub store_path: Option<PathBuf>,
	/// Domains limit published for every tenant.
	pub domains_limit: u32,
}
impl ServiceConfig {
	/// Returns a builder seeded with defaults and the mandatory shared secret.
	pub fn builder(shared_secret: SharedSecret) -> ServiceConfigBuilder {
		ServiceConfigBuilder::new(shared_secret)
	}
}

/// Builder for [`ServiceConfig`].
#[derive(Clone, Debug)]
pub struct ServiceConfigBuilder {
	config: ServiceConfig,
}
impl ServiceConfigBuilder {
	fn new(shared_secret: SharedSecret) -> Self {
		Self {
			config: ServiceConfig {
				bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
				shared_secret,
				auth_enabled: true,
				timestamp_window: DEFAULT_TIMESTAMP_WINDOW,
				lease_ttl: DEFAULT_LEASE_TTL,
				default_limits: QuotaLimits::default(),
				max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
				request_timeout: DEFAULT_REQUEST_TIMEOUT,
				max_body_bytes: DEFAULT_MAX_BODY_BYTES,
				sweep_interval: DEFAULT_SWEEP_INTERVAL,
				store_path: None,
				domains_limit: DEFAULT_DOMAINS_LIMIT,
			},
		}
	}

	/// Sets the listen address.
	pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
		self.config.bind_addr = addr;

		self
	}

	/// Enables or disables signature enforcement (local development only).
	pub fn auth_enabled(mut self, enabled: bool) -> Self {
		self.config.auth_enabled = enabled;

		self
	}

	/// Sets the accepted clock skew.
	pub fn timestamp_window(mut self, window: Duration) -> Self {
		self.config.timestamp_window = window;

		self
	}

	/// Sets the lease lifetime.
	pub fn lease_ttl(mut self, ttl: Duration) -> Self {
		self.config.lease_ttl = ttl;

		self
	}

	/// Sets the limits used for lazily created periods.
	pub fn default_limits(mut self, limits: QuotaLimits) -> Self {
		self.config.default_limits = limits;

		self
	}

	/// Sets the conflict retry bound.
	pub fn max_conflict_retries(mut self, retries: u32) -> Self {
		self.config.max_conflict_retries = retries;

		self
	}

	/// Sets the per-request timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.config.request_timeout = timeout;

		self
	}

	/// Sets the request body limit.
	pub fn max_body_bytes(mut self, limit: usize) -> Self {
		self.config.max_body_bytes = limit;

		self
	}

	/// Sets the sweep interval.
	pub fn sweep_interval(mut self, interval: Duration) -> Self {
		self.config.sweep_interval = interval;

		self
	}

	/// Persists the ledger to `path` instead of keeping it in memory.
	pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.config.store_path = Some(path.into());

		self
	}

	/// Sets the published domains limit.
	pub fn domains_limit(mut self, limit: u32) -> Self {
		self.config.domains_limit = limit;

		self
	}

	/// Validates the settings and produces a [`ServiceConfig`].
	pub fn build(self) -> Result<ServiceConfig, ConfigError> {
		let config = self.config;

		for (field, value) in [
			("timestamp_window", config.timestamp_window),
			("lease_ttl", config.lease_ttl),
			("request_timeout", config.request_timeout),
			("sweep_interval", config.sweep_interval),
		] {
			if !value.is_positive() {
				return Err(ConfigError::NonPositiveDuration { field });
			}
		}

		if config.max_body_bytes == 0 {
			return Err(ConfigError::ZeroBodyLimit);
		}

		Ok(config)
	}
}
