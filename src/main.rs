//! Quota broker service entry point.

// std
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
// crates.io
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use time::Duration;
use tracing_subscriber::EnvFilter;
// self
use quota_broker::{
	auth::SharedSecret,
	config::ServiceConfig,
	ledger::QuotaLimits,
	server,
	store::{FileStore, LedgerStore, MemoryStore},
};

/// Control-plane quota authority for distributed data planes.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// Listen address.
	#[arg(long, env = "QUOTA_BROKER_BIND", default_value = "127.0.0.1:8080")]
	bind: SocketAddr,
	/// Inter-plane pre-shared secret (at least 32 bytes).
	#[arg(long, env = "QUOTA_BROKER_SHARED_SECRET", hide_env_values = true)]
	shared_secret: SharedSecret,
	/// Skip signature verification (local development only).
	#[arg(long, env = "QUOTA_BROKER_DISABLE_AUTH")]
	disable_auth: bool,
	/// Accepted clock skew for signed requests, in seconds.
	#[arg(long, env = "QUOTA_BROKER_TIMESTAMP_WINDOW_SECS", default_value_t = 300)]
	timestamp_window_secs: i64,
	/// Lease lifetime, in seconds.
	#[arg(long, env = "QUOTA_BROKER_LEASE_TTL_SECS", default_value_t = 300)]
	lease_ttl_secs: i64,
	/// Interval between expired-lease sweeps, in seconds.
	#[arg(long, env = "QUOTA_BROKER_SWEEP_INTERVAL_SECS", default_value_t = 60)]
	sweep_interval_secs: i64,
	/// Retries after a concurrent allocation moved the lease slot.
	#[arg(long, env = "QUOTA_BROKER_MAX_CONFLICT_RETRIES", default_value_t = 3)]
	max_conflict_retries: u32,
	/// Bandwidth limit for lazily created periods, in bytes.
	#[arg(long, env = "QUOTA_BROKER_DEFAULT_BANDWIDTH_BYTES")]
	default_bandwidth_bytes: Option<u64>,
	/// Transform limit for lazily created periods.
	#[arg(long, env = "QUOTA_BROKER_DEFAULT_TRANSFORMS")]
	default_transforms: Option<u64>,
	/// Per-request timeout, in seconds.
	#[arg(long, env = "QUOTA_BROKER_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
	request_timeout_secs: i64,
	/// Request body limit, in bytes.
	#[arg(long, env = "QUOTA_BROKER_MAX_BODY_BYTES", default_value_t = 1024 * 1024)]
	max_body_bytes: usize,
	/// Domains limit published in policy snapshots.
	#[arg(long, env = "QUOTA_BROKER_DOMAINS_LIMIT", default_value_t = 10)]
	domains_limit: u32,
	/// Ledger snapshot file; the ledger stays in memory when omitted.
	#[arg(long, env = "QUOTA_BROKER_STORE_PATH")]
	store_path: Option<PathBuf>,
}
impl Cli {
	fn into_config(self) -> Result<ServiceConfig> {
		let mut limits = QuotaLimits::default();

		if let Some(bandwidth) = self.default_bandwidth_bytes {
			limits.bandwidth_bytes = bandwidth;
		}
		if let Some(transforms) = self.default_transforms {
			limits.transforms = transforms;
		}

		let mut builder = ServiceConfig::builder(self.shared_secret)
			.bind_addr(self.bind)
			.auth_enabled(!self.disable_auth)
			.timestamp_window(Duration::seconds(self.timestamp_window_secs))
			.lease_ttl(Duration::seconds(self.lease_ttl_secs))
			.sweep_interval(Duration::seconds(self.sweep_interval_secs))
			.max_conflict_retries(self.max_conflict_retries)
			.request_timeout(Duration::seconds(self.request_timeout_secs))
			.max_body_bytes(self.max_body_bytes)
			.domains_limit(self.domains_limit)
			.default_limits(limits);

		if let Some(path) = self.store_path {
			builder = builder.store_path(path);
		}

		builder.build().wrap_err("Invalid quota broker configuration.")
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let config = Cli::parse().into_config()?;
	let store: Arc<dyn LedgerStore> = match &config.store_path {
		Some(path) => {
			tracing::info!(path = %path.display(), "Using file-backed ledger store.");

			Arc::new(FileStore::open(path).wrap_err("Failed to open the ledger store.")?)
		},
		None => {
			tracing::warn!("Using in-memory ledger store; state is lost on restart.");

			Arc::new(MemoryStore::default())
		},
	};

	server::serve(config, store, async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "Failed to listen for the shutdown signal.");
		}
	})
	.await
	.wrap_err("Quota broker stopped with an error.")
}
