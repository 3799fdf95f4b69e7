//! Control-plane quota authority: billing-period ledgers, TTL-bounded budget leases, idempotent
//! usage ingestion, and signed policy snapshots for distributed data planes.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod allocator;
pub mod auth;
#[cfg(feature = "reqwest")]
pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod obs;
pub mod server;
pub mod snapshot;
pub mod store;
pub mod sweeper;
#[cfg(any(test, feature = "test"))]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixtures shared by unit and integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{InterPlaneAuthenticator, SharedSecret},
		config::ServiceConfig,
		ledger::{BillingPeriod, PeriodId, QuotaLimits, TenantId},
		server::AppState,
		store::{LedgerStore, MemoryStore},
	};

	/// Shared secret used by every test fixture.
	pub const TEST_SECRET: &str = "test-shared-secret-0123456789-abcdef";

	/// Builds a [`ServiceConfig`] suitable for tests (small limits, default windows).
	pub fn test_config() -> ServiceConfig {
		let secret = SharedSecret::new(TEST_SECRET).expect("Test secret should satisfy the length rule.");

		ServiceConfig::builder(secret).build().expect("Test configuration should be valid.")
	}

	/// Builds an authenticator keyed with [`TEST_SECRET`].
	pub fn test_authenticator() -> InterPlaneAuthenticator {
		let secret = SharedSecret::new(TEST_SECRET).expect("Test secret should satisfy the length rule.");

		InterPlaneAuthenticator::new(secret, Duration::minutes(5))
			.expect("Test authenticator should build successfully.")
	}

	/// Builds application state backed by a fresh in-memory store.
	pub fn build_test_state() -> (AppState, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn LedgerStore> = store_backend.clone();
		let state = AppState::from_config(&test_config(), store)
			.expect("Test application state should build successfully.");

		(state, store_backend)
	}

	/// Builds a billing period spanning `[starts_at, ends_at)` with the provided limits.
	pub fn period_fixture(
		tenant: &str,
		period: &str,
		starts_at: OffsetDateTime,
		ends_at: OffsetDateTime,
		limits: QuotaLimits,
	) -> BillingPeriod {
		let tenant = TenantId::new(tenant).expect("Tenant fixture should be valid.");
		let period = PeriodId::new(period).expect("Period fixture should be valid.");

		BillingPeriod::new(tenant, period, starts_at, ends_at, limits, starts_at)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, HashSet},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use uuid::Uuid;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(feature = "cli")] use {clap as _, color_eyre as _, tracing_subscriber as _};
#[cfg(test)] use {http_body_util as _, httpmock as _, tower as _};
