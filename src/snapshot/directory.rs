//! Tenant metadata seam consulted while materializing snapshots.

// self
use crate::{_prelude::*, ledger::TenantId};

/// Tenant status published when the directory has no better answer.
pub const DEFAULT_TENANT_STATUS: &str = "active";
/// Plan code published when the directory has no better answer.
pub const DEFAULT_PLAN_CODE: &str = "free";

/// Domain published for a tenant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEntry {
	/// Fully qualified domain name.
	pub domain: String,
	/// Whether ownership has been verified.
	pub verified: bool,
}

/// API key published for a tenant; only the hash leaves the control plane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyEntry {
	/// Human-readable key name.
	pub name: String,
	/// Hash of the key material.
	pub key_hash: String,
}

/// Tenant metadata attached to each snapshot record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantProfile {
	/// Lifecycle status label.
	pub status: String,
	/// Plan code label.
	pub plan_code: String,
	/// Maximum number of domains.
	pub domains_limit: u32,
	/// Registered domains.
	pub domains: Vec<DomainEntry>,
	/// Registered API keys.
	pub api_keys: Vec<ApiKeyEntry>,
}

/// Source of tenant metadata. Tenant management lives outside the broker; implementations adapt
/// whatever system owns it.
pub trait TenantDirectory
where
	Self: Send + Sync,
{
	/// Returns the profile published for `tenant_id`.
	fn profile(&self, tenant_id: &TenantId) -> TenantProfile;
}

/// Directory that publishes the same profile for every tenant.
#[derive(Clone, Debug)]
pub struct StaticTenantDirectory {
	domains_limit: u32,
}
impl StaticTenantDirectory {
	/// Creates a directory publishing `domains_limit` and otherwise default metadata.
	pub fn new(domains_limit: u32) -> Self {
		Self { domains_limit }
	}
}
impl TenantDirectory for StaticTenantDirectory {
	fn profile(&self, _: &TenantId) -> TenantProfile {
		TenantProfile {
			status: DEFAULT_TENANT_STATUS.into(),
			plan_code: DEFAULT_PLAN_CODE.into(),
			domains_limit: self.domains_limit,
			domains: Vec::new(),
			api_keys: Vec::new(),
		}
	}
}
