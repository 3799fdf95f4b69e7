//! Two-dimensional spendable amounts and configured quota limits.

// self
use crate::_prelude::*;

/// Spendable quota along both leased dimensions (bandwidth bytes + transform count).
///
/// Used for consumption counters, leased totals, availability, and grants alike. All arithmetic
/// saturates so a corrupted counter can never wrap around into a huge availability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Budget {
	/// Bandwidth in bytes.
	pub bandwidth_bytes: u64,
	/// Transform operations.
	pub transforms: u64,
}
impl Budget {
	/// Budget with both dimensions set to zero.
	pub const ZERO: Self = Self { bandwidth_bytes: 0, transforms: 0 };

	/// Creates a budget from raw amounts.
	pub const fn new(bandwidth_bytes: u64, transforms: u64) -> Self {
		Self { bandwidth_bytes, transforms }
	}

	/// Adds both dimensions, saturating at `u64::MAX`.
	pub const fn saturating_add(self, other: Self) -> Self {
		Self {
			bandwidth_bytes: self.bandwidth_bytes.saturating_add(other.bandwidth_bytes),
			transforms: self.transforms.saturating_add(other.transforms),
		}
	}

	/// Subtracts both dimensions independently, flooring at zero.
	pub const fn saturating_sub(self, other: Self) -> Self {
		Self {
			bandwidth_bytes: self.bandwidth_bytes.saturating_sub(other.bandwidth_bytes),
			transforms: self.transforms.saturating_sub(other.transforms),
		}
	}

	/// Per-dimension minimum.
	pub fn min(self, other: Self) -> Self {
		Self {
			bandwidth_bytes: self.bandwidth_bytes.min(other.bandwidth_bytes),
			transforms: self.transforms.min(other.transforms),
		}
	}

	/// Returns `true` when both dimensions are zero.
	pub const fn is_zero(self) -> bool {
		self.bandwidth_bytes == 0 && self.transforms == 0
	}
}
impl std::iter::Sum for Budget {
	fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
		iter.fold(Self::ZERO, Self::saturating_add)
	}
}

/// Limits configured on a billing period.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
	/// Bandwidth limit in bytes.
	pub bandwidth_bytes: u64,
	/// Transform count limit.
	pub transforms: u64,
	/// Storage limit in bytes (published only; never leased).
	pub storage_bytes: u64,
}
impl QuotaLimits {
	/// Returns the leasable portion of the limits.
	pub const fn spendable(&self) -> Budget {
		Budget::new(self.bandwidth_bytes, self.transforms)
	}

	/// Returns a copy with the limit for `kind` replaced.
	pub const fn with_limit(mut self, kind: QuotaKind, limit: u64) -> Self {
		match kind {
			QuotaKind::Bandwidth => self.bandwidth_bytes = limit,
			QuotaKind::Transforms => self.transforms = limit,
			QuotaKind::Storage => self.storage_bytes = limit,
		}

		self
	}
}
impl Default for QuotaLimits {
	fn default() -> Self {
		Self {
			bandwidth_bytes: 100 * 1024 * 1024 * 1024,
			transforms: 1_000_000,
			storage_bytes: 50 * 1024 * 1024 * 1024,
		}
	}
}

/// Quota dimension targeted by a limit override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
	/// Bandwidth bytes.
	Bandwidth,
	/// Transform count.
	Transforms,
	/// Storage bytes.
	Storage,
}
impl QuotaKind {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			QuotaKind::Bandwidth => "bandwidth",
			QuotaKind::Transforms => "transforms",
			QuotaKind::Storage => "storage",
		}
	}
}
impl Display for QuotaKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
