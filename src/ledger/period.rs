//! Billing periods: the per-tenant window that owns limits and consumption counters.

// crates.io
use time::{Date, UtcOffset, util};
// self
use crate::{
	_prelude::*,
	ledger::{
		budget::{Budget, QuotaKind, QuotaLimits},
		id::{PeriodId, TenantId},
	},
};

/// Per-tenant billing window with limits and monotonically growing consumption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
	/// Opaque period identifier (primary key).
	pub period_id: PeriodId,
	/// Owning tenant.
	pub tenant_id: TenantId,
	/// Human-readable `YYYY-MM` label used for reporting only.
	pub period_key: String,
	/// Inclusive start of the window.
	#[serde(with = "time::serde::rfc3339")]
	pub starts_at: OffsetDateTime,
	/// Exclusive end of the window.
	#[serde(with = "time::serde::rfc3339")]
	pub ends_at: OffsetDateTime,
	/// Configured limits.
	pub limits: QuotaLimits,
	/// Consumption reported by data planes so far.
	pub consumed: Budget,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl BillingPeriod {
	/// Creates a period with zero consumption spanning `[starts_at, ends_at)`.
	pub fn new(
		tenant_id: TenantId,
		period_id: PeriodId,
		starts_at: OffsetDateTime,
		ends_at: OffsetDateTime,
		limits: QuotaLimits,
		created_at: OffsetDateTime,
	) -> Self {
		let period_key = month_key(starts_at.to_offset(UtcOffset::UTC).date());

		Self {
			period_id,
			tenant_id,
			period_key,
			starts_at,
			ends_at,
			limits,
			consumed: Budget::ZERO,
			created_at,
		}
	}

	/// Creates the UTC calendar month containing `instant`.
	///
	/// Returns `None` when the month or its successor falls outside the representable date range.
	pub fn calendar_month(
		tenant_id: TenantId,
		period_id: PeriodId,
		instant: OffsetDateTime,
		limits: QuotaLimits,
		created_at: OffsetDateTime,
	) -> Option<Self> {
		let (starts_at, ends_at) = month_bounds(instant)?;

		Some(Self::new(tenant_id, period_id, starts_at, ends_at, limits, created_at))
	}

	/// Returns `true` when `instant` falls inside `[starts_at, ends_at)`.
	pub fn contains(&self, instant: OffsetDateTime) -> bool {
		self.starts_at <= instant && instant < self.ends_at
	}

	/// Spendable headroom once consumption and outstanding leases are subtracted.
	pub fn available(&self, leased: Budget) -> Budget {
		self.limits.spendable().saturating_sub(self.consumed).saturating_sub(leased)
	}

	/// Adds a usage delta to the consumption counters.
	pub fn record_consumption(&mut self, delta: Budget) {
		self.consumed = self.consumed.saturating_add(delta);
	}

	/// Replaces a single limit.
	pub fn apply_override(&mut self, kind: QuotaKind, limit: u64) {
		self.limits = self.limits.with_limit(kind, limit);
	}
}

/// Returns the `[start, end)` bounds of the UTC calendar month containing `instant`.
///
/// December of the last representable year has no exclusive end and yields `None`.
pub fn month_bounds(instant: OffsetDateTime) -> Option<(OffsetDateTime, OffsetDateTime)> {
	let date = instant.checked_to_offset(UtcOffset::UTC)?.date();
	let first = date.replace_day(1).ok()?;
	let next = first.checked_add(Duration::days(i64::from(util::days_in_year_month(
		first.year(),
		first.month(),
	))))?;

	Some((first.midnight().assume_utc(), next.midnight().assume_utc()))
}

fn month_key(date: Date) -> String {
	format!("{:04}-{:02}", date.year(), u8::from(date.month()))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn tenant() -> TenantId {
		TenantId::new("tenant-1").expect("Tenant fixture should be valid.")
	}

	fn period_id() -> PeriodId {
		PeriodId::new("period-1").expect("Period fixture should be valid.")
	}

	#[test]
	fn calendar_month_covers_whole_month() {
		let now = datetime!(2024-02-17 13:45 UTC);
		let period =
			BillingPeriod::calendar_month(tenant(), period_id(), now, QuotaLimits::default(), now)
				.expect("February 2024 should have bounds.");

		assert_eq!(period.starts_at, datetime!(2024-02-01 0:00 UTC));
		assert_eq!(period.ends_at, datetime!(2024-03-01 0:00 UTC));
		assert_eq!(period.period_key, "2024-02");
		assert_eq!(period.consumed, Budget::ZERO);
	}

	#[test]
	fn calendar_month_normalizes_offsets_to_utc() {
		let instant = datetime!(2024-01-01 01:30 +03:00);
		let (start, end) = month_bounds(instant).expect("December 2023 should have bounds.");

		assert_eq!(start, datetime!(2023-12-01 0:00 UTC));
		assert_eq!(end, datetime!(2024-01-01 0:00 UTC));
	}

	#[test]
	fn last_representable_month_has_no_bounds() {
		assert_eq!(month_bounds(datetime!(9999-12-15 0:00 UTC)), None);
		assert_eq!(month_bounds(datetime!(9999-12-31 23:30 -01:00)), None);

		let (start, end) =
			month_bounds(datetime!(9999-11-30 12:00 UTC)).expect("November 9999 should have bounds.");

		assert_eq!(start, datetime!(9999-11-01 0:00 UTC));
		assert_eq!(end, datetime!(9999-12-01 0:00 UTC));
	}

	#[test]
	fn interval_is_half_open() {
		let period = BillingPeriod::new(
			tenant(),
			period_id(),
			datetime!(2024-03-01 0:00 UTC),
			datetime!(2024-04-01 0:00 UTC),
			QuotaLimits::default(),
			datetime!(2024-03-01 0:00 UTC),
		);

		assert!(period.contains(datetime!(2024-03-01 0:00 UTC)));
		assert!(period.contains(datetime!(2024-03-31 23:59:59 UTC)));
		assert!(!period.contains(datetime!(2024-04-01 0:00 UTC)));
	}

	#[test]
	fn availability_subtracts_consumption_and_leases() {
		let limits = QuotaLimits { bandwidth_bytes: 1_000, transforms: 1_000, storage_bytes: 1 };
		let mut period = BillingPeriod::calendar_month(
			tenant(),
			period_id(),
			datetime!(2024-05-10 0:00 UTC),
			limits,
			datetime!(2024-05-10 0:00 UTC),
		)
		.expect("May 2024 should have bounds.");

		period.record_consumption(Budget::new(200, 200));

		assert_eq!(period.available(Budget::new(300, 300)), Budget::new(500, 500));
		assert_eq!(period.available(Budget::new(900, 0)), Budget::new(0, 800));

		period.apply_override(QuotaKind::Bandwidth, 5_000);

		assert_eq!(period.available(Budget::new(300, 300)).bandwidth_bytes, 4_500);
	}
}
