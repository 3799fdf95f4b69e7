//! Typed ledger identifiers.
//!
//! Identifiers come in two families with different rules:
//!
//! - names ([`TenantId`], [`DataplaneId`]) are assigned by operators and may hold any printable text
//!   without whitespace;
//! - keys ([`PeriodId`], [`RequestId`], [`ReportId`]) are minted by data planes, usually as UUIDs,
//!   and must stay inside a URL-safe ASCII alphabet so they can travel in paths and log fields.

// self
use crate::_prelude::*;

/// Longest accepted name, in characters.
pub const NAME_MAX_CHARS: usize = 128;
/// Longest accepted key, in bytes.
pub const KEY_MAX_BYTES: usize = 64;

/// Identifier family and the rule it is validated with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdRule {
	/// Printable characters other than whitespace, at most [`NAME_MAX_CHARS`].
	Name,
	/// ASCII letters, digits, and `-_.:`, at most [`KEY_MAX_BYTES`].
	Key,
}
impl IdRule {
	fn check(self, kind: &'static str, value: &str) -> Result<(), IdentifierError> {
		if value.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}

		let (len, max) = match self {
			Self::Name => (value.chars().count(), NAME_MAX_CHARS),
			Self::Key => (value.len(), KEY_MAX_BYTES),
		};

		if len > max {
			return Err(IdentifierError::TooLong { kind, max });
		}

		match value.char_indices().find(|&(_, c)| !self.admits(c)) {
			Some((offset, found)) => Err(IdentifierError::InvalidCharacter { kind, found, offset }),
			None => Ok(()),
		}
	}

	fn admits(self, c: char) -> bool {
		match self {
			Self::Name => !c.is_whitespace() && !c.is_control(),
			Self::Key => c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'),
		}
	}
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Identifier kind.
		kind: &'static str,
	},
	/// The identifier is longer than its family allows.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Identifier kind.
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
	/// The identifier holds a character its family does not admit.
	#[error("{kind} identifier contains {found:?} at byte {offset}.")]
	InvalidCharacter {
		/// Identifier kind.
		kind: &'static str,
		/// First rejected character.
		found: char,
		/// Byte offset of `found`.
		offset: usize,
	},
}

macro_rules! ledger_id {
	($(#[$meta:meta])* $name:ident, $kind:literal, $rule:expr) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validation rule of this identifier.
			pub const RULE: IdRule = $rule;

			/// Validates and wraps `value`.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				Self::try_from(value.into())
			}

			/// Borrows the raw identifier.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				Self::RULE.check($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", stringify!($name), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
	};
}

ledger_id! {
	/// Tenant account name.
	TenantId, "Tenant", IdRule::Name
}
ledger_id! {
	/// Regional data plane name (e.g. `eu-central1-a`).
	DataplaneId, "Dataplane", IdRule::Name
}
ledger_id! {
	/// Billing period key; never the human `YYYY-MM` label.
	PeriodId, "Period", IdRule::Key
}
ledger_id! {
	/// Idempotency key of a lease allocation.
	RequestId, "Request", IdRule::Key
}
ledger_id! {
	/// Idempotency key of a usage report.
	ReportId, "Report", IdRule::Key
}
