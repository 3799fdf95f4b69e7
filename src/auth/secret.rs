//! Pre-shared inter-plane secret that stays out of logs.

// self
use crate::{_prelude::*, error::ConfigError};

/// Redacted pre-shared secret keying the inter-plane HMAC.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);
impl SharedSecret {
	/// Minimum accepted secret length in bytes.
	pub const MIN_LEN: usize = 32;

	/// Wraps a secret after enforcing the minimum length.
	pub fn new(value: impl Into<String>) -> Result<Self, ConfigError> {
		let value = value.into();

		if value.len() < Self::MIN_LEN {
			return Err(ConfigError::SecretTooShort { min: Self::MIN_LEN, actual: value.len() });
		}

		Ok(Self(value))
	}

	/// Returns the raw secret. Callers must avoid logging this value.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for SharedSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SharedSecret").field(&"<redacted>").finish()
	}
}
impl Display for SharedSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
impl FromStr for SharedSecret {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
