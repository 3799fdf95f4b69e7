//! Inter-plane request authentication.
//!
//! Every inter-plane call carries `X-Timestamp` (Unix seconds) and `X-Signature`, the base64
//! HMAC-SHA256 of `METHOD|PATH|BODY|TIMESTAMP` keyed with the pre-shared secret. A request is
//! accepted iff its timestamp lies within the configured window of the verifier's clock and the
//! signature matches in constant time. Failure reasons are for logs only; callers always see a
//! uniform rejection.

pub mod secret;

pub use secret::SharedSecret;

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
// self
use crate::{_prelude::*, error::ConfigError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 signature.
pub const SIGNATURE_HEADER: &str = "x-signature";
/// Header carrying the Unix-seconds timestamp.
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
/// Default accepted clock skew between signer and verifier.
pub const DEFAULT_TIMESTAMP_WINDOW: Duration = Duration::seconds(300);

/// Reason a signed request was rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum AuthError {
	/// A required header is absent.
	#[error("Missing {header} header.")]
	MissingHeader {
		/// Header name.
		header: &'static str,
	},
	/// The timestamp header is not an integer.
	#[error("Timestamp header is not a Unix-seconds integer.")]
	MalformedTimestamp,
	/// The signature header is not valid base64.
	#[error("Signature header is not valid base64.")]
	MalformedSignature,
	/// The timestamp is outside the accepted window.
	#[error("Timestamp is {skew_secs}s away from the verifier clock.")]
	StaleTimestamp {
		/// Absolute distance between the timestamp and the verifier clock.
		skew_secs: u64,
	},
	/// The signature does not match the request.
	#[error("Signature mismatch.")]
	SignatureMismatch,
}

/// Borrowed view of the parts of an inbound request covered by the signature.
#[derive(Clone, Copy, Debug)]
pub struct SignedRequest<'a> {
	/// HTTP method.
	pub method: &'a str,
	/// Request path; any query string is ignored.
	pub path: &'a str,
	/// Raw body bytes.
	pub body: &'a [u8],
	/// Raw `X-Timestamp` header value.
	pub timestamp: Option<&'a str>,
	/// Raw `X-Signature` header value.
	pub signature: Option<&'a str>,
}

/// Signs and verifies inter-plane requests.
#[derive(Clone)]
pub struct InterPlaneAuthenticator {
	mac: HmacSha256,
	window: Duration,
}
impl InterPlaneAuthenticator {
	/// Keys the authenticator with `secret` and accepts timestamps within `window`.
	pub fn new(secret: SharedSecret, window: Duration) -> Result<Self, ConfigError> {
		if !window.is_positive() {
			return Err(ConfigError::NonPositiveDuration { field: "timestamp_window" });
		}

		let mac = HmacSha256::new_from_slice(secret.expose().as_bytes())
			.map_err(|_| ConfigError::InvalidMacKey)?;

		Ok(Self { mac, window })
	}

	/// Computes the base64 signature for a request.
	pub fn sign(&self, method: &str, path: &str, body: &[u8], timestamp: i64) -> String {
		STANDARD.encode(self.canonical_mac(method, path, body, timestamp).finalize().into_bytes())
	}

	/// Verifies `request` against the verifier clock `now`.
	pub fn verify(&self, request: &SignedRequest, now: OffsetDateTime) -> Result<(), AuthError> {
		let timestamp = request
			.timestamp
			.ok_or(AuthError::MissingHeader { header: TIMESTAMP_HEADER })?;
		let signature = request
			.signature
			.ok_or(AuthError::MissingHeader { header: SIGNATURE_HEADER })?;
		let timestamp =
			timestamp.trim().parse::<i64>().map_err(|_| AuthError::MalformedTimestamp)?;
		let skew_secs = now.unix_timestamp().abs_diff(timestamp);

		if skew_secs > self.window.whole_seconds().unsigned_abs() {
			return Err(AuthError::StaleTimestamp { skew_secs });
		}

		let signature =
			STANDARD.decode(signature.trim()).map_err(|_| AuthError::MalformedSignature)?;

		self.canonical_mac(request.method, request.path, request.body, timestamp)
			.verify_slice(&signature)
			.map_err(|_| AuthError::SignatureMismatch)
	}

	fn canonical_mac(&self, method: &str, path: &str, body: &[u8], timestamp: i64) -> HmacSha256 {
		let path = path.split_once('?').map_or(path, |(path, _)| path);
		let mut mac = self.mac.clone();

		mac.update(method.to_ascii_uppercase().as_bytes());
		mac.update(b"|");
		mac.update(path.as_bytes());
		mac.update(b"|");
		mac.update(body);
		mac.update(b"|");
		mac.update(timestamp.to_string().as_bytes());

		mac
	}
}
impl Debug for InterPlaneAuthenticator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InterPlaneAuthenticator")
			.field("key", &"<redacted>")
			.field("window", &self.window)
			.finish()
	}
}
