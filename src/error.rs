//! Broker-level error types shared across the ledger, allocator, ingestor, and transports.

// self
use crate::{
	_prelude::*,
	ledger::{IdentifierError, PeriodId},
};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Caller supplied malformed input; nothing was mutated.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Temporary failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Concurrent allocations kept racing on the same lease slot.
	#[error("Allocation kept conflicting with concurrent allocations after {attempts} attempts.")]
	Conflict {
		/// Number of attempts made before giving up.
		attempts: u32,
	},
	/// The control plane rejected a signed inter-plane request.
	#[error("Control plane rejected the request with {status} ({error_code}).")]
	Rejected {
		/// HTTP status returned by the control plane.
		status: u16,
		/// Machine-readable error code returned by the control plane.
		error_code: String,
	},
}

/// Configuration and validation failures raised while assembling the service.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Shared secret is shorter than the required minimum.
	#[error("Shared secret must be at least {min} bytes, got {actual}.")]
	SecretTooShort {
		/// Minimum accepted length in bytes.
		min: usize,
		/// Supplied length in bytes.
		actual: usize,
	},
	/// Shared secret could not key the MAC.
	#[error("Shared secret cannot be used as an HMAC key.")]
	InvalidMacKey,
	/// A duration setting must be strictly positive.
	#[error("The {field} setting must be positive.")]
	NonPositiveDuration {
		/// Name of the offending setting.
		field: &'static str,
	},
	/// Request body limit must allow at least one byte.
	#[error("The request body limit must be greater than zero.")]
	ZeroBodyLimit,
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Control plane base URL cannot be joined with an endpoint path.
	#[error("Control plane URL is invalid.")]
	InvalidBaseUrl {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Listener could not be bound or served.
	#[error("Server I/O failure.")]
	Server(#[from] std::io::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Malformed caller input, rejected before any side effect.
#[derive(Debug, ThisError)]
pub enum ValidationError {
	/// A required identifier is missing, empty, or malformed.
	#[error("Field `{field}` is invalid: {source}")]
	InvalidField {
		/// Wire name of the offending field.
		field: &'static str,
		/// Underlying identifier failure.
		#[source]
		source: IdentifierError,
	},
	/// The request body is not valid JSON for the endpoint.
	#[error("Request body is malformed at `{path}`: {message}")]
	MalformedBody {
		/// JSON path of the failing element.
		path: String,
		/// Parser message.
		message: String,
	},
	/// A timestamp lies outside the range a billing period can cover.
	#[error("Field `{field}` lies outside the supported date range.")]
	OutOfRange {
		/// Wire name of the offending field.
		field: &'static str,
	},
	/// The referenced billing period exists but is owned by another tenant.
	#[error("Billing period {period} belongs to a different tenant.")]
	PeriodTenantMismatch {
		/// Offending period identifier.
		period: PeriodId,
	},
}
impl ValidationError {
	/// Returns the machine-readable error code reported to callers.
	pub fn code(&self) -> &'static str {
		match self {
			Self::InvalidField { field, .. } => match *field {
				"tenant_id" => "INVALID_TENANT_ID",
				"period_id" => "INVALID_PERIOD_ID",
				"dataplane_id" => "INVALID_DATAPLANE_ID",
				"request_id" => "INVALID_REQUEST_ID",
				"report_id" => "INVALID_REPORT_ID",
				_ => "INVALID_FIELD",
			},
			Self::MalformedBody { .. } => "INVALID_REQUEST_BODY",
			Self::OutOfRange { field: "reported_at" } => "INVALID_REPORTED_AT",
			Self::OutOfRange { .. } => "INVALID_FIELD",
			Self::PeriodTenantMismatch { .. } => "PERIOD_TENANT_MISMATCH",
		}
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Control plane responded with a payload that could not be parsed.
	#[error("Control plane returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the control plane.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the control plane.")]
	Io(#[from] std::io::Error),
	/// Outbound request body could not be encoded.
	#[error("Failed to encode the request body.")]
	Encode(#[from] serde_json::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for TransportError {
	fn from(e: reqwest::Error) -> Self {
		Self::network(e)
	}
}
