//! Mapping of broker failures onto HTTP responses.

// crates.io
use axum::{
	Json,
	http::StatusCode,
	response::{IntoResponse, Response},
};
// self
use crate::{_prelude::*, error::ValidationError};

/// JSON error document returned by every endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Machine-readable error code.
	pub error_code: String,
	/// Human-readable message.
	pub message: String,
	/// Correlation id also present in the server logs.
	pub trace_id: Uuid,
	/// Instant the error was produced.
	#[serde(with = "time::serde::rfc3339")]
	pub timestamp: OffsetDateTime,
}

/// HTTP-facing error.
#[derive(Clone, Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl ApiError {
	/// Uniform authentication failure; the reason is never disclosed.
	pub fn unauthorized() -> Self {
		Self {
			status: StatusCode::UNAUTHORIZED,
			error_code: "UNAUTHORIZED",
			message: "Request authentication failed.".into(),
		}
	}

	/// Body exceeded the configured limit or could not be read.
	pub fn payload_too_large() -> Self {
		Self {
			status: StatusCode::PAYLOAD_TOO_LARGE,
			error_code: "PAYLOAD_TOO_LARGE",
			message: "Request body exceeds the configured limit.".into(),
		}
	}

	/// HTTP status of the response.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	/// Machine-readable error code.
	pub fn error_code(&self) -> &'static str {
		self.error_code
	}
}
impl From<ValidationError> for ApiError {
	fn from(e: ValidationError) -> Self {
		Self { status: StatusCode::BAD_REQUEST, error_code: e.code(), message: e.to_string() }
	}
}
impl From<Error> for ApiError {
	fn from(e: Error) -> Self {
		match e {
			Error::Validation(e) => e.into(),
			Error::Conflict { .. } => Self {
				status: StatusCode::CONFLICT,
				error_code: "ALLOCATION_CONFLICT",
				message: e.to_string(),
			},
			e => {
				tracing::error!(error = %e, "Request failed with an internal error.");

				Self {
					status: StatusCode::INTERNAL_SERVER_ERROR,
					error_code: "INTERNAL_ERROR",
					message: "An internal error occurred.".into(),
				}
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody {
			error_code: self.error_code.into(),
			message: self.message,
			trace_id: Uuid::new_v4(),
			timestamp: OffsetDateTime::now_utc(),
		};

		tracing::warn!(
			trace_id = %body.trace_id,
			status = self.status.as_u16(),
			error_code = %body.error_code,
			message = %body.message,
			"Request rejected."
		);

		(self.status, Json(body)).into_response()
	}
}
