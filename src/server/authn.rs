//! Signature-checking middleware for the inter-plane routes.

// crates.io
use axum::{
	body::{self, Body},
	extract::{Request, State},
	http::HeaderMap,
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	auth::{SIGNATURE_HEADER, SignedRequest, TIMESTAMP_HEADER},
	obs::{self, OperationKind, OperationOutcome},
	server::{AppState, error::ApiError},
};

/// Buffers the body, verifies the signature, and forwards the rebuilt request.
pub(crate) async fn verify_signature(
	State(state): State<AppState>,
	request: Request,
	next: Next,
) -> Response {
	let Some(authenticator) = state.authenticator.clone() else {
		return next.run(request).await;
	};
	let (parts, body) = request.into_parts();
	let bytes = match body::to_bytes(body, state.max_body_bytes).await {
		Ok(bytes) => bytes,
		Err(e) => {
			tracing::warn!(error = %e, path = parts.uri.path(), "Failed to buffer request body.");

			return ApiError::payload_too_large().into_response();
		},
	};
	let signed = SignedRequest {
		method: parts.method.as_str(),
		path: parts.uri.path(),
		body: &bytes,
		timestamp: header(&parts.headers, TIMESTAMP_HEADER),
		signature: header(&parts.headers, SIGNATURE_HEADER),
	};

	if let Err(reason) = authenticator.verify(&signed, OffsetDateTime::now_utc()) {
		tracing::warn!(
			%reason,
			method = %parts.method,
			path = parts.uri.path(),
			"Inter-plane authentication failed."
		);
		obs::record_operation_outcome(OperationKind::Authenticate, OperationOutcome::Failure);

		return ApiError::unauthorized().into_response();
	}

	obs::record_operation_outcome(OperationKind::Authenticate, OperationOutcome::Success);

	next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
	headers.get(name).and_then(|value| value.to_str().ok())
}
