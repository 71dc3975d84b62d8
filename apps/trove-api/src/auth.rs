use axum::{
	extract::{Request, State},
	http::HeaderMap,
	middleware::Next,
	response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use crate::{
	routes::{ApiError, unauthorized},
	state::AppState,
};

const HEADER_AUTHORIZATION: &str = "Authorization";

/// Bearer-token payload. The organization id is always taken from here;
/// organization ids in request bodies or paths are never trusted.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthClaims {
	pub sub: String,
	pub org_id: uuid::Uuid,
	pub exp: usize,
}

/// Caller identity attached to every authenticated request.
#[derive(Debug, Clone, Copy)]
pub struct OrgContext {
	pub organization_id: uuid::Uuid,
}

pub async fn require_bearer(
	State(state): State<AppState>,
	mut req: Request,
	next: Next,
) -> Result<Response, ApiError> {
	let secret = state.service.cfg.security.jwt_secret.as_str();
	let Some(context) = authenticate(req.headers(), secret) else {
		return Err(unauthorized());
	};

	req.extensions_mut().insert(context);

	Ok(next.run(req).await)
}

fn authenticate(headers: &HeaderMap, secret: &str) -> Option<OrgContext> {
	let token = read_bearer_token(headers)?;
	let decoded = decode::<AuthClaims>(
		token,
		&DecodingKey::from_secret(secret.as_bytes()),
		&Validation::new(Algorithm::HS256),
	)
	.ok()?;

	Some(OrgContext { organization_id: decoded.claims.org_id })
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(HEADER_AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}
