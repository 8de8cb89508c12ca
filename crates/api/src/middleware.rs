//! Session-token middleware.
//!
//! Accepts the token from `Authorization: Bearer <token>` or, as the web
//! client sends it, from a `jwt` cookie. On success the decoded [`Principal`]
//! is attached as a request extension for guards and handlers downstream.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use mesa_auth::{Principal, TokenCodec};

use crate::errors::ApiError;

#[derive(Clone)]
pub struct AuthState {
    pub codec: Arc<dyn TokenCodec>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers())
        .ok_or_else(|| ApiError::unauthorized("authentication required"))?;

    let claims = state
        .codec
        .decode(&token, Utc::now())
        .map_err(|_| ApiError::unauthorized("invalid or expired session"))?;

    req.extensions_mut().insert::<Principal>(claims.principal());
    Ok(next.run(req).await)
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token.to_string());
    }
    jwt_cookie(headers)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Pull the `jwt` cookie out of the `Cookie` header, if present.
fn jwt_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "jwt" && !value.is_empty()).then(|| value.to_string())
    })
}
