//! Router, wiring, and request handlers.
//!
//! Handlers are deliberately thin: parse input, run the permission guard,
//! delegate to [`AccountService`] with the current time, map the result.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::{HeaderValue, StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use mesa_auth::{Hs256TokenCodec, Permission, Principal, RolePermissionMap, TokenCodec};
use mesa_core::{DomainError, UserId};
use mesa_store::{AccountError, AccountService, InMemoryUserStore, LogOtpDelivery, NewUser, OtpDelivery};

use crate::authz::{require_all, require_any};
use crate::config::ApiConfig;
use crate::errors::ApiError;
use crate::middleware::{AuthState, auth_middleware};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AccountService<InMemoryUserStore>>,
    pub map: Arc<RolePermissionMap>,
    pub token_ttl: Duration,
}

/// Build the production application: in-memory store, logging OTP delivery.
pub fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    build_app_with_delivery(config, Arc::new(LogOtpDelivery))
}

/// Build the application with a caller-supplied OTP delivery collaborator.
///
/// Tests use this to capture issued codes instead of logging them.
pub fn build_app_with_delivery(
    config: &ApiConfig,
    delivery: Arc<dyn OtpDelivery>,
) -> anyhow::Result<Router> {
    let map = Arc::new(RolePermissionMap::builtin()?);
    let codec: Arc<dyn TokenCodec> = Arc::new(Hs256TokenCodec::new(config.jwt_secret.as_bytes()));

    let service = Arc::new(AccountService::new(
        InMemoryUserStore::new(),
        map.clone(),
        codec.clone(),
        delivery,
        config.otp_ttl,
        config.token_ttl,
    ));

    if let Some(seed) = &config.admin_seed {
        service.seed_system_admin(&seed.name, &seed.email, &seed.password)?;
    }

    let state = AppState {
        service,
        map,
        token_ttl: config.token_ttl,
    };
    let auth_state = AuthState {
        codec,
    };

    let protected = Router::new()
        .route("/whoami", get(whoami))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", delete(delete_user))
        .route("/users/:id/role", patch(change_role))
        .route(
            "/users/:id/permissions",
            post(grant_permission).delete(revoke_permission),
        )
        .route_layer(from_fn_with_state(auth_state, auth_middleware));

    Ok(Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_router())
        .merge(protected)
        .with_state(state))
}

fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/verify-otp", post(verify_otp))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/resend-otp", post(resend_otp))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

// ─────────────────────────────────────────────────────────────────────────
// Auth flows (public)
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let success = state.service.login(&body.email, &body.password, Utc::now())?;

    let mut res = (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "login successful",
            "data": { "token": success.token, "user": success.user },
        })),
    )
        .into_response();

    // Browser clients authenticate through the cookie; API clients use the
    // token from the body as a bearer header.
    let cookie = format!(
        "jwt={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        success.token,
        state.token_ttl.num_seconds(),
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        res.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(res)
}

/// End a cookie session by expiring the `jwt` cookie.
///
/// Tokens themselves stay valid until their `exp`; bearer clients end a
/// session by discarding the token.
async fn logout() -> Response {
    let mut res = ok_body("logged out", json!(null));
    res.headers_mut().append(
        header::SET_COOKIE,
        HeaderValue::from_static("jwt=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"),
    );
    res
}

#[derive(Debug, Deserialize)]
struct VerifyOtpRequest {
    email: String,
    otp: String,
}

async fn verify_otp(
    State(state): State<AppState>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Response, ApiError> {
    let profile = state
        .service
        .verify_account(&body.email, &body.otp, Utc::now())?;
    Ok(ok_body("account verified", json!({ "user": profile })))
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    email: String,
}

async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Response, ApiError> {
    state.service.forgot_password(&body.email, Utc::now())?;
    Ok(ok_body("password reset code sent", json!(null)))
}

async fn resend_otp(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Response, ApiError> {
    state.service.resend_otp(&body.email, Utc::now())?;
    Ok(ok_body("verification code resent", json!(null)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetPasswordRequest {
    email: String,
    otp: String,
    new_password: String,
}

async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Response, ApiError> {
    state
        .service
        .reset_password(&body.email, &body.otp, &body.new_password, Utc::now())?;
    Ok(ok_body("password reset", json!(null)))
}

// ─────────────────────────────────────────────────────────────────────────
// User administration (protected)
// ─────────────────────────────────────────────────────────────────────────

async fn whoami(Extension(principal): Extension<Principal>) -> Response {
    ok_body(
        "authenticated",
        json!({
            "id": principal.user_id,
            "email": principal.email,
            "role": principal.role,
            "permissions": principal.permissions,
        }),
    )
}

async fn list_users(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Response, ApiError> {
    require_any(&state.map, &principal, &[Permission::UserView])?;
    let users = state.service.list_users(Some(principal.user_id))?;
    Ok(ok_body("users fetched", json!({ "users": users })))
}

#[derive(Debug, Deserialize)]
struct CreateUserRequest {
    name: String,
    email: String,
    password: String,
    role: String,
}

async fn create_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<CreateUserRequest>,
) -> Result<Response, ApiError> {
    require_all(&state.map, &principal, &[Permission::UserCreate])?;

    let profile = state.service.create_user(
        &NewUser {
            name: body.name,
            email: body.email,
            password: body.password,
            role: body.role,
        },
        Utc::now(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "user created, verification code sent",
            "data": { "user": profile },
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct ChangeRoleRequest {
    role: String,
}

async fn change_role(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<Response, ApiError> {
    require_all(&state.map, &principal, &[Permission::UserUpdate])?;
    let target = parse_user_id(&id)?;

    let profile = state.service.change_role(target, &body.role)?;
    Ok(ok_body("role updated", json!({ "user": profile })))
}

#[derive(Debug, Deserialize)]
struct PermissionRequest {
    permission: String,
}

async fn grant_permission(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<PermissionRequest>,
) -> Result<Response, ApiError> {
    require_all(&state.map, &principal, &[Permission::UserUpdate])?;
    let target = parse_user_id(&id)?;

    let outcome = state
        .service
        .grant_permission(&principal, target, &body.permission)?;
    Ok(ok_body(
        "permission granted",
        json!({ "change": outcome.change, "user": outcome.user }),
    ))
}

async fn revoke_permission(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<PermissionRequest>,
) -> Result<Response, ApiError> {
    require_all(&state.map, &principal, &[Permission::UserUpdate])?;
    let target = parse_user_id(&id)?;

    let outcome = state
        .service
        .revoke_permission(&principal, target, &body.permission)?;
    Ok(ok_body(
        "permission revoked",
        json!({ "change": outcome.change, "user": outcome.user }),
    ))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_all(&state.map, &principal, &[Permission::UserDelete])?;
    let target = parse_user_id(&id)?;

    state.service.delete_user(&principal, target)?;
    Ok(ok_body("user deleted", json!(null)))
}

// ─────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────

fn ok_body(message: &str, data: serde_json::Value) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": message,
            "data": data,
        })),
    )
        .into_response()
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse()
        .map_err(|e: DomainError| ApiError::from(AccountError::from(e)))
}
