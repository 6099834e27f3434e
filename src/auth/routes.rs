use rocket::response::{Redirect, status};
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;

use crate::auth::guards::AuthUser;
use crate::auth::oauth::completion_redirect;
use crate::auth::responses::{
    LoginRequest, LoginResponse, Provider, RefreshRequest, RefreshResponse, RegisterRequest,
    UserSummary,
};
use crate::auth::AuthState;
use crate::error::ApiError;
use crate::models::MessageResponse;

/// Create a local account. No tokens are issued; log in afterwards.
#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<payload>")]
pub async fn register(
    state: &State<AuthState>,
    payload: Json<RegisterRequest>,
) -> Result<status::Created<Json<UserSummary>>, ApiError> {
    let account = state
        .credentials
        .register(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok(status::Created::new("/api/me").body(Json(UserSummary::from(&account))))
}

#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    payload: Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let account = state
        .credentials
        .authenticate(&payload.email, &payload.password)
        .await?;
    let pair = state.sessions.start(&account).await?;

    log::info!("account {} logged in", account.id);
    Ok(Json(LoginResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        access_token_expires_at: pair.access_token_expires_at,
        refresh_token_expires_at: pair.refresh_token_expires_at,
        user: UserSummary::from(&account),
    }))
}

/// Exchange a refresh token for a new pair. The presented token stops working.
#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<payload>")]
pub async fn refresh(
    state: &State<AuthState>,
    payload: Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    if payload.refresh_token.is_empty() {
        return Err(ApiError::BadRequest("refresh_token required".into()));
    }

    let pair = state.sessions.refresh(&payload.refresh_token).await?;
    Ok(Json(RefreshResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        access_token_expires_at: pair.access_token_expires_at,
        refresh_token_expires_at: pair.refresh_token_expires_at,
    }))
}

/// Revoke the caller's refresh token. Access tokens already issued stay
/// valid until they expire.
#[openapi(tag = "Auth")]
#[post("/api/logout")]
pub async fn logout(
    state: &State<AuthState>,
    user: AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    state.sessions.end(user.id).await?;
    Ok(Json(MessageResponse::new("logged out")))
}

#[openapi(tag = "Auth")]
#[get("/api/me")]
pub async fn me(state: &State<AuthState>, user: AuthUser) -> Result<Json<UserSummary>, ApiError> {
    let account = state
        .accounts
        .find_by_id(user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    Ok(Json(UserSummary::from(&account)))
}

#[get("/auth/google")]
pub fn google_login(state: &State<AuthState>) -> Result<Redirect, ApiError> {
    start_oauth(state, Provider::Google)
}

#[get("/auth/google/callback?<code>")]
pub async fn google_callback(
    state: &State<AuthState>,
    code: Option<String>,
) -> Result<Redirect, ApiError> {
    finish_oauth(state, Provider::Google, code).await
}

#[get("/auth/github")]
pub fn github_login(state: &State<AuthState>) -> Result<Redirect, ApiError> {
    start_oauth(state, Provider::Github)
}

#[get("/auth/github/callback?<code>")]
pub async fn github_callback(
    state: &State<AuthState>,
    code: Option<String>,
) -> Result<Redirect, ApiError> {
    finish_oauth(state, Provider::Github, code).await
}

fn start_oauth(state: &AuthState, provider: Provider) -> Result<Redirect, ApiError> {
    let url = state.oauth.authorize_url(provider)?;
    Ok(Redirect::temporary(url))
}

async fn finish_oauth(
    state: &AuthState,
    provider: Provider,
    code: Option<String>,
) -> Result<Redirect, ApiError> {
    let code = code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing authorization code".into()))?;

    let profile = state.oauth.login(provider, &code).await.map_err(|err| {
        log::warn!("{} login failed: {}", provider.as_str(), err);
        err
    })?;
    let account = state.credentials.find_or_create_oauth(provider, profile).await?;
    let pair = state.sessions.start(&account).await?;

    let target = completion_redirect(&state.config.frontend_url, &pair, &account)?;
    log::info!("account {} logged in via {}", account.id, provider.as_str());
    Ok(Redirect::temporary(target))
}
