//! Authentication and principal API handlers

use crate::api::{extract_ip, extract_user_agent, MessageResponse, SuccessResponse};
use crate::context::Context;
use crate::credential::TokenPair;
use crate::domain::{CreateUserInput, UserInfo};
use crate::domains::identity::{
    ChangePassword, CreateUser, GetProfile, Login, Logout, RefreshSession,
};
use crate::error::{AppError, Result};
use crate::state::HasServices;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// HTTP-only cookie carrying the refresh token
pub const REFRESH_COOKIE: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/api/v1/auth";

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, max = 100))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshInput {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordInput {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            expires_in: (pair.access_expires_at - Utc::now()).num_seconds().max(0),
            access_token: pair.access_token,
            token_type: "Bearer".to_string(),
            refresh_token: pair.refresh_token,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: UserInfo,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

fn refresh_cookie<S: HasServices>(state: &S, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(state.config().cookie_secure)
        .same_site(SameSite::Strict)
        .build()
}

/// Body value first, then the cookie.
fn presented_refresh_token(jar: &CookieJar, body: Option<RefreshInput>) -> Option<String> {
    body.and_then(|b| b.refresh_token)
        .filter(|t| !t.is_empty())
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .filter(|t| !t.is_empty())
}

/// POST /api/v1/auth/login
pub async fn login<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
    headers: HeaderMap,
    jar: CookieJar,
    Json(input): Json<LoginInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;

    let result = state
        .mediator()
        .send(
            &ctx,
            Login {
                username: input.username,
                password: input.password,
                ip: extract_ip(&headers),
                user_agent: extract_user_agent(&headers),
            },
        )
        .await?;

    let jar = jar.add(refresh_cookie(&state, result.tokens.refresh_token.clone()));
    Ok((
        jar,
        Json(SuccessResponse::new(LoginResponse {
            user: result.user,
            tokens: result.tokens.into(),
        })),
    ))
}

/// POST /api/v1/auth/refresh
pub async fn refresh<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
    jar: CookieJar,
    body: Option<Json<RefreshInput>>,
) -> Result<impl IntoResponse> {
    let refresh_token = presented_refresh_token(&jar, body.map(|Json(b)| b))
        .ok_or_else(|| AppError::Unauthorized("refresh token required".to_string()))?;

    let pair = state
        .mediator()
        .send(&ctx, RefreshSession { refresh_token })
        .await?;

    let jar = jar.add(refresh_cookie(&state, pair.refresh_token.clone()));
    Ok((jar, Json(SuccessResponse::new(TokenResponse::from(pair)))))
}

/// POST /api/v1/auth/logout
pub async fn logout<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
    jar: CookieJar,
    body: Option<Json<RefreshInput>>,
) -> Result<impl IntoResponse> {
    let refresh_token = presented_refresh_token(&jar, body.map(|Json(b)| b));
    state
        .mediator()
        .send(&ctx, Logout { refresh_token })
        .await?;

    let jar = jar.remove(Cookie::build(REFRESH_COOKIE).path(REFRESH_COOKIE_PATH));
    Ok((StatusCode::NO_CONTENT, jar))
}

/// GET /api/v1/auth/me
pub async fn me<S: HasServices>(State(state): State<S>, ctx: Context) -> Result<impl IntoResponse> {
    let user = state.mediator().send(&ctx, GetProfile).await?;
    Ok(Json(SuccessResponse::new(user)))
}

/// POST /api/v1/auth/change-password
pub async fn change_password<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
    Json(input): Json<ChangePasswordInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    state
        .mediator()
        .send(
            &ctx,
            ChangePassword {
                current_password: input.current_password,
                new_password: input.new_password,
            },
        )
        .await?;
    Ok(Json(MessageResponse::new("Password changed")))
}

/// POST /api/v1/users
pub async fn create_user<S: HasServices>(
    State(state): State<S>,
    ctx: Context,
    Json(input): Json<CreateUserInput>,
) -> Result<impl IntoResponse> {
    input.validate()?;
    let user = state.mediator().send(&ctx, CreateUser { input }).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(user))))
}
