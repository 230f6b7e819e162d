use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::{AuthTokens, AuthUser, TokenKind, TokenProvider};
use crate::clients::UserDirectory;
use crate::error::{ApiError, AuthFailure};
use crate::models::{Credentials, UserView};
use crate::token_store::TokenStore;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: TokenProvider,
    pub token_store: Arc<dyn TokenStore>,
    pub users: Arc<dyn UserDirectory>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReissueRequest {
    pub refresh_token: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/login").route(web::post().to(login)))
            .service(web::resource("/logout").route(web::post().to(logout)))
            .service(web::resource("/auth/reissue").route(web::post().to(reissue)))
            .service(web::resource("/auth/me").route(web::get().to(me))),
    );
}

async fn issue_and_store(data: &AuthState, user: &UserView) -> Result<AuthTokens, ApiError> {
    let tokens = data.tokens.issue_pair(user)?;
    data.token_store
        .save_refresh(&user.username, &tokens.refresh_token, data.tokens.refresh_ttl)
        .await?;
    Ok(tokens)
}

#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Token pair issued", body = AuthTokens),
        (status = 401, description = "Bad credentials"),
        (status = 502, description = "User service unreachable")
    ),
    tag = "auth"
)]
pub async fn login(data: web::Data<AuthState>, body: web::Json<Credentials>) -> Result<HttpResponse, ApiError> {
    let Credentials { username, password } = body.into_inner();
    let user = data
        .users
        .verify_credentials(&username, &password)
        .await?
        .ok_or(ApiError::Unauthorized(AuthFailure::BadCredentials))?;
    let tokens = issue_and_store(&data, &user).await?;
    info!(user = %user.username, "login succeeded");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/reissue",
    request_body = ReissueRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = AuthTokens),
        (status = 401, description = "Refresh token expired, revoked or superseded")
    ),
    tag = "auth"
)]
pub async fn reissue(data: web::Data<AuthState>, body: web::Json<ReissueRequest>) -> Result<HttpResponse, ApiError> {
    let presented = body.into_inner().refresh_token;
    let claims = data.tokens.decode(&presented, TokenKind::Refresh)?;
    if data.token_store.is_blacklisted(&presented).await? {
        return Err(ApiError::Unauthorized(AuthFailure::TokenRevoked));
    }
    // only the most recently issued refresh token is accepted; replaying an
    // older one consumes the current one too, ending the session
    let stored = data.token_store.take_refresh(&claims.username).await?;
    if stored.as_deref() != Some(presented.as_str()) {
        warn!(user = %claims.username, "stale refresh token presented");
        return Err(ApiError::Unauthorized(AuthFailure::InvalidToken));
    }
    let user = data
        .users
        .find_by_username(&claims.username)
        .await?
        .filter(|u| u.id.to_string() == claims.sub)
        .ok_or(ApiError::Unauthorized(AuthFailure::UnknownUser))?;
    let tokens = issue_and_store(&data, &user).await?;
    info!(user = %user.username, "tokens reissued");
    Ok(HttpResponse::Ok().json(tokens))
}

#[utoipa::path(
    post,
    path = "/api/v1/logout",
    responses(
        (status = 204, description = "Access token revoked, refresh token dropped"),
        (status = 401, description = "Unauthenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(auth: AuthUser, data: web::Data<AuthState>) -> Result<HttpResponse, ApiError> {
    let remaining = TokenProvider::remaining(&auth.claims);
    if !remaining.is_zero() {
        data.token_store.blacklist(&auth.token, remaining).await?;
    }
    data.token_store.delete_refresh(&auth.username).await?;
    info!(user = %auth.username, "logged out");
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Authenticated caller", body = UserView),
        (status = 401, description = "Unauthenticated")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(auth: AuthUser) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(auth.view()))
}
