use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::auth::AuthUser;
use crate::clients::SERVICE_TOKEN_HEADER;
use crate::error::{ApiError, AuthFailure};
use crate::models::{Credentials, Id, NewUser, RoleType, RoleUpdate, UserView};
use crate::password::{hash_password, verify_password};
use crate::repo::UserRepo;
use crate::require_role;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Clone)]
pub struct UserState {
    pub users: Arc<dyn UserRepo>,
    /// Shared secret the other services send on internal calls; `None`
    /// leaves the internal routes open.
    pub service_token: Option<String>,
}

impl UserState {
    pub fn new(users: Arc<dyn UserRepo>) -> Self {
        Self { users, service_token: None }
    }

    pub fn with_service_token(mut self, token: Option<String>) -> Self {
        self.service_token = token;
        self
    }

    fn check_service_token(&self, req: &HttpRequest) -> Result<(), ApiError> {
        let Some(expected) = &self.service_token else {
            return Ok(());
        };
        let presented = req.headers().get(SERVICE_TOKEN_HEADER).and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            warn!(path = %req.path(), "internal call without a valid service token");
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RoleQuery {
    /// `USER` or `ADMIN`.
    pub role: RoleType,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/users/signup").route(web::post().to(signup)))
            .service(web::resource("/users/me").route(web::get().to(me)))
            .service(web::resource("/users").route(web::get().to(list_by_role)))
            .service(web::resource("/users/by-username/{username}").route(web::get().to(by_username)))
            .service(web::resource("/users/{id}/role").route(web::patch().to(update_role)))
            // service-to-service: allow-listed, guarded by the service token
            .service(web::resource("/internal/auth/verify").route(web::post().to(internal_verify)))
            .service(web::resource("/internal/users/by-id/{id}").route(web::get().to(internal_find_by_id)))
            .service(web::resource("/internal/users/{username}").route(web::get().to(internal_find))),
    );
}

fn validate_signup(c: &Credentials) -> Result<(), ApiError> {
    let len = c.username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "username must be {USERNAME_MIN_LEN}-{USERNAME_MAX_LEN} characters"
        )));
    }
    if !c.username.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-')) {
        return Err(ApiError::BadRequest("username may only contain letters, digits, '_', '.' and '-'".into()));
    }
    if c.password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ApiError::BadRequest(format!("password must be at least {PASSWORD_MIN_LEN} characters")));
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/api/v1/users/signup",
    request_body = Credentials,
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 400, description = "Invalid username or password"),
        (status = 409, description = "Username taken")
    ),
    tag = "users"
)]
pub async fn signup(data: web::Data<UserState>, body: web::Json<Credentials>) -> Result<HttpResponse, ApiError> {
    let creds = body.into_inner();
    validate_signup(&creds)?;
    if data.users.find_by_username(&creds.username).await?.is_some() {
        return Err(ApiError::Conflict);
    }
    let password_hash = hash_password(creds.password).await?;
    let user = data
        .users
        .create_user(NewUser { username: creds.username, password_hash, role_type: RoleType::User })
        .await?;
    info!(user = %user.username, id = user.id, "user signed up");
    Ok(HttpResponse::Created().json(UserView::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses((status = 200, description = "Caller's account", body = UserView)),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn me(auth: AuthUser, data: web::Data<UserState>) -> Result<HttpResponse, ApiError> {
    let user = data.users.find_user(auth.id).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(RoleQuery),
    responses(
        (status = 200, description = "Users holding the role", body = [UserView]),
        (status = 403, description = "Admins only")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_by_role(
    auth: AuthUser,
    data: web::Data<UserState>,
    query: web::Query<RoleQuery>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, RoleType::Admin);
    let users: Vec<UserView> = data
        .users
        .find_all_by_role_type(query.role)
        .await?
        .into_iter()
        .map(UserView::from)
        .collect();
    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/by-username/{username}",
    params(("username" = String, Path, description = "Exact username")),
    responses(
        (status = 200, description = "User", body = UserView),
        (status = 404, description = "No such user")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn by_username(
    _auth: AuthUser,
    data: web::Data<UserState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let user = data.users.find_by_username(&path).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/role",
    params(("id" = Id, Path, description = "User id")),
    request_body = RoleUpdate,
    responses(
        (status = 200, description = "Role changed", body = UserView),
        (status = 403, description = "Admins only"),
        (status = 404, description = "No such user")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_role(
    auth: AuthUser,
    data: web::Data<UserState>,
    path: web::Path<Id>,
    body: web::Json<RoleUpdate>,
) -> Result<HttpResponse, ApiError> {
    require_role!(auth, RoleType::Admin);
    let id = path.into_inner();
    let user = data.users.update_role_type(id, body.role_type).await?;
    info!(admin = %auth.username, target = id, role = %user.role_type, "role changed");
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/internal/users/{username}",
    params(("username" = String, Path, description = "Exact username")),
    responses(
        (status = 200, description = "User", body = UserView),
        (status = 403, description = "Missing or wrong service token"),
        (status = 404, description = "No such user")
    ),
    tag = "internal"
)]
pub async fn internal_find(
    req: HttpRequest,
    data: web::Data<UserState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    data.check_service_token(&req)?;
    let user = data.users.find_by_username(&path).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/internal/users/by-id/{id}",
    params(("id" = Id, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserView),
        (status = 403, description = "Missing or wrong service token"),
        (status = 404, description = "No such user")
    ),
    tag = "internal"
)]
pub async fn internal_find_by_id(
    req: HttpRequest,
    data: web::Data<UserState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    data.check_service_token(&req)?;
    let user = data.users.find_user(path.into_inner()).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/internal/auth/verify",
    request_body = Credentials,
    responses(
        (status = 200, description = "Credentials valid", body = UserView),
        (status = 401, description = "Unknown user or wrong password"),
        (status = 403, description = "Missing or wrong service token")
    ),
    tag = "internal"
)]
pub async fn internal_verify(
    req: HttpRequest,
    data: web::Data<UserState>,
    body: web::Json<Credentials>,
) -> Result<HttpResponse, ApiError> {
    data.check_service_token(&req)?;
    let Credentials { username, password } = body.into_inner();
    let user = data
        .users
        .find_by_username(&username)
        .await?
        .ok_or(ApiError::Unauthorized(AuthFailure::BadCredentials))?;
    if !verify_password(password, user.password_hash.clone()).await? {
        return Err(ApiError::Unauthorized(AuthFailure::BadCredentials));
    }
    Ok(HttpResponse::Ok().json(UserView::from(user)))
}
