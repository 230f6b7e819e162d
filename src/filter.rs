//! Bearer-token authorization middleware shared by all three services.

use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage, ResponseError};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use tracing::{debug, warn};

use crate::auth::{AuthUser, TokenKind, TokenProvider};
use crate::clients::UserDirectory;
use crate::error::{ApiError, AuthFailure};
use crate::token_store::TokenStore;

/// Paths that skip authentication. A trailing `/**` matches the prefix
/// itself and anything below it; other patterns match exactly.
#[derive(Clone, Debug)]
pub struct AllowList {
    patterns: Vec<String>,
}

impl AllowList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { patterns: patterns.into_iter().map(Into::into).collect() }
    }

    /// `/`, the GitLab proxy and the API docs.
    pub fn public_defaults() -> Self {
        Self::new(["/", "/api/v1/gitlab/**", "/docs/**"])
    }

    pub fn with(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn permits(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| match p.strip_suffix("/**") {
            Some(prefix) => {
                path == prefix || (path.starts_with(prefix) && path[prefix.len()..].starts_with('/'))
            }
            None => path == p,
        })
    }
}

/// Everything the middleware needs to authorize a request.
pub struct AuthContext {
    pub tokens: TokenProvider,
    pub token_store: Arc<dyn TokenStore>,
    pub users: Arc<dyn UserDirectory>,
    pub allow: AllowList,
}

#[derive(Clone)]
pub struct JwtAuthorization {
    ctx: Arc<AuthContext>,
}

impl JwtAuthorization {
    pub fn new(ctx: Arc<AuthContext>) -> Self {
        Self { ctx }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuthorization
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthorizationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthorizationMiddleware {
            service: Rc::new(service),
            ctx: self.ctx.clone(),
        }))
    }
}

pub struct JwtAuthorizationMiddleware<S> {
    service: Rc<S>,
    ctx: Arc<AuthContext>,
}

impl<S, B> Service<ServiceRequest> for JwtAuthorizationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let ctx = self.ctx.clone();
        Box::pin(async move {
            let mut req = req;
            if ctx.allow.permits(req.path()) {
                return svc.call(req).await.map(ServiceResponse::map_into_left_body);
            }
            match authorize(&ctx, &mut req).await {
                Ok(user) => {
                    debug!(path = req.path(), user = %user.username, "request authorized");
                    req.extensions_mut().insert(user);
                    svc.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(e) => {
                    let reason = match &e {
                        ApiError::Unauthorized(f) => f.as_str(),
                        _ => "dependency_failure",
                    };
                    warn!(path = req.path(), reason, "request rejected");
                    let res = e.error_response();
                    Ok(req.into_response(res).map_into_right_body())
                }
            }
        })
    }
}

async fn authorize(ctx: &AuthContext, req: &mut ServiceRequest) -> Result<AuthUser, ApiError> {
    let token = req
        .extract::<BearerAuth>()
        .await
        .map_err(|_| ApiError::Unauthorized(AuthFailure::MissingToken))?
        .token()
        .to_string();
    let claims = ctx.tokens.decode(&token, TokenKind::Access)?;
    if ctx.token_store.is_blacklisted(&token).await? {
        return Err(ApiError::Unauthorized(AuthFailure::TokenRevoked));
    }
    let user = ctx
        .users
        .find_by_username(&claims.username)
        .await?
        .ok_or(ApiError::Unauthorized(AuthFailure::UnknownUser))?;
    // a re-created account must not inherit tokens of its predecessor
    if claims.sub != user.id.to_string() {
        return Err(ApiError::Unauthorized(AuthFailure::UnknownUser));
    }
    Ok(AuthUser {
        id: user.id,
        username: user.username,
        role_type: user.role_type,
        token,
        claims,
    })
}
