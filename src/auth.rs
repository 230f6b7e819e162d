use std::future::{ready, Ready};
use std::time::Duration;

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ApiError, AuthFailure};
use crate::models::{Id, RoleType, UserView};

pub const GRANT_TYPE: &str = "Bearer";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    pub role: RoleType,
    pub typ: TokenKind,
    pub jti: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("wrong token type")]
    WrongKind,
    #[error("token encoding failed: {0}")]
    Encode(#[from] jsonwebtoken::errors::Error),
}

/// Access/refresh pair handed to clients on login and reissue.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthTokens {
    pub grant_type: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Signs and verifies HS256 tokens. Built once at startup from `Config`.
#[derive(Clone)]
pub struct TokenProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

fn now_secs() -> usize {
    chrono::Utc::now().timestamp().max(0) as usize
}

impl TokenProvider {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn issue(&self, user: &UserView, typ: TokenKind) -> Result<String, TokenError> {
        let ttl = match typ {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let iat = now_secs();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role_type,
            typ,
            jti: uuid::Uuid::new_v4().to_string(),
            iat,
            exp: iat + ttl.as_secs() as usize,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn issue_pair(&self, user: &UserView) -> Result<AuthTokens, TokenError> {
        Ok(AuthTokens {
            grant_type: GRANT_TYPE.to_string(),
            access_token: self.issue(user, TokenKind::Access)?,
            refresh_token: self.issue(user, TokenKind::Refresh)?,
            expires_in: self.access_ttl.as_secs(),
        })
    }

    /// Verifies signature, expiry and token type.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;
        if data.claims.typ != expected {
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims)
    }

    /// Time left before `claims` expire; zero when already past.
    pub fn remaining(claims: &Claims) -> Duration {
        Duration::from_secs(claims.exp.saturating_sub(now_secs()) as u64)
    }
}

/// Caller identity placed in request extensions by the authorization
/// middleware.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Id,
    pub username: String,
    pub role_type: RoleType,
    /// Raw bearer token, kept for revocation on logout.
    pub token: String,
    pub claims: Claims,
}

impl AuthUser {
    pub fn view(&self) -> UserView {
        UserView { id: self.id, username: self.username.clone(), role_type: self.role_type }
    }

    pub fn is_admin(&self) -> bool {
        self.role_type == RoleType::Admin
    }
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, _pl: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or(ApiError::Unauthorized(AuthFailure::MissingToken)),
        )
    }
}

/// Helper macro for role-guarding handlers.
#[macro_export]
macro_rules! require_role {
    ($auth:expr, $role:pat) => {
        if !matches!($auth.role_type, $role) {
            return Err($crate::error::ApiError::Forbidden);
        }
    };
}
