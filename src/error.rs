use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::auth::TokenError;
use crate::clients::ClientError;
use crate::repo::RepoError;
use crate::token_store::TokenStoreError;

/// Why a request was rejected with 401. Serialized as the `reason` field so
/// clients can tell an expired token (refresh it) from the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    InvalidToken,
    TokenExpired,
    TokenRevoked,
    UnknownUser,
    BadCredentials,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "missing_token",
            AuthFailure::InvalidToken => "invalid_token",
            AuthFailure::TokenExpired => "token_expired",
            AuthFailure::TokenRevoked => "token_revoked",
            AuthFailure::UnknownUser => "unknown_user",
            AuthFailure::BadCredentials => "bad_credentials",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("bad request")] BadRequest(String),
    #[error("unauthorized")] Unauthorized(AuthFailure),
    #[error("forbidden")] Forbidden,
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("bad gateway")] BadGateway,
    #[error("internal error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound,
            RepoError::Conflict => ApiError::Conflict,
            RepoError::Internal(msg) => {
                tracing::error!(error = %msg, "repository failure");
                ApiError::Internal
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => ApiError::Unauthorized(AuthFailure::TokenExpired),
            TokenError::Invalid | TokenError::WrongKind => ApiError::Unauthorized(AuthFailure::InvalidToken),
            TokenError::Encode(err) => {
                tracing::error!(error = %err, "token encoding failed");
                ApiError::Internal
            }
        }
    }
}

impl From<TokenStoreError> for ApiError {
    fn from(e: TokenStoreError) -> Self {
        tracing::error!(error = %e, "token store failure");
        ApiError::Internal
    }
}

impl From<ClientError> for ApiError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::NotFound => ApiError::NotFound,
            other => {
                tracing::error!(error = %other, "downstream call failed");
                ApiError::BadGateway
            }
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::BadGateway => StatusCode::BAD_GATEWAY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let reason = match self {
            ApiError::BadRequest(msg) => Some(msg.clone()),
            ApiError::Unauthorized(f) => Some(f.as_str().to_string()),
            _ => None,
        };
        let mut res = HttpResponse::build(self.status_code());
        if let ApiError::Unauthorized(f) = self {
            let challenge = match f {
                AuthFailure::MissingToken | AuthFailure::BadCredentials => "Bearer".to_string(),
                other => format!("Bearer error=\"invalid_token\", error_description=\"{}\"", other.as_str()),
            };
            res.insert_header((header::WWW_AUTHENTICATE, challenge));
        }
        res.json(ApiErrorBody { error: self.to_string(), reason })
    }
}
