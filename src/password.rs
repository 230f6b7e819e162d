//! bcrypt hashing, run on the blocking pool so request workers stay free.

use actix_web::web;

use crate::error::ApiError;

pub async fn hash_password(password: String) -> Result<String, ApiError> {
    web::block(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|_| ApiError::Internal)?
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::Internal
        })
}

/// `false` for a mismatch and for a malformed stored hash.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    let verified = web::block(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|_| ApiError::Internal)?;
    Ok(verified.unwrap_or(false))
}
