//! HTTP handlers, one submodule per service.

use actix_web::{error, web, HttpResponse};
use serde_json::json;

use crate::error::ApiError;

pub mod auth;
pub mod gitlab;
pub mod projects;
pub mod users;

/// Registers what every service shares: the liveness route and extractor
/// error handlers that answer malformed input with the JSON error shape.
pub fn common(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        error::Error::from(ApiError::BadRequest(err.to_string()))
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _| {
        error::Error::from(ApiError::BadRequest(err.to_string()))
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        error::Error::from(ApiError::BadRequest(err.to_string()))
    }))
    .route("/", web::get().to(health));
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "UP" }))
}
