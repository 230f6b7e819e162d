pub mod auth;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod error;
pub mod filter;
pub mod gitlab;
pub mod models;
pub mod openapi;
pub mod password;
pub mod repo;
pub mod retry;
pub mod routes;
pub mod token_store;

// Re-export commonly used items for the binaries and tests
pub use auth::{AuthUser, TokenProvider};
pub use config::Config;
pub use error::ApiError;
pub use filter::{AllowList, AuthContext, JwtAuthorization};
