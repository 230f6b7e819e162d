use std::sync::Arc;

use actix_web::web;
use ideaboard::bootstrap::{self, AUTH_SERVICE_PORT};
use ideaboard::clients::{HttpUserDirectory, UserDirectory};
use ideaboard::openapi::AuthApiDoc;
use ideaboard::routes::{self, auth::AuthState};
use ideaboard::{AllowList, AuthContext, Config, TokenProvider};
use utoipa::OpenApi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init();
    let config = Config::from_env(AUTH_SERVICE_PORT)?;

    let tokens = TokenProvider::new(&config.jwt_secret, config.access_token_ttl, config.refresh_token_ttl);
    let token_store = bootstrap::token_store(&config)?;
    let users: Arc<dyn UserDirectory> = Arc::new(
        HttpUserDirectory::new(config.user_service_url.as_str(), config.retry.clone())?
            .with_service_token(config.service_token.clone()),
    );

    let auth = Arc::new(AuthContext {
        tokens: tokens.clone(),
        token_store: token_store.clone(),
        users: users.clone(),
        allow: AllowList::public_defaults().with("/api/v1/login").with("/api/v1/auth/reissue"),
    });
    let state = AuthState { tokens, token_store, users };

    bootstrap::serve("auth-service", &config, auth, AuthApiDoc::openapi(), move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(state.clone()));
        routes::auth::config(cfg);
    })
    .await?;
    Ok(())
}
