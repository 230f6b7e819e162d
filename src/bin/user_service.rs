use std::sync::Arc;

use actix_web::web;
use ideaboard::bootstrap::{self, USER_SERVICE_PORT};
use ideaboard::clients::RepoUserDirectory;
use ideaboard::openapi::UserApiDoc;
use ideaboard::routes::{self, users::UserState};
use ideaboard::{AllowList, AuthContext, Config, TokenProvider};
use utoipa::OpenApi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init();
    let config = Config::from_env(USER_SERVICE_PORT)?;

    let users = bootstrap::user_repo(&config).await?;
    // the user service authorizes against its own store
    let auth = Arc::new(AuthContext {
        tokens: TokenProvider::new(&config.jwt_secret, config.access_token_ttl, config.refresh_token_ttl),
        token_store: bootstrap::token_store(&config)?,
        users: Arc::new(RepoUserDirectory::new(users.clone())),
        allow: AllowList::public_defaults().with("/api/v1/users/signup").with("/api/v1/internal/**"),
    });
    if config.service_token.is_none() {
        tracing::warn!("INTERNAL_SERVICE_TOKEN unset, internal user endpoints accept any caller");
    }
    let state = UserState::new(users).with_service_token(config.service_token.clone());

    bootstrap::serve("user-service", &config, auth, UserApiDoc::openapi(), move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(state.clone()));
        routes::users::config(cfg);
    })
    .await?;
    Ok(())
}
