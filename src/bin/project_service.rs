use std::sync::Arc;

use actix_web::web;
use ideaboard::bootstrap::{self, PROJECT_SERVICE_PORT};
use ideaboard::clients::{HttpUserDirectory, UserDirectory};
use ideaboard::gitlab::GitLabClient;
use ideaboard::openapi::ProjectApiDoc;
use ideaboard::routes::{self, projects::ProjectState};
use ideaboard::{AllowList, AuthContext, Config, TokenProvider};
use utoipa::OpenApi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    bootstrap::init();
    let config = Config::from_env(PROJECT_SERVICE_PORT)?;

    let users: Arc<dyn UserDirectory> = Arc::new(
        HttpUserDirectory::new(config.user_service_url.as_str(), config.retry.clone())?
            .with_service_token(config.service_token.clone()),
    );
    let auth = Arc::new(AuthContext {
        tokens: TokenProvider::new(&config.jwt_secret, config.access_token_ttl, config.refresh_token_ttl),
        token_store: bootstrap::token_store(&config)?,
        users: users.clone(),
        allow: AllowList::public_defaults(),
    });
    let state = ProjectState {
        store: bootstrap::project_store(&config).await?,
        users,
        gitlab: GitLabClient::new(config.gitlab_api_base.as_str(), config.gitlab_token.clone(), config.retry.clone())?,
    };

    bootstrap::serve("project-service", &config, auth, ProjectApiDoc::openapi(), move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::new(state.clone()));
        routes::projects::config(cfg);
    })
    .await?;
    Ok(())
}
