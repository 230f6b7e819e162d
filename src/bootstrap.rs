//! Process wiring shared by the service binaries.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::filter::{AuthContext, JwtAuthorization};
use crate::repo::inmem::InMemRepo;
use crate::repo::pg::PgRepo;
use crate::repo::{ProjectStore, UserRepo};
use crate::token_store::{InMemoryTokenStore, RedisTokenStore, TokenStore};

pub const AUTH_SERVICE_PORT: u16 = 8081;
pub const USER_SERVICE_PORT: u16 = 8082;
pub const PROJECT_SERVICE_PORT: u16 = 8083;

/// Loads `.env` (debug builds only) and installs the tracing subscriber.
/// Call before reading `Config`.
pub fn init() {
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

pub fn cors(frontend_url: Option<&str>) -> Cors {
    let mut c = Cors::default()
        .allowed_origin("http://localhost:5173")
        .allowed_origin("http://localhost:3000")
        .allow_any_header()
        .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .supports_credentials()
        .max_age(3600);
    if let Some(front) = frontend_url {
        c = c.allowed_origin(front);
    }
    c
}

async fn pg_repo(url: &str) -> anyhow::Result<PgRepo> {
    let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;
    let repo = PgRepo::new(pool);
    repo.migrate().await?;
    info!("using Postgres repository backend");
    Ok(repo)
}

pub async fn user_repo(config: &Config) -> anyhow::Result<Arc<dyn UserRepo>> {
    let repo: Arc<dyn UserRepo> = match &config.database_url {
        Some(url) => Arc::new(pg_repo(url).await?),
        None => {
            info!("DATABASE_URL unset, using in-memory repository");
            Arc::new(InMemRepo::default())
        }
    };
    Ok(repo)
}

pub async fn project_store(config: &Config) -> anyhow::Result<Arc<dyn ProjectStore>> {
    let store: Arc<dyn ProjectStore> = match &config.database_url {
        Some(url) => Arc::new(pg_repo(url).await?),
        None => {
            info!("DATABASE_URL unset, using in-memory repository");
            Arc::new(InMemRepo::default())
        }
    };
    Ok(store)
}

pub fn token_store(config: &Config) -> anyhow::Result<Arc<dyn TokenStore>> {
    let store: Arc<dyn TokenStore> = match &config.redis_url {
        Some(url) => {
            info!("using Redis token store");
            Arc::new(RedisTokenStore::new(url)?)
        }
        None => {
            warn!("REDIS_URL unset, refresh tokens and revocations are local to this process");
            Arc::new(InMemoryTokenStore::default())
        }
    };
    Ok(store)
}

/// Runs one service: tracing, CORS and bearer authorization wrapped around
/// `routes`, plus Swagger UI for `openapi` under `/docs/`.
pub async fn serve<F>(
    name: &'static str,
    config: &Config,
    auth: Arc<AuthContext>,
    openapi: utoipa::openapi::OpenApi,
    routes: F,
) -> std::io::Result<()>
where
    F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
{
    let frontend = config.frontend_url.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(JwtAuthorization::new(auth.clone()))
            .wrap(cors(frontend.as_deref()))
            .wrap(TracingLogger::default())
            .configure(crate::routes::common)
            .configure(routes.clone())
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((config.bind_addr.as_str(), config.port))?;
    info!(service = name, addr = %config.bind_addr, port = config.port, "listening");
    server.run().await
}
