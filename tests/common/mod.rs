#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use ideaboard::auth::{Claims, TokenKind, TokenProvider};
use ideaboard::clients::RepoUserDirectory;
use ideaboard::filter::{AllowList, AuthContext};
use ideaboard::models::{NewUser, RoleType, User, UserView};
use ideaboard::repo::{inmem::InMemRepo, UserRepo};
use ideaboard::token_store::InMemoryTokenStore;
use jsonwebtoken::{encode, EncodingKey, Header};

pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";
pub const PASSWORD: &str = "correct-horse";

pub fn provider() -> TokenProvider {
    TokenProvider::new(SECRET, Duration::from_secs(1800), Duration::from_secs(3600))
}

/// Inserts a user whose password is `PASSWORD`. Low bcrypt cost keeps tests quick.
pub async fn seed_user(repo: &InMemRepo, username: &str, role_type: RoleType) -> User {
    let password_hash = bcrypt::hash(PASSWORD, 4).unwrap();
    repo.create_user(NewUser { username: username.into(), password_hash, role_type })
        .await
        .unwrap()
}

pub fn access_token(user: &User) -> String {
    provider().issue(&UserView::from(user), TokenKind::Access).unwrap()
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

/// An access token for `user` that expired a minute ago, signed with `SECRET`.
pub fn expired_token(user: &User) -> String {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user.id.to_string(),
        username: user.username.clone(),
        role: user.role_type,
        typ: TokenKind::Access,
        jti: "expired".into(),
        iat: now - 120,
        exp: now - 60,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

/// Authorization context backed by the in-memory repo and token store.
pub fn auth_context(repo: &InMemRepo, tokens: Arc<InMemoryTokenStore>, allow: AllowList) -> Arc<AuthContext> {
    Arc::new(AuthContext {
        tokens: provider(),
        token_store: tokens,
        users: Arc::new(RepoUserDirectory::new(Arc::new(repo.clone()))),
        allow,
    })
}

pub async fn json_body<B: MessageBody>(resp: ServiceResponse<B>) -> serde_json::Value {
    let body = actix_web::test::read_body(resp).await;
    serde_json::from_slice(&body).unwrap()
}
