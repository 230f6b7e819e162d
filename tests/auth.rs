use actix_web::test::TestRequest;
use actix_web::{dev::Payload, FromRequest, HttpMessage};
use ideaboard::{
    auth::{AuthUser, TokenError, TokenKind},
    error::ApiError,
    models::{RoleType, UserView},
    require_role,
};

mod common;
use common::{provider, SECRET};

fn alice() -> UserView {
    UserView { id: 42, username: "alice".into(), role_type: RoleType::User }
}

#[test]
fn access_token_roundtrip() {
    let p = provider();
    let token = p.issue(&alice(), TokenKind::Access).expect("token");
    let claims = p.decode(&token, TokenKind::Access).expect("decode");
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.role, RoleType::User);
    assert_eq!(claims.exp - claims.iat, 1800);
}

#[test]
fn refresh_token_is_not_an_access_token() {
    let p = provider();
    let refresh = p.issue(&alice(), TokenKind::Refresh).unwrap();
    assert!(matches!(p.decode(&refresh, TokenKind::Access), Err(TokenError::WrongKind)));
    assert!(p.decode(&refresh, TokenKind::Refresh).is_ok());
}

#[test]
fn pair_tokens_are_distinct() {
    let pair = provider().issue_pair(&alice()).unwrap();
    assert_eq!(pair.grant_type, "Bearer");
    assert_eq!(pair.expires_in, 1800);
    assert_ne!(pair.access_token, pair.refresh_token);
    let again = provider().issue_pair(&alice()).unwrap();
    assert_ne!(pair.access_token, again.access_token);
}

#[test]
fn expired_token_reports_expiry() {
    let user = ideaboard::models::User {
        id: 42,
        username: "alice".into(),
        password_hash: String::new(),
        role_type: RoleType::User,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    let token = common::expired_token(&user);
    assert!(matches!(provider().decode(&token, TokenKind::Access), Err(TokenError::Expired)));
}

#[test]
fn foreign_signature_is_invalid() {
    let other = ideaboard::auth::TokenProvider::new(
        "another-secret-that-is-32-bytes-long",
        std::time::Duration::from_secs(60),
        std::time::Duration::from_secs(60),
    );
    let token = other.issue(&alice(), TokenKind::Access).unwrap();
    assert!(matches!(provider().decode(&token, TokenKind::Access), Err(TokenError::Invalid)));
    assert!(matches!(provider().decode("garbage", TokenKind::Access), Err(TokenError::Invalid)));
    assert!(SECRET.len() >= 32);
}

#[actix_web::test]
async fn extractor_requires_authorized_request() {
    let req = TestRequest::default().to_http_request();
    let mut pl = Payload::None;
    let err = AuthUser::from_request(&req, &mut pl).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized(_)));

    let p = provider();
    let token = p.issue(&alice(), TokenKind::Access).unwrap();
    let claims = p.decode(&token, TokenKind::Access).unwrap();
    let req = TestRequest::default().to_http_request();
    req.extensions_mut().insert(AuthUser {
        id: 42,
        username: "alice".into(),
        role_type: RoleType::User,
        token,
        claims,
    });
    let user = AuthUser::from_request(&req, &mut pl).await.expect("extract");
    assert_eq!(user.view(), alice());
}

#[test]
fn require_role_macro_enforces_roles() {
    let p = provider();
    let make = |role_type| {
        let token = p.issue(&alice(), TokenKind::Access).unwrap();
        let claims = p.decode(&token, TokenKind::Access).unwrap();
        AuthUser { id: 1, username: "a".into(), role_type, token, claims }
    };

    fn guarded(a: AuthUser) -> Result<(), ApiError> {
        require_role!(a, RoleType::Admin);
        Ok(())
    }
    assert!(guarded(make(RoleType::Admin)).is_ok());
    assert!(matches!(guarded(make(RoleType::User)), Err(ApiError::Forbidden)));
}
