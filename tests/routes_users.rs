use std::sync::Arc;

use actix_web::{test, web, App};
use ideaboard::filter::{AllowList, JwtAuthorization};
use ideaboard::models::RoleType;
use ideaboard::repo::inmem::InMemRepo;
use ideaboard::routes::{self, users::UserState};
use ideaboard::token_store::InMemoryTokenStore;
use serde_json::json;

mod common;
use common::{access_token, auth_context, bearer, json_body, seed_user, PASSWORD};

macro_rules! app {
    ($repo:expr) => {
        app!($repo, None)
    };
    ($repo:expr, $service_token:expr) => {
        test::init_service(
            App::new()
                .wrap(JwtAuthorization::new(auth_context(
                    &$repo,
                    Arc::new(InMemoryTokenStore::new()),
                    AllowList::public_defaults().with("/api/v1/users/signup").with("/api/v1/internal/**"),
                )))
                .app_data(web::Data::new(
                    UserState::new(Arc::new($repo.clone())).with_service_token($service_token),
                ))
                .configure(routes::common)
                .configure(routes::users::config),
        )
        .await
    };
}

#[actix_web::test]
async fn signup_validates_and_rejects_duplicates() {
    let repo = InMemRepo::new();
    let app = app!(repo);

    let req = test::TestRequest::post()
        .uri("/api/v1/users/signup")
        .set_json(&json!({"username": "new.user", "password": "long-enough"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let v = json_body(resp).await;
    assert_eq!(v["username"], "new.user");
    assert_eq!(v["role_type"], "USER");
    assert!(v.get("password_hash").is_none());

    let req = test::TestRequest::post()
        .uri("/api/v1/users/signup")
        .set_json(&json!({"username": "new.user", "password": "long-enough"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);

    for bad in [
        json!({"username": "ab", "password": "long-enough"}),
        json!({"username": "has space", "password": "long-enough"}),
        json!({"username": "fine", "password": "short"}),
    ] {
        let req = test::TestRequest::post().uri("/api/v1/users/signup").set_json(&bad).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }
}

#[actix_web::test]
async fn role_listing_is_admin_only() {
    let repo = InMemRepo::new();
    let root = seed_user(&repo, "root", RoleType::Admin).await;
    let bob = seed_user(&repo, "bob", RoleType::User).await;
    let app = app!(repo);

    let req = test::TestRequest::get()
        .uri("/api/v1/users?role=ADMIN")
        .insert_header(bearer(&access_token(&bob)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::get()
        .uri("/api/v1/users?role=ADMIN")
        .insert_header(bearer(&access_token(&root)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let admins = json_body(resp).await;
    assert_eq!(admins.as_array().unwrap().len(), 1);
    assert_eq!(admins[0]["username"], "root");

    let req = test::TestRequest::get()
        .uri("/api/v1/users?role=OWNER")
        .insert_header(bearer(&access_token(&root)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn admin_changes_roles() {
    let repo = InMemRepo::new();
    let root = seed_user(&repo, "root", RoleType::Admin).await;
    let bob = seed_user(&repo, "bob", RoleType::User).await;
    let app = app!(repo);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/users/{}/role", bob.id))
        .insert_header(bearer(&access_token(&bob)))
        .set_json(&json!({"role_type": "ADMIN"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/users/{}/role", bob.id))
        .insert_header(bearer(&access_token(&root)))
        .set_json(&json!({"role_type": "ADMIN"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await["role_type"], "ADMIN");

    let req = test::TestRequest::patch()
        .uri("/api/v1/users/999/role")
        .insert_header(bearer(&access_token(&root)))
        .set_json(&json!({"role_type": "USER"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::patch()
        .uri("/api/v1/users/not-a-number/role")
        .insert_header(bearer(&access_token(&root)))
        .set_json(&json!({"role_type": "USER"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn lookups_by_username() {
    let repo = InMemRepo::new();
    let bob = seed_user(&repo, "bob", RoleType::User).await;
    let app = app!(repo);

    let req = test::TestRequest::get().uri("/api/v1/users/me").insert_header(bearer(&access_token(&bob))).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await["id"], bob.id);

    let req = test::TestRequest::get()
        .uri("/api/v1/users/by-username/nobody")
        .insert_header(bearer(&access_token(&bob)))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::get().uri("/api/v1/users/by-username/bob").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn internal_endpoints_serve_other_services() {
    let repo = InMemRepo::new();
    let bob = seed_user(&repo, "bob", RoleType::User).await;
    let app = app!(repo);

    let req = test::TestRequest::get().uri("/api/v1/internal/users/bob").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await["id"], bob.id);

    let req = test::TestRequest::get().uri("/api/v1/internal/users/ghost").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::get().uri(&format!("/api/v1/internal/users/by-id/{}", bob.id)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await["username"], "bob");

    let req = test::TestRequest::get().uri("/api/v1/internal/users/by-id/424242").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri("/api/v1/internal/auth/verify")
        .set_json(&json!({"username": "bob", "password": PASSWORD}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await["username"], "bob");

    let req = test::TestRequest::post()
        .uri("/api/v1/internal/auth/verify")
        .set_json(&json!({"username": "bob", "password": "nope-nope"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn username_verify_is_an_ordinary_lookup() {
    let repo = InMemRepo::new();
    let verify = seed_user(&repo, "verify", RoleType::User).await;
    let app = app!(repo);

    let req = test::TestRequest::get().uri("/api/v1/internal/users/verify").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(json_body(resp).await["id"], verify.id);

    let req = test::TestRequest::get().uri("/api/v1/internal/users/by-id").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn internal_endpoints_require_the_service_token_when_configured() {
    let repo = InMemRepo::new();
    seed_user(&repo, "bob", RoleType::User).await;
    let app = app!(repo, Some("s3cret".to_string()));

    let req = test::TestRequest::get().uri("/api/v1/internal/users/bob").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post()
        .uri("/api/v1/internal/auth/verify")
        .insert_header(("X-Internal-Token", "wrong"))
        .set_json(&json!({"username": "bob", "password": PASSWORD}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::get()
        .uri("/api/v1/internal/users/bob")
        .insert_header(("X-Internal-Token", "s3cret"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::post()
        .uri("/api/v1/internal/auth/verify")
        .insert_header(("X-Internal-Token", "s3cret"))
        .set_json(&json!({"username": "bob", "password": PASSWORD}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
}
