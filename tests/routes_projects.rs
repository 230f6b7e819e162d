use std::sync::Arc;

use actix_web::{test, web, App};
use ideaboard::clients::RepoUserDirectory;
use ideaboard::filter::{AllowList, JwtAuthorization};
use ideaboard::gitlab::GitLabClient;
use ideaboard::models::RoleType;
use ideaboard::repo::inmem::InMemRepo;
use ideaboard::retry::RetryPolicy;
use ideaboard::routes::{self, projects::ProjectState};
use ideaboard::token_store::InMemoryTokenStore;
use serde_json::json;

mod common;
use common::{access_token, auth_context, bearer, json_body, seed_user};

macro_rules! app {
    ($repo:expr, $gitlab:expr) => {
        test::init_service(
            App::new()
                .wrap(JwtAuthorization::new(auth_context(
                    &$repo,
                    Arc::new(InMemoryTokenStore::new()),
                    AllowList::public_defaults(),
                )))
                .app_data(web::Data::new(ProjectState {
                    store: Arc::new($repo.clone()),
                    users: Arc::new(RepoUserDirectory::new(Arc::new($repo.clone()))),
                    gitlab: $gitlab,
                }))
                .configure(routes::common)
                .configure(routes::projects::config),
        )
        .await
    };
}

fn offline_gitlab() -> GitLabClient {
    GitLabClient::new("http://127.0.0.1:9", None, RetryPolicy::no_retry()).unwrap()
}

#[actix_web::test]
async fn membership_gates_project_access() {
    let repo = InMemRepo::new();
    let alice = seed_user(&repo, "alice", RoleType::User).await;
    let bob = seed_user(&repo, "bob", RoleType::User).await;
    let (ta, tb) = (access_token(&alice), access_token(&bob));
    let app = app!(repo, offline_gitlab());

    let req = test::TestRequest::post()
        .uri("/api/v1/projects")
        .insert_header(bearer(&ta))
        .set_json(&json!({"name": "capstone", "description": "team project"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let project = json_body(resp).await;
    let pid = project["id"].as_i64().unwrap();
    assert_eq!(project["created_by"], alice.id);

    let req = test::TestRequest::post()
        .uri("/api/v1/projects")
        .insert_header(bearer(&ta))
        .set_json(&json!({"name": "  "}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::get().uri(&format!("/api/v1/projects/{pid}")).insert_header(bearer(&tb)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/{pid}/members"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"user_id": 424242}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/{pid}/members"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"user_id": bob.id}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/projects/{pid}/members"))
        .insert_header(bearer(&ta))
        .to_request();
    let members = json_body(test::call_service(&app, req).await).await;
    assert!(members.as_array().unwrap().iter().all(|m| m["user_id"] != 424242));

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/{pid}/members"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"user_id": bob.id}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 409);

    let req = test::TestRequest::get().uri(&format!("/api/v1/projects/{pid}")).insert_header(bearer(&tb)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);

    let req = test::TestRequest::get().uri("/api/v1/projects").insert_header(bearer(&tb)).to_request();
    let mine = json_body(test::call_service(&app, req).await).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/projects/{pid}/members/{}", bob.id))
        .insert_header(bearer(&ta))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/projects/{pid}/members"))
        .insert_header(bearer(&tb))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = test::TestRequest::get().uri("/api/v1/projects/4242").insert_header(bearer(&ta)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::get().uri("/api/v1/projects").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}

#[actix_web::test]
async fn idea_lifecycle_with_planner_reqs_and_comments() {
    let repo = InMemRepo::new();
    let alice = seed_user(&repo, "alice", RoleType::User).await;
    let ta = access_token(&alice);
    let app = app!(repo, offline_gitlab());

    let req = test::TestRequest::post()
        .uri("/api/v1/projects")
        .insert_header(bearer(&ta))
        .set_json(&json!({"name": "capstone"}))
        .to_request();
    let pid = json_body(test::call_service(&app, req).await).await["id"].as_i64().unwrap();

    // idea
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/{pid}/ideas"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"service_name": "study buddy", "background": "students study alone"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let iid = json_body(resp).await["id"].as_i64().unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/api/v1/ideas/{iid}"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"target": "freshmen"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let idea = json_body(resp).await;
    assert_eq!(idea["target"], "freshmen");
    assert_eq!(idea["service_name"], "study buddy");

    // planner
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/ideas/{iid}/planner"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"content": "# Plan", "client_id": "tab-1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let ack = json_body(resp).await;
    assert_eq!(ack["ideaId"], iid);
    assert_eq!(ack["clientId"], "tab-1");
    assert_eq!(ack["documentType"], "planner");
    assert!(ack["timestamp"].as_i64().unwrap() > 1_600_000_000_000);

    let req = test::TestRequest::get().uri(&format!("/api/v1/ideas/{iid}/planner")).insert_header(bearer(&ta)).to_request();
    assert_eq!(json_body(test::call_service(&app, req).await).await["content"], "# Plan");

    // document operations
    let op = |idea: String, doc_type: &str| {
        json!({
            "documentId": "planner-1", "userId": "alice", "ideaId": idea,
            "documentType": doc_type, "operation": "insert", "data": "x"
        })
    };
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/ideas/{iid}/operations"))
        .insert_header(bearer(&ta))
        .set_json(&op(iid.to_string(), "PLANNER"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 202);
    assert_eq!(json_body(resp).await["status"], "accepted");

    for body in [op("999".into(), "PLANNER"), op(iid.to_string(), "ERD")] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/ideas/{iid}/operations"))
            .insert_header(bearer(&ta))
            .set_json(&body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    // requirements
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/ideas/{iid}/reqs"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"url": "https://example.com/brief", "domain": "example.com"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let rid = json_body(resp).await["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/ideas/{iid}/reqs"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"url": "x".repeat(1001), "domain": "example.com"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::get().uri(&format!("/api/v1/ideas/{iid}/req-docs")).insert_header(bearer(&ta)).to_request();
    let docs = json_body(test::call_service(&app, req).await).await;
    assert_eq!(docs["docs"]["idea_id"], iid);
    assert_eq!(docs["reqs"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::delete().uri(&format!("/api/v1/reqs/{rid}")).insert_header(bearer(&ta)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    let req = test::TestRequest::delete().uri(&format!("/api/v1/reqs/{rid}")).insert_header(bearer(&ta)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    // comments
    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/ideas/{iid}/comments"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"comment_content": "love it", "rating": 6}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/ideas/{iid}/comments"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"comment_content": "love it", "rating": 4.5}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    assert_eq!(json_body(resp).await["content"], "love it");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/projects/{pid}/comments"))
        .insert_header(bearer(&ta))
        .set_json(&json!({"comment_content": "solid team", "rating": 5}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let req = test::TestRequest::get().uri(&format!("/api/v1/ideas/{iid}/comments")).insert_header(bearer(&ta)).to_request();
    assert_eq!(json_body(test::call_service(&app, req).await).await.as_array().unwrap().len(), 1);

    // cascade delete
    let req = test::TestRequest::delete().uri(&format!("/api/v1/ideas/{iid}")).insert_header(bearer(&ta)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 204);
    assert_eq!(repo.orphan_counts(iid).unwrap(), (0, 0, 0));

    let req = test::TestRequest::get().uri(&format!("/api/v1/ideas/{iid}")).insert_header(bearer(&ta)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);

    let req = test::TestRequest::get().uri(&format!("/api/v1/projects/{pid}/comments")).insert_header(bearer(&ta)).to_request();
    assert_eq!(json_body(test::call_service(&app, req).await).await.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn gitlab_proxy_is_public_and_reports_outage() {
    let repo = InMemRepo::new();
    let app = app!(repo, offline_gitlab());
    let req = test::TestRequest::get().uri("/api/v1/gitlab/projects?search=rust").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 502);
}
