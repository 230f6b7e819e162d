use std::sync::Arc;

use actix_web::{web, HttpResponse};
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::clients::UserDirectory;
use crate::error::ApiError;
use crate::gitlab::GitLabClient;
use crate::models::*;
use crate::repo::ProjectStore;
use crate::routes::gitlab;

#[derive(Clone)]
pub struct ProjectState {
    pub store: Arc<dyn ProjectStore>,
    pub users: Arc<dyn UserDirectory>,
    pub gitlab: GitLabClient,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::resource("/projects")
                    .route(web::get().to(list_projects))
                    .route(web::post().to(create_project)),
            )
            .service(web::resource("/projects/{id}").route(web::get().to(get_project)))
            .service(
                web::resource("/projects/{id}/members")
                    .route(web::get().to(list_members))
                    .route(web::post().to(add_member)),
            )
            .service(web::resource("/projects/{id}/members/{user_id}").route(web::delete().to(remove_member)))
            .service(
                web::resource("/projects/{id}/ideas")
                    .route(web::get().to(list_ideas))
                    .route(web::post().to(create_idea)),
            )
            .service(
                web::resource("/projects/{id}/comments")
                    .route(web::get().to(list_project_comments))
                    .route(web::post().to(create_project_comment)),
            )
            .service(
                web::resource("/ideas/{id}")
                    .route(web::get().to(get_idea))
                    .route(web::patch().to(update_idea))
                    .route(web::delete().to(delete_idea)),
            )
            .service(
                web::resource("/ideas/{id}/planner")
                    .route(web::get().to(get_planner))
                    .route(web::put().to(update_planner)),
            )
            .service(web::resource("/ideas/{id}/operations").route(web::post().to(submit_operation)))
            .service(web::resource("/ideas/{id}/req-docs").route(web::get().to(get_req_docs)))
            .service(web::resource("/ideas/{id}/reqs").route(web::post().to(create_req)))
            .service(web::resource("/reqs/{id}").route(web::delete().to(delete_req)))
            .service(
                web::resource("/ideas/{id}/comments")
                    .route(web::get().to(list_idea_comments))
                    .route(web::post().to(create_idea_comment)),
            )
            // public, allow-listed
            .service(web::resource("/gitlab/projects").route(web::get().to(gitlab::list_projects)))
            .service(web::resource("/gitlab/projects/{id}").route(web::get().to(gitlab::get_project))),
    );
}

// ---------------- access helpers ----------------

async fn member_project(store: &dyn ProjectStore, project_id: Id, caller: &AuthUser) -> Result<Project, ApiError> {
    let project = store.find_project(project_id).await?.ok_or(ApiError::NotFound)?;
    if !store.is_member(project_id, caller.id).await? {
        return Err(ApiError::Forbidden);
    }
    Ok(project)
}

async fn member_idea(store: &dyn ProjectStore, idea_id: Id, caller: &AuthUser) -> Result<Idea, ApiError> {
    let idea = store.find_idea(idea_id).await?.ok_or(ApiError::NotFound)?;
    member_project(store, idea.project_id, caller).await?;
    Ok(idea)
}

fn require_text(field: &str, value: &str, max: Option<usize>) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be blank")));
    }
    if let Some(max) = max {
        if value.chars().count() > max {
            return Err(ApiError::BadRequest(format!("{field} exceeds {max} characters")));
        }
    }
    Ok(())
}

// ---------------- projects ----------------

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    request_body = NewProject,
    responses(
        (status = 201, description = "Project created; caller becomes a member", body = Project),
        (status = 400, description = "Blank name")
    ),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn create_project(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    body: web::Json<NewProject>,
) -> Result<HttpResponse, ApiError> {
    let new = body.into_inner();
    require_text("name", &new.name, None)?;
    let project = data.store.create_project(auth.id, new).await?;
    info!(project = project.id, owner = auth.id, "project created");
    Ok(HttpResponse::Created().json(project))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    responses((status = 200, description = "Projects the caller belongs to", body = [Project])),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn list_projects(auth: AuthUser, data: web::Data<ProjectState>) -> Result<HttpResponse, ApiError> {
    let projects = data.store.list_projects_for_user(auth.id).await?;
    Ok(HttpResponse::Ok().json(projects))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}",
    params(("id" = Id, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 403, description = "Not a member"),
        (status = 404, description = "No such project")
    ),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn get_project(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let project = member_project(data.store.as_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(project))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/members",
    params(("id" = Id, Path, description = "Project id")),
    responses((status = 200, description = "Membership rows", body = [UserProject])),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn list_members(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let project = member_project(data.store.as_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(data.store.list_members(project.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/members",
    params(("id" = Id, Path, description = "Project id")),
    request_body = AddMember,
    responses(
        (status = 201, description = "Member added", body = UserProject),
        (status = 404, description = "No such project or user"),
        (status = 409, description = "Already a member")
    ),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn add_member(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
    body: web::Json<AddMember>,
) -> Result<HttpResponse, ApiError> {
    let project = member_project(data.store.as_ref(), path.into_inner(), &auth).await?;
    // accounts live in the user service
    let user = data.users.find_user(body.user_id).await?.ok_or(ApiError::NotFound)?;
    let membership = data.store.add_member(project.id, user.id).await?;
    info!(project = project.id, user = body.user_id, "member added");
    Ok(HttpResponse::Created().json(membership))
}

#[utoipa::path(
    delete,
    path = "/api/v1/projects/{id}/members/{user_id}",
    params(
        ("id" = Id, Path, description = "Project id"),
        ("user_id" = Id, Path, description = "Member to remove")
    ),
    responses(
        (status = 204, description = "Member removed"),
        (status = 404, description = "Not a member")
    ),
    security(("bearer_auth" = [])),
    tag = "projects"
)]
pub async fn remove_member(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<(Id, Id)>,
) -> Result<HttpResponse, ApiError> {
    let (project_id, user_id) = path.into_inner();
    member_project(data.store.as_ref(), project_id, &auth).await?;
    data.store.remove_member(project_id, user_id).await?;
    info!(project = project_id, user = user_id, "member removed");
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- ideas ----------------

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/ideas",
    params(("id" = Id, Path, description = "Project id")),
    request_body = NewIdea,
    responses(
        (status = 201, description = "Idea created with empty planner and requirements", body = Idea),
        (status = 403, description = "Not a member")
    ),
    security(("bearer_auth" = [])),
    tag = "ideas"
)]
pub async fn create_idea(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
    body: web::Json<NewIdea>,
) -> Result<HttpResponse, ApiError> {
    let project = member_project(data.store.as_ref(), path.into_inner(), &auth).await?;
    let new = body.into_inner();
    require_text("service_name", &new.service_name, None)?;
    let idea = data.store.create_idea(project.id, auth.id, new).await?;
    info!(idea = idea.id, project = project.id, "idea created");
    Ok(HttpResponse::Created().json(idea))
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/ideas",
    params(("id" = Id, Path, description = "Project id")),
    responses((status = 200, description = "Ideas of the project", body = [Idea])),
    security(("bearer_auth" = [])),
    tag = "ideas"
)]
pub async fn list_ideas(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let project = member_project(data.store.as_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(data.store.list_ideas(project.id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/ideas/{id}",
    params(("id" = Id, Path, description = "Idea id")),
    responses((status = 200, description = "Idea", body = Idea), (status = 404, description = "No such idea")),
    security(("bearer_auth" = [])),
    tag = "ideas"
)]
pub async fn get_idea(auth: AuthUser, data: web::Data<ProjectState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let idea = member_idea(data.store.as_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(idea))
}

#[utoipa::path(
    patch,
    path = "/api/v1/ideas/{id}",
    params(("id" = Id, Path, description = "Idea id")),
    request_body = UpdateIdea,
    responses((status = 200, description = "Updated idea", body = Idea)),
    security(("bearer_auth" = [])),
    tag = "ideas"
)]
pub async fn update_idea(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
    body: web::Json<UpdateIdea>,
) -> Result<HttpResponse, ApiError> {
    let idea = member_idea(data.store.as_ref(), path.into_inner(), &auth).await?;
    let upd = body.into_inner();
    if let Some(name) = &upd.service_name {
        require_text("service_name", name, None)?;
    }
    Ok(HttpResponse::Ok().json(data.store.update_idea(idea.id, upd).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/ideas/{id}",
    params(("id" = Id, Path, description = "Idea id")),
    responses((status = 204, description = "Idea and its planner, requirements and comments removed")),
    security(("bearer_auth" = [])),
    tag = "ideas"
)]
pub async fn delete_idea(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let idea = member_idea(data.store.as_ref(), path.into_inner(), &auth).await?;
    data.store.delete_idea(idea.id).await?;
    info!(idea = idea.id, by = auth.id, "idea deleted");
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- planner & document operations ----------------

#[utoipa::path(
    get,
    path = "/api/v1/ideas/{id}/planner",
    params(("id" = Id, Path, description = "Idea id")),
    responses((status = 200, description = "Planner of the idea", body = Planner)),
    security(("bearer_auth" = [])),
    tag = "planner"
)]
pub async fn get_planner(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let idea = member_idea(data.store.as_ref(), path.into_inner(), &auth).await?;
    let planner = data.store.find_planner_by_idea(idea.id).await?.ok_or(ApiError::NotFound)?;
    Ok(HttpResponse::Ok().json(planner))
}

#[utoipa::path(
    put,
    path = "/api/v1/ideas/{id}/planner",
    params(("id" = Id, Path, description = "Idea id")),
    request_body = PlannerUpdate,
    responses((status = 200, description = "Planner content replaced", body = PlannerUpdateResponse)),
    security(("bearer_auth" = [])),
    tag = "planner"
)]
pub async fn update_planner(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
    body: web::Json<PlannerUpdate>,
) -> Result<HttpResponse, ApiError> {
    let idea = member_idea(data.store.as_ref(), path.into_inner(), &auth).await?;
    let PlannerUpdate { content, client_id } = body.into_inner();
    let planner = data.store.update_planner_content(idea.id, content).await?;
    debug!(idea = idea.id, client = %client_id, "planner content replaced");
    let now = chrono::Utc::now().timestamp_millis();
    Ok(HttpResponse::Ok().json(PlannerUpdateResponse::from_planner(&planner, client_id, now)))
}

#[utoipa::path(
    post,
    path = "/api/v1/ideas/{id}/operations",
    params(("id" = Id, Path, description = "Idea id")),
    request_body = DocumentOperation,
    responses(
        (status = 202, description = "Operation accepted", body = DocumentOperationAck),
        (status = 400, description = "Operation targets another idea or document type")
    ),
    security(("bearer_auth" = [])),
    tag = "planner"
)]
pub async fn submit_operation(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
    body: web::Json<DocumentOperation>,
) -> Result<HttpResponse, ApiError> {
    let idea_id = path.into_inner();
    let op = body.into_inner();
    if op.idea_id.trim().parse::<Id>().ok() != Some(idea_id) {
        return Err(ApiError::BadRequest("ideaId does not match the addressed idea".into()));
    }
    let idea = member_idea(data.store.as_ref(), idea_id, &auth).await?;
    debug!(idea = idea.id, document = %op.document_id, operation = %op.operation, "document operation accepted");
    Ok(HttpResponse::Accepted().json(DocumentOperationAck {
        document_id: op.document_id,
        idea_id: idea.id,
        document_type: op.document_type,
        status: "accepted".into(),
    }))
}

// ---------------- requirements ----------------

#[utoipa::path(
    get,
    path = "/api/v1/ideas/{id}/req-docs",
    params(("id" = Id, Path, description = "Idea id")),
    responses((status = 200, description = "Requirements document with its entries", body = ReqDocsView)),
    security(("bearer_auth" = [])),
    tag = "requirements"
)]
pub async fn get_req_docs(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let idea = member_idea(data.store.as_ref(), path.into_inner(), &auth).await?;
    let docs = data.store.find_req_docs_by_idea(idea.id).await?.ok_or(ApiError::NotFound)?;
    let reqs = data.store.list_reqs(docs.id).await?;
    Ok(HttpResponse::Ok().json(ReqDocsView { docs, reqs }))
}

#[utoipa::path(
    post,
    path = "/api/v1/ideas/{id}/reqs",
    params(("id" = Id, Path, description = "Idea id")),
    request_body = NewReq,
    responses(
        (status = 201, description = "Requirement added", body = Req),
        (status = 400, description = "Blank or over-long field")
    ),
    security(("bearer_auth" = [])),
    tag = "requirements"
)]
pub async fn create_req(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
    body: web::Json<NewReq>,
) -> Result<HttpResponse, ApiError> {
    let idea = member_idea(data.store.as_ref(), path.into_inner(), &auth).await?;
    let new = body.into_inner();
    require_text("url", &new.url, Some(REQ_FIELD_MAX_LEN))?;
    require_text("domain", &new.domain, Some(REQ_FIELD_MAX_LEN))?;
    if let Some(desc) = &new.description {
        if desc.chars().count() > REQ_FIELD_MAX_LEN {
            return Err(ApiError::BadRequest(format!("description exceeds {REQ_FIELD_MAX_LEN} characters")));
        }
    }
    let docs = data.store.find_req_docs_by_idea(idea.id).await?.ok_or(ApiError::NotFound)?;
    let req = data.store.create_req(docs.id, new).await?;
    Ok(HttpResponse::Created().json(req))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reqs/{id}",
    params(("id" = Id, Path, description = "Requirement id")),
    responses((status = 204, description = "Requirement removed"), (status = 404, description = "No such requirement")),
    security(("bearer_auth" = [])),
    tag = "requirements"
)]
pub async fn delete_req(auth: AuthUser, data: web::Data<ProjectState>, path: web::Path<Id>) -> Result<HttpResponse, ApiError> {
    let store = data.store.as_ref();
    let req = store.find_req(path.into_inner()).await?.ok_or(ApiError::NotFound)?;
    let docs = store.find_req_docs(req.req_docs_id).await?.ok_or(ApiError::NotFound)?;
    member_idea(store, docs.idea_id, &auth).await?;
    store.delete_req(req.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- comments ----------------

fn validate_comment(c: &NewComment) -> Result<(), ApiError> {
    require_text("comment_content", &c.comment_content, None)?;
    if !c.rating.is_finite() || !(RATING_MIN..=RATING_MAX).contains(&c.rating) {
        return Err(ApiError::BadRequest(format!("rating must be between {RATING_MIN} and {RATING_MAX}")));
    }
    Ok(())
}

async fn post_comment(
    auth: &AuthUser,
    data: &ProjectState,
    target: CommentTarget,
    new: NewComment,
) -> Result<HttpResponse, ApiError> {
    validate_comment(&new)?;
    let comment = data.store.create_comment(auth.id, target, new).await?;
    Ok(HttpResponse::Created().json(comment))
}

#[utoipa::path(
    post,
    path = "/api/v1/ideas/{id}/comments",
    params(("id" = Id, Path, description = "Idea id")),
    request_body = NewComment,
    responses((status = 201, description = "Comment added", body = Comment)),
    security(("bearer_auth" = [])),
    tag = "comments"
)]
pub async fn create_idea_comment(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
    body: web::Json<NewComment>,
) -> Result<HttpResponse, ApiError> {
    let idea = member_idea(data.store.as_ref(), path.into_inner(), &auth).await?;
    post_comment(&auth, &data, CommentTarget::Idea(idea.id), body.into_inner()).await
}

#[utoipa::path(
    get,
    path = "/api/v1/ideas/{id}/comments",
    params(("id" = Id, Path, description = "Idea id")),
    responses((status = 200, description = "Comments on the idea", body = [Comment])),
    security(("bearer_auth" = [])),
    tag = "comments"
)]
pub async fn list_idea_comments(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let idea = member_idea(data.store.as_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(data.store.list_comments(CommentTarget::Idea(idea.id)).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{id}/comments",
    params(("id" = Id, Path, description = "Project id")),
    request_body = NewComment,
    responses((status = 201, description = "Comment added", body = Comment)),
    security(("bearer_auth" = [])),
    tag = "comments"
)]
pub async fn create_project_comment(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
    body: web::Json<NewComment>,
) -> Result<HttpResponse, ApiError> {
    let project = member_project(data.store.as_ref(), path.into_inner(), &auth).await?;
    post_comment(&auth, &data, CommentTarget::Project(project.id), body.into_inner()).await
}

#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/comments",
    params(("id" = Id, Path, description = "Project id")),
    responses((status = 200, description = "Comments on the project", body = [Comment])),
    security(("bearer_auth" = [])),
    tag = "comments"
)]
pub async fn list_project_comments(
    auth: AuthUser,
    data: web::Data<ProjectState>,
    path: web::Path<Id>,
) -> Result<HttpResponse, ApiError> {
    let project = member_project(data.store.as_ref(), path.into_inner(), &auth).await?;
    Ok(HttpResponse::Ok().json(data.store.list_comments(CommentTarget::Project(project.id)).await?))
}
