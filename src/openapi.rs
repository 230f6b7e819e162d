use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::AuthTokens;
use crate::gitlab::GitLabProject;
use crate::models::*;
use crate::routes::auth::ReissueRequest;

/// Registers the `bearer_auth` scheme referenced by protected paths.
pub struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::auth::login,
        crate::routes::auth::reissue,
        crate::routes::auth::logout,
        crate::routes::auth::me,
    ),
    components(schemas(Credentials, AuthTokens, ReissueRequest, UserView, RoleType)),
    modifiers(&BearerSecurity),
    tags((name = "auth", description = "Login and token lifecycle"))
)]
pub struct AuthApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::users::signup,
        crate::routes::users::me,
        crate::routes::users::list_by_role,
        crate::routes::users::by_username,
        crate::routes::users::update_role,
        crate::routes::users::internal_find,
        crate::routes::users::internal_find_by_id,
        crate::routes::users::internal_verify,
    ),
    components(schemas(Credentials, UserView, RoleType, RoleUpdate)),
    modifiers(&BearerSecurity),
    tags(
        (name = "users", description = "Accounts and roles"),
        (name = "internal", description = "Service-to-service lookups"),
    )
)]
pub struct UserApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::projects::create_project,
        crate::routes::projects::list_projects,
        crate::routes::projects::get_project,
        crate::routes::projects::list_members,
        crate::routes::projects::add_member,
        crate::routes::projects::remove_member,
        crate::routes::projects::create_idea,
        crate::routes::projects::list_ideas,
        crate::routes::projects::get_idea,
        crate::routes::projects::update_idea,
        crate::routes::projects::delete_idea,
        crate::routes::projects::get_planner,
        crate::routes::projects::update_planner,
        crate::routes::projects::submit_operation,
        crate::routes::projects::get_req_docs,
        crate::routes::projects::create_req,
        crate::routes::projects::delete_req,
        crate::routes::projects::create_idea_comment,
        crate::routes::projects::list_idea_comments,
        crate::routes::projects::create_project_comment,
        crate::routes::projects::list_project_comments,
        crate::routes::gitlab::list_projects,
        crate::routes::gitlab::get_project,
    ),
    components(schemas(
        Project, NewProject, UserProject, AddMember,
        Idea, NewIdea, UpdateIdea,
        Planner, PlannerUpdate, PlannerUpdateResponse,
        DocumentType, DocumentOperation, DocumentOperationAck,
        ReqDocs, Req, NewReq, ReqDocsView,
        Comment, NewComment, GitLabProject
    )),
    modifiers(&BearerSecurity),
    tags(
        (name = "projects", description = "Projects and membership"),
        (name = "ideas", description = "Ideas inside a project"),
        (name = "planner", description = "Planner documents"),
        (name = "requirements", description = "Requirement documents"),
        (name = "comments", description = "Rated comments"),
        (name = "gitlab", description = "GitLab lookup proxy"),
    )
)]
pub struct ProjectApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_register_bearer_scheme() {
        for doc in [AuthApiDoc::openapi(), UserApiDoc::openapi(), ProjectApiDoc::openapi()] {
            let components = doc.components.expect("components");
            assert!(components.security_schemes.contains_key("bearer_auth"));
        }
    }

    #[test]
    fn project_document_lists_planner_path() {
        let doc = ProjectApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/ideas/{id}/planner"));
    }
}
