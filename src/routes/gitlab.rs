//! Public GitLab lookup proxy served by the project service.

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::gitlab::GitLabProject;
use crate::routes::projects::ProjectState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GitLabSearch {
    /// Free-text filter forwarded to GitLab.
    pub search: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/gitlab/projects",
    params(GitLabSearch),
    responses(
        (status = 200, description = "Matching GitLab projects", body = [GitLabProject]),
        (status = 502, description = "GitLab unreachable")
    ),
    tag = "gitlab"
)]
pub async fn list_projects(
    data: web::Data<ProjectState>,
    query: web::Query<GitLabSearch>,
) -> Result<HttpResponse, ApiError> {
    let projects = data.gitlab.list_projects(query.search.as_deref()).await?;
    Ok(HttpResponse::Ok().json(projects))
}

#[utoipa::path(
    get,
    path = "/api/v1/gitlab/projects/{id}",
    params(("id" = u64, Path, description = "GitLab project id")),
    responses(
        (status = 200, description = "GitLab project", body = GitLabProject),
        (status = 404, description = "Unknown to GitLab")
    ),
    tag = "gitlab"
)]
pub async fn get_project(data: web::Data<ProjectState>, path: web::Path<u64>) -> Result<HttpResponse, ApiError> {
    let project = data.gitlab.get_project(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(project))
}
