//! Typed lookups and mutations over the entity stores.
//!
//! Lookups return `Option`/`Vec`; absence is never an error here. Mutations
//! report `NotFound` when the row (or a required parent) is missing.

use async_trait::async_trait;

use crate::models::*;

pub mod inmem;
pub mod pg;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn find_all_by_role_type(&self, role_type: RoleType) -> RepoResult<Vec<User>>;
    async fn find_user(&self, id: Id) -> RepoResult<Option<User>>;
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn update_role_type(&self, id: Id, role_type: RoleType) -> RepoResult<User>;
}

#[async_trait]
pub trait ProjectRepo: Send + Sync {
    /// Creates the project and grants `owner` membership.
    async fn create_project(&self, owner: Id, new: NewProject) -> RepoResult<Project>;
    async fn find_project(&self, id: Id) -> RepoResult<Option<Project>>;
    async fn list_projects_for_user(&self, user_id: Id) -> RepoResult<Vec<Project>>;
    async fn add_member(&self, project_id: Id, user_id: Id) -> RepoResult<UserProject>;
    async fn remove_member(&self, project_id: Id, user_id: Id) -> RepoResult<()>;
    async fn list_members(&self, project_id: Id) -> RepoResult<Vec<UserProject>>;
    async fn is_member(&self, project_id: Id, user_id: Id) -> RepoResult<bool>;
}

#[async_trait]
pub trait IdeaRepo: Send + Sync {
    /// Creates the idea together with its empty planner and requirements docs.
    async fn create_idea(&self, project_id: Id, author: Id, new: NewIdea) -> RepoResult<Idea>;
    async fn find_idea(&self, id: Id) -> RepoResult<Option<Idea>>;
    async fn list_ideas(&self, project_id: Id) -> RepoResult<Vec<Idea>>;
    async fn update_idea(&self, id: Id, upd: UpdateIdea) -> RepoResult<Idea>;
    /// Removes the idea and everything hanging off it: planner, requirements
    /// docs with their reqs, and comments.
    async fn delete_idea(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait PlannerRepo: Send + Sync {
    async fn find_planner_by_idea(&self, idea_id: Id) -> RepoResult<Option<Planner>>;
    async fn update_planner_content(&self, idea_id: Id, content: Option<String>) -> RepoResult<Planner>;
}

#[async_trait]
pub trait ReqRepo: Send + Sync {
    async fn find_req_docs(&self, id: Id) -> RepoResult<Option<ReqDocs>>;
    async fn find_req_docs_by_idea(&self, idea_id: Id) -> RepoResult<Option<ReqDocs>>;
    async fn list_reqs(&self, req_docs_id: Id) -> RepoResult<Vec<Req>>;
    async fn find_req(&self, id: Id) -> RepoResult<Option<Req>>;
    async fn create_req(&self, req_docs_id: Id, new: NewReq) -> RepoResult<Req>;
    async fn delete_req(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn create_comment(&self, user_id: Id, target: CommentTarget, new: NewComment) -> RepoResult<Comment>;
    async fn list_comments(&self, target: CommentTarget) -> RepoResult<Vec<Comment>>;
}

/// Everything the project service persists.
pub trait ProjectStore: ProjectRepo + IdeaRepo + PlannerRepo + ReqRepo + CommentRepo {}

impl<T> ProjectStore for T where T: ProjectRepo + IdeaRepo + PlannerRepo + ReqRepo + CommentRepo {}
