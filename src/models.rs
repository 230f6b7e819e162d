use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleType {
    User,
    Admin,
}

impl RoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::User => "USER",
            RoleType::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role type: {0}")]
pub struct UnknownRoleType(pub String);

impl FromStr for RoleType {
    type Err = UnknownRoleType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USER" => Ok(RoleType::User),
            "ADMIN" => Ok(RoleType::Admin),
            _ => Err(UnknownRoleType(s.to_string())),
        }
    }
}

// ---------------- users ----------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role_type: RoleType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role_type: RoleType,
}

/// Public projection of a user; what other services receive.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserView {
    pub id: Id,
    pub username: String,
    pub role_type: RoleType,
}

/// Username/password pair used by login, signup and credential checks.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleUpdate {
    pub role_type: RoleType,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self { id: u.id, username: u.username.clone(), role_type: u.role_type }
    }
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        Self { id: u.id, username: u.username, role_type: u.role_type }
    }
}

// ---------------- projects ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
}

/// Membership row linking a user to a project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct UserProject {
    pub id: Id,
    pub user_id: Id,
    pub project_id: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddMember {
    pub user_id: Id,
}

// ---------------- ideas ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Idea {
    pub id: Id,
    pub project_id: Id,
    pub user_id: Id,
    pub service_name: String,
    pub background: String,
    pub introduction: String,
    pub target: String,
    pub expected_effect: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewIdea {
    pub service_name: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub introduction: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub expected_effect: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateIdea {
    pub service_name: Option<String>,
    pub background: Option<String>,
    pub introduction: Option<String>,
    pub target: Option<String>,
    pub expected_effect: Option<String>,
}

// ---------------- planner ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Planner {
    pub id: Id,
    pub idea_id: Id,
    pub content: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlannerUpdate {
    pub content: Option<String>,
    pub client_id: String,
}

pub const PLANNER_DOCUMENT_TYPE: &str = "planner";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlannerUpdateResponse {
    pub idea_id: Id,
    pub content: Option<String>,
    pub client_id: String,
    pub timestamp: i64,
    pub document_type: String,
    pub status: String,
}

impl PlannerUpdateResponse {
    pub fn from_planner(planner: &Planner, client_id: String, timestamp: i64) -> Self {
        Self {
            idea_id: planner.idea_id,
            content: planner.content.clone(),
            client_id,
            timestamp,
            document_type: PLANNER_DOCUMENT_TYPE.to_string(),
            status: "success".to_string(),
        }
    }
}

// ---------------- collaborative document operations ----------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Planner,
}

/// A single edit against a collaborative document. Carried as an envelope
/// only; nothing merges or applies it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOperation {
    pub document_id: String,
    pub user_id: String,
    pub idea_id: String,
    pub document_type: DocumentType,
    pub operation: String,
    pub data: Option<String>,
    pub version: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOperationAck {
    pub document_id: String,
    pub idea_id: Id,
    pub document_type: DocumentType,
    pub status: String,
}

// ---------------- requirements ----------------

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct ReqDocs {
    pub id: Id,
    pub idea_id: Id,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Req {
    pub id: Id,
    pub req_docs_id: Id,
    pub url: String,
    pub domain: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewReq {
    pub url: String,
    pub domain: String,
    pub description: Option<String>,
}

pub const REQ_FIELD_MAX_LEN: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReqDocsView {
    pub docs: ReqDocs,
    pub reqs: Vec<Req>,
}

// ---------------- comments ----------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTarget {
    Idea(Id),
    Project(Id),
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Comment {
    pub id: Id,
    pub user_id: Id,
    pub idea_id: Option<Id>,
    pub project_id: Option<Id>,
    pub content: String,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn target(&self) -> Option<CommentTarget> {
        match (self.idea_id, self.project_id) {
            (Some(i), None) => Some(CommentTarget::Idea(i)),
            (None, Some(p)) => Some(CommentTarget::Project(p)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewComment {
    pub comment_content: String,
    pub rating: f64,
}

pub const RATING_MIN: f64 = 0.0;
pub const RATING_MAX: f64 = 5.0;
