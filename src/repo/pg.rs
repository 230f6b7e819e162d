use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::*;

const USER_COLUMNS: &str = "id, username, password_hash, role_type, created_at, updated_at";
const IDEA_COLUMNS: &str =
    "id, project_id, user_id, service_name, background, introduction, target, expected_effect, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, user_id, idea_id, project_id, content, rating, created_at, updated_at";

#[derive(Clone)]
pub struct PgRepo { pool: Pool<Postgres> }

impl PgRepo {
    pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn db_err(e: sqlx::Error) -> RepoError {
    if let sqlx::Error::RowNotFound = e {
        return RepoError::NotFound;
    }
    let code = e.as_database_error().and_then(|d| d.code()).map(|c| c.into_owned());
    match code.as_deref() {
        Some("23505") => RepoError::Conflict,   // unique_violation
        Some("23503") => RepoError::NotFound,   // foreign_key_violation: parent missing
        _ => RepoError::Internal(e.to_string()),
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Id,
    username: String,
    password_hash: String,
    role_type: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepoError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        let role_type = r.role_type.parse().map_err(|e: UnknownRoleType| RepoError::Internal(e.to_string()))?;
        Ok(User {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            role_type,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool).await.map_err(db_err)?;
        row.map(User::try_from).transpose()
    }

    async fn find_all_by_role_type(&self, role_type: RoleType) -> RepoResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE role_type = $1 ORDER BY id"))
            .bind(role_type.as_str())
            .fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn find_user(&self, id: Id) -> RepoResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(db_err)?;
        row.map(User::try_from).transpose()
    }

    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (username, password_hash, role_type) VALUES ($1,$2,$3) RETURNING {USER_COLUMNS}"
        ))
            .bind(&new.username).bind(&new.password_hash).bind(new.role_type.as_str())
            .fetch_one(&self.pool).await.map_err(db_err)?;
        User::try_from(row)
    }

    async fn update_role_type(&self, id: Id, role_type: RoleType) -> RepoResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET role_type = $2, updated_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
            .bind(id).bind(role_type.as_str())
            .fetch_one(&self.pool).await.map_err(db_err)?;
        User::try_from(row)
    }
}

#[async_trait]
impl ProjectRepo for PgRepo {
    async fn create_project(&self, owner: Id, new: NewProject) -> RepoResult<Project> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let project = sqlx::query_as::<_, Project>(
            "INSERT INTO projects (name, description, created_by) VALUES ($1,$2,$3)
             RETURNING id, name, description, created_by, created_at, updated_at"
        )
            .bind(&new.name).bind(new.description.as_ref()).bind(owner)
            .fetch_one(&mut *tx).await.map_err(db_err)?;
        sqlx::query("INSERT INTO user_projects (user_id, project_id) VALUES ($1,$2)")
            .bind(owner).bind(project.id)
            .execute(&mut *tx).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(project)
    }

    async fn find_project(&self, id: Id) -> RepoResult<Option<Project>> {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, description, created_by, created_at, updated_at FROM projects WHERE id = $1"
        )
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(db_err)
    }

    async fn list_projects_for_user(&self, user_id: Id) -> RepoResult<Vec<Project>> {
        sqlx::query_as::<_, Project>(r#"
            SELECT p.id, p.name, p.description, p.created_by, p.created_at, p.updated_at
            FROM projects p
            JOIN user_projects up ON up.project_id = p.id
            WHERE up.user_id = $1
            ORDER BY p.id
        "#)
            .bind(user_id)
            .fetch_all(&self.pool).await.map_err(db_err)
    }

    async fn add_member(&self, project_id: Id, user_id: Id) -> RepoResult<UserProject> {
        sqlx::query_as::<_, UserProject>(
            "INSERT INTO user_projects (user_id, project_id) VALUES ($1,$2)
             RETURNING id, user_id, project_id, created_at, updated_at"
        )
            .bind(user_id).bind(project_id)
            .fetch_one(&self.pool).await.map_err(db_err)
    }

    async fn remove_member(&self, project_id: Id, user_id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM user_projects WHERE project_id = $1 AND user_id = $2")
            .bind(project_id).bind(user_id)
            .execute(&self.pool).await.map_err(db_err)?;
        if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }

    async fn list_members(&self, project_id: Id) -> RepoResult<Vec<UserProject>> {
        sqlx::query_as::<_, UserProject>(
            "SELECT id, user_id, project_id, created_at, updated_at FROM user_projects WHERE project_id = $1 ORDER BY id"
        )
            .bind(project_id)
            .fetch_all(&self.pool).await.map_err(db_err)
    }

    async fn is_member(&self, project_id: Id, user_id: Id) -> RepoResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM user_projects WHERE project_id = $1 AND user_id = $2)"
        )
            .bind(project_id).bind(user_id)
            .fetch_one(&self.pool).await.map_err(db_err)?;
        Ok(exists)
    }
}

#[async_trait]
impl IdeaRepo for PgRepo {
    async fn create_idea(&self, project_id: Id, author: Id, new: NewIdea) -> RepoResult<Idea> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let idea = sqlx::query_as::<_, Idea>(&format!(
            "INSERT INTO ideas (project_id, user_id, service_name, background, introduction, target, expected_effect)
             VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {IDEA_COLUMNS}"
        ))
            .bind(project_id).bind(author)
            .bind(&new.service_name).bind(&new.background).bind(&new.introduction)
            .bind(&new.target).bind(&new.expected_effect)
            .fetch_one(&mut *tx).await.map_err(db_err)?;
        sqlx::query("INSERT INTO planners (idea_id) VALUES ($1)")
            .bind(idea.id)
            .execute(&mut *tx).await.map_err(db_err)?;
        sqlx::query("INSERT INTO req_docs (idea_id) VALUES ($1)")
            .bind(idea.id)
            .execute(&mut *tx).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(idea)
    }

    async fn find_idea(&self, id: Id) -> RepoResult<Option<Idea>> {
        sqlx::query_as::<_, Idea>(&format!("SELECT {IDEA_COLUMNS} FROM ideas WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(db_err)
    }

    async fn list_ideas(&self, project_id: Id) -> RepoResult<Vec<Idea>> {
        sqlx::query_as::<_, Idea>(&format!("SELECT {IDEA_COLUMNS} FROM ideas WHERE project_id = $1 ORDER BY id"))
            .bind(project_id)
            .fetch_all(&self.pool).await.map_err(db_err)
    }

    async fn update_idea(&self, id: Id, upd: UpdateIdea) -> RepoResult<Idea> {
        sqlx::query_as::<_, Idea>(&format!(
            "UPDATE ideas SET
                service_name = COALESCE($2, service_name),
                background = COALESCE($3, background),
                introduction = COALESCE($4, introduction),
                target = COALESCE($5, target),
                expected_effect = COALESCE($6, expected_effect),
                updated_at = now()
             WHERE id = $1 RETURNING {IDEA_COLUMNS}"
        ))
            .bind(id)
            .bind(upd.service_name.as_ref())
            .bind(upd.background.as_ref())
            .bind(upd.introduction.as_ref())
            .bind(upd.target.as_ref())
            .bind(upd.expected_effect.as_ref())
            .fetch_one(&self.pool).await.map_err(db_err)
    }

    async fn delete_idea(&self, id: Id) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query("DELETE FROM comments WHERE idea_id = $1")
            .bind(id).execute(&mut *tx).await.map_err(db_err)?;
        sqlx::query("DELETE FROM reqs WHERE req_docs_id IN (SELECT id FROM req_docs WHERE idea_id = $1)")
            .bind(id).execute(&mut *tx).await.map_err(db_err)?;
        sqlx::query("DELETE FROM req_docs WHERE idea_id = $1")
            .bind(id).execute(&mut *tx).await.map_err(db_err)?;
        sqlx::query("DELETE FROM planners WHERE idea_id = $1")
            .bind(id).execute(&mut *tx).await.map_err(db_err)?;
        let res = sqlx::query("DELETE FROM ideas WHERE id = $1")
            .bind(id).execute(&mut *tx).await.map_err(db_err)?;
        if res.rows_affected() == 0 {
            // dropping tx rolls back
            return Err(RepoError::NotFound);
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl PlannerRepo for PgRepo {
    async fn find_planner_by_idea(&self, idea_id: Id) -> RepoResult<Option<Planner>> {
        sqlx::query_as::<_, Planner>("SELECT id, idea_id, content, updated_at FROM planners WHERE idea_id = $1")
            .bind(idea_id)
            .fetch_optional(&self.pool).await.map_err(db_err)
    }

    async fn update_planner_content(&self, idea_id: Id, content: Option<String>) -> RepoResult<Planner> {
        sqlx::query_as::<_, Planner>(
            "UPDATE planners SET content = $2, updated_at = now() WHERE idea_id = $1
             RETURNING id, idea_id, content, updated_at"
        )
            .bind(idea_id).bind(content.as_ref())
            .fetch_one(&self.pool).await.map_err(db_err)
    }
}

#[async_trait]
impl ReqRepo for PgRepo {
    async fn find_req_docs(&self, id: Id) -> RepoResult<Option<ReqDocs>> {
        sqlx::query_as::<_, ReqDocs>("SELECT id, idea_id, created_at, updated_at FROM req_docs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(db_err)
    }

    async fn find_req_docs_by_idea(&self, idea_id: Id) -> RepoResult<Option<ReqDocs>> {
        sqlx::query_as::<_, ReqDocs>("SELECT id, idea_id, created_at, updated_at FROM req_docs WHERE idea_id = $1")
            .bind(idea_id)
            .fetch_optional(&self.pool).await.map_err(db_err)
    }

    async fn list_reqs(&self, req_docs_id: Id) -> RepoResult<Vec<Req>> {
        sqlx::query_as::<_, Req>(
            "SELECT id, req_docs_id, url, domain, description, created_at, updated_at FROM reqs
             WHERE req_docs_id = $1 ORDER BY id"
        )
            .bind(req_docs_id)
            .fetch_all(&self.pool).await.map_err(db_err)
    }

    async fn find_req(&self, id: Id) -> RepoResult<Option<Req>> {
        sqlx::query_as::<_, Req>(
            "SELECT id, req_docs_id, url, domain, description, created_at, updated_at FROM reqs WHERE id = $1"
        )
            .bind(id)
            .fetch_optional(&self.pool).await.map_err(db_err)
    }

    async fn create_req(&self, req_docs_id: Id, new: NewReq) -> RepoResult<Req> {
        sqlx::query_as::<_, Req>(
            "INSERT INTO reqs (req_docs_id, url, domain, description) VALUES ($1,$2,$3,$4)
             RETURNING id, req_docs_id, url, domain, description, created_at, updated_at"
        )
            .bind(req_docs_id).bind(&new.url).bind(&new.domain).bind(new.description.as_ref())
            .fetch_one(&self.pool).await.map_err(db_err)
    }

    async fn delete_req(&self, id: Id) -> RepoResult<()> {
        let res = sqlx::query("DELETE FROM reqs WHERE id = $1")
            .bind(id)
            .execute(&self.pool).await.map_err(db_err)?;
        if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
        Ok(())
    }
}

#[async_trait]
impl CommentRepo for PgRepo {
    async fn create_comment(&self, user_id: Id, target: CommentTarget, new: NewComment) -> RepoResult<Comment> {
        let (idea_id, project_id) = match target {
            CommentTarget::Idea(i) => (Some(i), None),
            CommentTarget::Project(p) => (None, Some(p)),
        };
        sqlx::query_as::<_, Comment>(&format!(
            "INSERT INTO comments (user_id, idea_id, project_id, content, rating) VALUES ($1,$2,$3,$4,$5)
             RETURNING {COMMENT_COLUMNS}"
        ))
            .bind(user_id).bind(idea_id).bind(project_id)
            .bind(&new.comment_content).bind(new.rating)
            .fetch_one(&self.pool).await.map_err(db_err)
    }

    async fn list_comments(&self, target: CommentTarget) -> RepoResult<Vec<Comment>> {
        let (column, id) = match target {
            CommentTarget::Idea(i) => ("idea_id", i),
            CommentTarget::Project(p) => ("project_id", p),
        };
        sqlx::query_as::<_, Comment>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE {column} = $1 ORDER BY id"
        ))
            .bind(id)
            .fetch_all(&self.pool).await.map_err(db_err)
    }
}
