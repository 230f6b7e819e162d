use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::*;

#[derive(Default)]
struct State {
    users: HashMap<Id, User>,
    projects: HashMap<Id, Project>,
    user_projects: HashMap<Id, UserProject>,
    ideas: HashMap<Id, Idea>,
    planners: HashMap<Id, Planner>,
    req_docs: HashMap<Id, ReqDocs>,
    reqs: HashMap<Id, Req>,
    comments: HashMap<Id, Comment>,
    next_id: Id,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local store used for tests and local development.
#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
}

impl InMemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
    }

    /// Row counts of the idea children, for cascade assertions.
    pub fn orphan_counts(&self, idea_id: Id) -> RepoResult<(usize, usize, usize)> {
        let s = self.read()?;
        let planners = s.planners.values().filter(|p| p.idea_id == idea_id).count();
        let docs: Vec<Id> = s.req_docs.values().filter(|d| d.idea_id == idea_id).map(|d| d.id).collect();
        let reqs = s.reqs.values().filter(|r| docs.contains(&r.req_docs_id)).count();
        Ok((planners, docs.len(), reqs))
    }
}

#[async_trait]
impl UserRepo for InMemRepo {
    async fn find_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let s = self.read()?;
        Ok(s.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_all_by_role_type(&self, role_type: RoleType) -> RepoResult<Vec<User>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.users.values().filter(|u| u.role_type == role_type).cloned().collect();
        v.sort_by_key(|u| u.id);
        Ok(v)
    }

    async fn find_user(&self, id: Id) -> RepoResult<Option<User>> {
        let s = self.read()?;
        Ok(s.users.get(&id).cloned())
    }

    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        let mut s = self.write()?;
        if s.users.values().any(|u| u.username == new.username) {
            return Err(RepoError::Conflict);
        }
        let now = Utc::now();
        let id = s.next_id();
        let user = User {
            id,
            username: new.username,
            password_hash: new.password_hash,
            role_type: new.role_type,
            created_at: now,
            updated_at: now,
        };
        s.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_role_type(&self, id: Id, role_type: RoleType) -> RepoResult<User> {
        let mut s = self.write()?;
        let user = s.users.get_mut(&id).ok_or(RepoError::NotFound)?;
        user.role_type = role_type;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl ProjectRepo for InMemRepo {
    async fn create_project(&self, owner: Id, new: NewProject) -> RepoResult<Project> {
        let mut s = self.write()?;
        let now = Utc::now();
        let id = s.next_id();
        let project = Project {
            id,
            name: new.name,
            description: new.description,
            created_by: owner,
            created_at: now,
            updated_at: now,
        };
        s.projects.insert(id, project.clone());
        let membership_id = s.next_id();
        s.user_projects.insert(
            membership_id,
            UserProject { id: membership_id, user_id: owner, project_id: id, created_at: now, updated_at: now },
        );
        Ok(project)
    }

    async fn find_project(&self, id: Id) -> RepoResult<Option<Project>> {
        let s = self.read()?;
        Ok(s.projects.get(&id).cloned())
    }

    async fn list_projects_for_user(&self, user_id: Id) -> RepoResult<Vec<Project>> {
        let s = self.read()?;
        let mut v: Vec<_> = s
            .user_projects
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| s.projects.get(&m.project_id).cloned())
            .collect();
        v.sort_by_key(|p| p.id);
        Ok(v)
    }

    async fn add_member(&self, project_id: Id, user_id: Id) -> RepoResult<UserProject> {
        let mut s = self.write()?;
        if !s.projects.contains_key(&project_id) {
            return Err(RepoError::NotFound);
        }
        if s.user_projects.values().any(|m| m.project_id == project_id && m.user_id == user_id) {
            return Err(RepoError::Conflict);
        }
        let now = Utc::now();
        let id = s.next_id();
        let membership = UserProject { id, user_id, project_id, created_at: now, updated_at: now };
        s.user_projects.insert(id, membership.clone());
        Ok(membership)
    }

    async fn remove_member(&self, project_id: Id, user_id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        let id = s
            .user_projects
            .values()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .map(|m| m.id)
            .ok_or(RepoError::NotFound)?;
        s.user_projects.remove(&id);
        Ok(())
    }

    async fn list_members(&self, project_id: Id) -> RepoResult<Vec<UserProject>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.user_projects.values().filter(|m| m.project_id == project_id).cloned().collect();
        v.sort_by_key(|m| m.id);
        Ok(v)
    }

    async fn is_member(&self, project_id: Id, user_id: Id) -> RepoResult<bool> {
        let s = self.read()?;
        Ok(s.user_projects.values().any(|m| m.project_id == project_id && m.user_id == user_id))
    }
}

#[async_trait]
impl IdeaRepo for InMemRepo {
    async fn create_idea(&self, project_id: Id, author: Id, new: NewIdea) -> RepoResult<Idea> {
        let mut s = self.write()?;
        if !s.projects.contains_key(&project_id) {
            return Err(RepoError::NotFound);
        }
        let now = Utc::now();
        let id = s.next_id();
        let idea = Idea {
            id,
            project_id,
            user_id: author,
            service_name: new.service_name,
            background: new.background,
            introduction: new.introduction,
            target: new.target,
            expected_effect: new.expected_effect,
            created_at: now,
            updated_at: now,
        };
        s.ideas.insert(id, idea.clone());
        let planner_id = s.next_id();
        s.planners.insert(planner_id, Planner { id: planner_id, idea_id: id, content: None, updated_at: now });
        let docs_id = s.next_id();
        s.req_docs.insert(docs_id, ReqDocs { id: docs_id, idea_id: id, created_at: now, updated_at: now });
        Ok(idea)
    }

    async fn find_idea(&self, id: Id) -> RepoResult<Option<Idea>> {
        let s = self.read()?;
        Ok(s.ideas.get(&id).cloned())
    }

    async fn list_ideas(&self, project_id: Id) -> RepoResult<Vec<Idea>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.ideas.values().filter(|i| i.project_id == project_id).cloned().collect();
        v.sort_by_key(|i| i.id);
        Ok(v)
    }

    async fn update_idea(&self, id: Id, upd: UpdateIdea) -> RepoResult<Idea> {
        let mut s = self.write()?;
        let idea = s.ideas.get_mut(&id).ok_or(RepoError::NotFound)?;
        if let Some(v) = upd.service_name { idea.service_name = v; }
        if let Some(v) = upd.background { idea.background = v; }
        if let Some(v) = upd.introduction { idea.introduction = v; }
        if let Some(v) = upd.target { idea.target = v; }
        if let Some(v) = upd.expected_effect { idea.expected_effect = v; }
        idea.updated_at = Utc::now();
        Ok(idea.clone())
    }

    async fn delete_idea(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        if s.ideas.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        s.planners.retain(|_, p| p.idea_id != id);
        let docs: Vec<Id> = s.req_docs.values().filter(|d| d.idea_id == id).map(|d| d.id).collect();
        s.reqs.retain(|_, r| !docs.contains(&r.req_docs_id));
        s.req_docs.retain(|_, d| d.idea_id != id);
        s.comments.retain(|_, c| c.idea_id != Some(id));
        Ok(())
    }
}

#[async_trait]
impl PlannerRepo for InMemRepo {
    async fn find_planner_by_idea(&self, idea_id: Id) -> RepoResult<Option<Planner>> {
        let s = self.read()?;
        Ok(s.planners.values().find(|p| p.idea_id == idea_id).cloned())
    }

    async fn update_planner_content(&self, idea_id: Id, content: Option<String>) -> RepoResult<Planner> {
        let mut s = self.write()?;
        let planner = s.planners.values_mut().find(|p| p.idea_id == idea_id).ok_or(RepoError::NotFound)?;
        planner.content = content;
        planner.updated_at = Utc::now();
        Ok(planner.clone())
    }
}

#[async_trait]
impl ReqRepo for InMemRepo {
    async fn find_req_docs(&self, id: Id) -> RepoResult<Option<ReqDocs>> {
        let s = self.read()?;
        Ok(s.req_docs.get(&id).cloned())
    }

    async fn find_req_docs_by_idea(&self, idea_id: Id) -> RepoResult<Option<ReqDocs>> {
        let s = self.read()?;
        Ok(s.req_docs.values().find(|d| d.idea_id == idea_id).cloned())
    }

    async fn list_reqs(&self, req_docs_id: Id) -> RepoResult<Vec<Req>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.reqs.values().filter(|r| r.req_docs_id == req_docs_id).cloned().collect();
        v.sort_by_key(|r| r.id);
        Ok(v)
    }

    async fn find_req(&self, id: Id) -> RepoResult<Option<Req>> {
        let s = self.read()?;
        Ok(s.reqs.get(&id).cloned())
    }

    async fn create_req(&self, req_docs_id: Id, new: NewReq) -> RepoResult<Req> {
        let mut s = self.write()?;
        if !s.req_docs.contains_key(&req_docs_id) {
            return Err(RepoError::NotFound);
        }
        let now = Utc::now();
        let id = s.next_id();
        let req = Req {
            id,
            req_docs_id,
            url: new.url,
            domain: new.domain,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        s.reqs.insert(id, req.clone());
        Ok(req)
    }

    async fn delete_req(&self, id: Id) -> RepoResult<()> {
        let mut s = self.write()?;
        s.reqs.remove(&id).map(|_| ()).ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl CommentRepo for InMemRepo {
    async fn create_comment(&self, user_id: Id, target: CommentTarget, new: NewComment) -> RepoResult<Comment> {
        let mut s = self.write()?;
        let (idea_id, project_id) = match target {
            CommentTarget::Idea(i) if s.ideas.contains_key(&i) => (Some(i), None),
            CommentTarget::Project(p) if s.projects.contains_key(&p) => (None, Some(p)),
            _ => return Err(RepoError::NotFound),
        };
        let now = Utc::now();
        let id = s.next_id();
        let comment = Comment {
            id,
            user_id,
            idea_id,
            project_id,
            content: new.comment_content,
            rating: new.rating,
            created_at: now,
            updated_at: now,
        };
        s.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, target: CommentTarget) -> RepoResult<Vec<Comment>> {
        let s = self.read()?;
        let mut v: Vec<_> = s.comments.values().filter(|c| c.target() == Some(target)).cloned().collect();
        v.sort_by_key(|c| c.id);
        Ok(v)
    }
}
