use crate::helper::sanitization_helpers;
use crate::models::db_operations::posts_db_operations::{self, DbError, PostFilter};
use crate::models::db_operations::users_db_operations;
use crate::models::{FullPost, PostMetadata, PostSummary, TransitionLogEntry};
use crate::workflow::{self, ActionDescriptor, Actor, PostStatus, WorkflowAction, WorkflowError};
use crate::DbPool;
use redb::Database;
use serde::Serialize;
use thiserror::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Error, Debug)]
pub enum WorkflowHelperError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Rusqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error("Post not found: {0}")]
    NotFound(String),
    #[error("Not logged in or account suspended.")]
    Unauthorized,
    #[error("You are not allowed to access this post.")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
}

/// A post as shown to one actor, with the actions that actor may run on it.
#[derive(Debug, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: FullPost,
    pub actions: Vec<ActionDescriptor>,
}

/// Resolves the session username into an `Actor` with freshly loaded roles.
pub fn load_actor(pool: &DbPool, username: &str) -> Result<Actor, WorkflowHelperError> {
    let conn = pool.get()?;
    match users_db_operations::read_user_by_username(&conn, username)? {
        Some(user) if user.is_active => Ok(Actor::new(user.id, user.username, user.roles)),
        Some(_) => {
            log::warn!("Suspended user '{}' attempted a request", username);
            Err(WorkflowHelperError::Unauthorized)
        }
        None => Err(WorkflowHelperError::Unauthorized),
    }
}

/// Converts a 1-based page and a page size into (limit, offset).
pub fn page_window(page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = page.unwrap_or(1).max(1);
    (limit, (page - 1).saturating_mul(limit))
}

pub fn parse_status(raw: Option<&str>) -> Result<Option<PostStatus>, WorkflowHelperError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s
            .parse::<PostStatus>()
            .map(Some)
            .map_err(|e| WorkflowHelperError::Validation(e.to_string())),
        None => Ok(None),
    }
}

pub fn parse_action(raw: &str) -> Result<WorkflowAction, WorkflowHelperError> {
    raw.parse::<WorkflowAction>()
        .map_err(|e| WorkflowHelperError::Validation(e.to_string()))
}

fn load_visible_post(
    db: &Database,
    actor: &Actor,
    post_id: &str,
) -> Result<FullPost, WorkflowHelperError> {
    let post = posts_db_operations::read_post(db, post_id)?
        .ok_or_else(|| WorkflowHelperError::NotFound(post_id.to_string()))?;
    if !workflow::can_view(actor, &post.metadata.post_ref()) {
        return Err(WorkflowHelperError::Forbidden);
    }
    Ok(post)
}

/// Same gate as `load_visible_post` without reading the content.
fn ensure_visible(db: &Database, actor: &Actor, post_id: &str) -> Result<(), WorkflowHelperError> {
    let metadata = posts_db_operations::read_post_metadata(db, post_id)?
        .ok_or_else(|| WorkflowHelperError::NotFound(post_id.to_string()))?;
    if !workflow::can_view(actor, &metadata.post_ref()) {
        return Err(WorkflowHelperError::Forbidden);
    }
    Ok(())
}

fn validated_title(title: &str) -> Result<String, WorkflowHelperError> {
    sanitization_helpers::clean_title(title).map_err(WorkflowHelperError::Validation)
}

pub fn create_post(
    db: &Database,
    actor: &Actor,
    title: &str,
    content: &str,
    requested_status: Option<PostStatus>,
) -> Result<PostView, WorkflowHelperError> {
    let clean_title = validated_title(title)?;
    let clean_content = sanitization_helpers::sanitize_markdown_content(content);
    let status = workflow::initial_status(requested_status, actor.effective_level())?;

    let post_id =
        posts_db_operations::create_post(db, actor.id, &clean_title, &clean_content, status)?;
    log::info!("User '{}' created post {} in status {}", actor.username, post_id, status);
    get_post_view(db, actor, &post_id)
}

pub fn get_post_view(
    db: &Database,
    actor: &Actor,
    post_id: &str,
) -> Result<PostView, WorkflowHelperError> {
    let post = load_visible_post(db, actor, post_id)?;
    let actions = workflow::available_actions(actor, &post.metadata.post_ref());
    Ok(PostView { post, actions })
}

pub fn get_available_actions(
    db: &Database,
    actor: &Actor,
    post_id: &str,
) -> Result<Vec<ActionDescriptor>, WorkflowHelperError> {
    Ok(get_post_view(db, actor, post_id)?.actions)
}

/// The approval tier sees every post; everyone else only their own.
pub fn list_posts(
    db: &Database,
    actor: &Actor,
    status: Option<PostStatus>,
    limit: u32,
    offset: u32,
) -> Result<Vec<PostSummary>, WorkflowHelperError> {
    let filter = PostFilter {
        status,
        author_id: if actor.can_see_approval_actions() { None } else { Some(actor.id) },
    };
    Ok(posts_db_operations::read_post_summaries(db, filter, limit, offset)?)
}

pub fn update_post(
    db: &Database,
    actor: &Actor,
    post_id: &str,
    title: &str,
    content: &str,
) -> Result<PostMetadata, WorkflowHelperError> {
    ensure_visible(db, actor, post_id)?;
    let clean_title = validated_title(title)?;
    let clean_content = sanitization_helpers::sanitize_markdown_content(content);
    Ok(posts_db_operations::update_draft_post(db, actor, post_id, &clean_title, &clean_content)?)
}

/// Posts the actor cannot see are refused before their status is looked at.
pub fn perform_transition(
    db: &Database,
    actor: &Actor,
    post_id: &str,
    action: WorkflowAction,
) -> Result<TransitionLogEntry, WorkflowHelperError> {
    ensure_visible(db, actor, post_id)?;
    Ok(posts_db_operations::apply_transition(db, post_id, action, actor)?)
}

pub fn history(
    db: &Database,
    actor: &Actor,
    post_id: &str,
) -> Result<Vec<TransitionLogEntry>, WorkflowHelperError> {
    ensure_visible(db, actor, post_id)?;
    Ok(posts_db_operations::read_transition_log(db, post_id)?)
}
