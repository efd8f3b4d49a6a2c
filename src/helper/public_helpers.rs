use crate::models::db_operations::posts_db_operations::{self, DbError};
use crate::models::db_operations::users_db_operations;
use crate::models::{FullPost, PostSummary, UserAccount};
use crate::workflow::PostStatus;
use crate::DbPool;
use redb::Database;

pub fn verify_user_credentials(
    pool: &DbPool,
    username: &str,
    password: &str,
) -> Option<UserAccount> {
    let conn = pool.get().ok()?;
    let user = users_db_operations::verify_credentials(&conn, username, password)?;
    if let Err(e) = users_db_operations::update_last_login_time(&conn, username) {
        log::warn!("Could not record login time for '{}': {}", username, e);
    }
    Some(user)
}

/// Only published posts leave through the public API.
pub fn fetch_published_post(db: &Database, id: &str) -> Result<Option<FullPost>, DbError> {
    posts_db_operations::read_published_post(db, id)
}

pub fn fetch_latest_published_posts(
    db: &Database,
    limit: u32,
    offset: u32,
) -> Result<Vec<PostSummary>, DbError> {
    posts_db_operations::read_post_summaries_by_status(db, PostStatus::Published, limit, offset)
}
