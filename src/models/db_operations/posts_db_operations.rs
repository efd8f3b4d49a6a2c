use crate::models::{FullPost, PostMetadata, PostSummary, TransitionLogEntry};
use crate::workflow::{self, Actor, Denial, PostStatus, WorkflowAction};
use chrono::Utc;
use redb::{
    CommitError, Database, ReadableTable, StorageError, TableDefinition, TableError,
    TransactionError,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Redb storage error: {0}")]
    RedbStorage(#[from] StorageError),
    #[error("Redb transaction error: {0}")]
    RedbTransaction(#[from] TransactionError),
    #[error("Redb table error: {0}")]
    RedbTable(#[from] TableError),
    #[error("Redb commit error: {0}")]
    RedbCommit(#[from] CommitError),
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("UUID parse error: {0}")]
    Uuid(#[from] uuid::Error),
    #[error("Item not found in database: {0}")]
    NotFound(String),
    #[error("Cannot {action} a post in status {status}: {denial:?}")]
    TransitionRejected {
        action: WorkflowAction,
        status: PostStatus,
        denial: Denial,
    },
    #[error("Post {0} cannot be edited in its current status")]
    EditNotAllowed(String),
    #[error("Status index points at post {0} which has no metadata")]
    IndexOutOfSync(String),
}

pub const POSTS: TableDefinition<&[u8; 16], &str> = TableDefinition::new("posts");
pub const METADATA: TableDefinition<&[u8; 16], &str> = TableDefinition::new("metadata");
// (status, -created_at, id): newest first within each status.
pub const STATUS_INDEX: TableDefinition<(&str, i64, &[u8; 16]), ()> =
    TableDefinition::new("status_index");
pub const TRANSITION_LOG: TableDefinition<(&[u8; 16], u32), &str> =
    TableDefinition::new("transition_log");

/// Narrows a listing. `None` fields don't filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub author_id: Option<i32>,
}

fn parse_post_id(post_id: &str) -> Result<[u8; 16], DbError> {
    Ok(Uuid::parse_str(post_id)?.into_bytes())
}

fn summary_from_json(id_bytes: &[u8; 16], meta_str: &str) -> Result<PostSummary, DbError> {
    let metadata = serde_json::from_str::<PostMetadata>(meta_str)?;
    Ok(PostSummary { id: Uuid::from_bytes(*id_bytes).to_string(), metadata })
}

pub fn create_post(
    db: &Database,
    author_id: i32,
    title: &str,
    content: &str,
    status: PostStatus,
) -> Result<String, DbError> {
    let post_uuid = Uuid::new_v4();
    let metadata = PostMetadata {
        title: title.to_string(),
        status,
        author_id,
        created_at: Utc::now(),
        last_updated_at: None,
    };
    let metadata_json = serde_json::to_string(&metadata)?;
    let post_id_bytes = post_uuid.into_bytes();

    let write_txn = db.begin_write()?;
    {
        let mut posts_table = write_txn.open_table(POSTS)?;
        let mut metadata_table = write_txn.open_table(METADATA)?;
        let mut status_index = write_txn.open_table(STATUS_INDEX)?;

        posts_table.insert(&post_id_bytes, content)?;
        metadata_table.insert(&post_id_bytes, metadata_json.as_str())?;
        let index_key = (status.as_str(), -metadata.created_at.timestamp(), &post_id_bytes);
        status_index.insert(index_key, ())?;
    }
    write_txn.commit()?;

    Ok(post_uuid.to_string())
}

pub fn read_post(db: &Database, id: &str) -> Result<Option<FullPost>, DbError> {
    let post_id_bytes = parse_post_id(id)?;

    let read_txn = db.begin_read()?;
    let posts_table = read_txn.open_table(POSTS)?;
    let metadata_table = read_txn.open_table(METADATA)?;

    let (Some(content_guard), Some(meta_guard)) =
        (posts_table.get(&post_id_bytes)?, metadata_table.get(&post_id_bytes)?)
    else {
        return Ok(None);
    };

    let metadata: PostMetadata = serde_json::from_str(meta_guard.value())?;
    Ok(Some(FullPost {
        id: id.to_string(),
        metadata,
        content: content_guard.value().to_string(),
    }))
}

pub fn read_post_metadata(db: &Database, id: &str) -> Result<Option<PostMetadata>, DbError> {
    let post_id_bytes = parse_post_id(id)?;

    let read_txn = db.begin_read()?;
    let metadata_table = read_txn.open_table(METADATA)?;
    let metadata = match metadata_table.get(&post_id_bytes)? {
        Some(guard) => Some(serde_json::from_str(guard.value())?),
        None => None,
    };
    Ok(metadata)
}

/// Replaces title and content of a draft. Status is never touched here.
pub fn update_draft_post(
    db: &Database,
    editor: &Actor,
    post_id: &str,
    title: &str,
    content: &str,
) -> Result<PostMetadata, DbError> {
    let post_id_bytes = parse_post_id(post_id)?;

    let write_txn = db.begin_write()?;
    let new_meta = {
        let mut posts_table = write_txn.open_table(POSTS)?;
        let mut metadata_table = write_txn.open_table(METADATA)?;

        let old_meta: PostMetadata = {
            let guard = metadata_table
                .get(&post_id_bytes)?
                .ok_or_else(|| DbError::NotFound(post_id.to_string()))?;
            serde_json::from_str(guard.value())?
        };

        if !workflow::can_edit(editor, &old_meta.post_ref()) {
            return Err(DbError::EditNotAllowed(post_id.to_string()));
        }

        let new_meta = PostMetadata {
            title: title.to_string(),
            last_updated_at: Some(Utc::now()),
            ..old_meta
        };
        let new_meta_json = serde_json::to_string(&new_meta)?;

        posts_table.insert(&post_id_bytes, content)?;
        metadata_table.insert(&post_id_bytes, new_meta_json.as_str())?;
        new_meta
    };
    write_txn.commit()?;
    Ok(new_meta)
}

/// Applies `action` to a post on behalf of `actor`.
///
/// Status is re-read and the rule re-checked inside the write transaction,
/// so of two racing requests the second one sees the first one's result.
pub fn apply_transition(
    db: &Database,
    post_id: &str,
    action: WorkflowAction,
    actor: &Actor,
) -> Result<TransitionLogEntry, DbError> {
    let post_id_bytes = parse_post_id(post_id)?;

    let write_txn = db.begin_write()?;
    let entry = {
        let mut metadata_table = write_txn.open_table(METADATA)?;
        let mut status_index = write_txn.open_table(STATUS_INDEX)?;
        let mut log_table = write_txn.open_table(TRANSITION_LOG)?;

        let mut metadata: PostMetadata = {
            let guard = metadata_table
                .get(&post_id_bytes)?
                .ok_or_else(|| DbError::NotFound(post_id.to_string()))?;
            serde_json::from_str(guard.value())?
        };

        let from = metadata.status;
        if let Some(denial) = workflow::actor_denial(actor, action, &metadata.post_ref()) {
            return Err(DbError::TransitionRejected { action, status: from, denial });
        }
        let to = action.target();

        let sequence = {
            let mut existing =
                log_table.range((&post_id_bytes, 0u32)..=(&post_id_bytes, u32::MAX))?;
            match existing.next_back() {
                Some(last) => last?.0.value().1 + 1,
                None => 1,
            }
        };

        let now = Utc::now();
        let entry = TransitionLogEntry {
            sequence,
            action,
            from,
            to,
            actor_id: actor.id,
            actor_username: actor.username.clone(),
            at: now,
        };

        metadata.status = to;
        metadata.last_updated_at = Some(now);
        let metadata_json = serde_json::to_string(&metadata)?;
        let entry_json = serde_json::to_string(&entry)?;
        let timestamp = -metadata.created_at.timestamp();

        metadata_table.insert(&post_id_bytes, metadata_json.as_str())?;
        status_index.remove((from.as_str(), timestamp, &post_id_bytes))?;
        status_index.insert((to.as_str(), timestamp, &post_id_bytes), ())?;
        log_table.insert((&post_id_bytes, sequence), entry_json.as_str())?;
        entry
    };
    write_txn.commit()?;

    log::info!(
        "Post {} moved {} -> {} by {} via {}",
        post_id, entry.from, entry.to, actor.username, action
    );
    Ok(entry)
}

pub fn read_transition_log(
    db: &Database,
    post_id: &str,
) -> Result<Vec<TransitionLogEntry>, DbError> {
    let post_id_bytes = parse_post_id(post_id)?;

    let read_txn = db.begin_read()?;
    let log_table = read_txn.open_table(TRANSITION_LOG)?;

    let mut entries = Vec::new();
    for item in log_table.range((&post_id_bytes, 0u32)..=(&post_id_bytes, u32::MAX))? {
        let (_key, value) = item?;
        entries.push(serde_json::from_str(value.value())?);
    }
    Ok(entries)
}

/// Newest-first summaries for one status, served from the status index.
pub fn read_post_summaries_by_status(
    db: &Database,
    status: PostStatus,
    limit: u32,
    offset: u32,
) -> Result<Vec<PostSummary>, DbError> {
    let read_txn = db.begin_read()?;
    let status_index = read_txn.open_table(STATUS_INDEX)?;
    let metadata_table = read_txn.open_table(METADATA)?;

    let start_key = (status.as_str(), i64::MIN, &[0u8; 16]);
    let end_key = (status.as_str(), i64::MAX, &[255u8; 16]);

    let mut posts = Vec::new();
    for item in status_index
        .range(start_key..=end_key)?
        .skip(offset as usize)
        .take(limit as usize)
    {
        let (key, _value) = item?;
        let post_id_bytes = key.value().2;
        let meta_guard = metadata_table
            .get(post_id_bytes)?
            .ok_or_else(|| DbError::IndexOutOfSync(Uuid::from_bytes(*post_id_bytes).to_string()))?;
        posts.push(summary_from_json(post_id_bytes, meta_guard.value())?);
    }
    Ok(posts)
}

pub fn read_post_summaries(
    db: &Database,
    filter: PostFilter,
    limit: u32,
    offset: u32,
) -> Result<Vec<PostSummary>, DbError> {
    if let (Some(status), None) = (filter.status, filter.author_id) {
        return read_post_summaries_by_status(db, status, limit, offset);
    }

    let read_txn = db.begin_read()?;
    let metadata_table = read_txn.open_table(METADATA)?;
    let mut posts = Vec::new();
    for item in metadata_table.iter()? {
        let (id_bytes, meta_str) = item?;
        let summary = summary_from_json(id_bytes.value(), meta_str.value())?;
        let status_matches = filter.status.map_or(true, |s| summary.metadata.status == s);
        let author_matches = filter.author_id.map_or(true, |a| summary.metadata.author_id == a);
        if status_matches && author_matches {
            posts.push(summary);
        }
    }

    posts.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));

    Ok(posts.into_iter().skip(offset as usize).take(limit as usize).collect())
}

pub fn read_published_post(db: &Database, id: &str) -> Result<Option<FullPost>, DbError> {
    Ok(read_post(db, id)?.filter(|post| post.metadata.status == PostStatus::Published))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup;
    use crate::workflow::{Role, RoleSet};
    use tempfile::TempDir;

    fn open_db() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::create(dir.path().join("posts.db")).unwrap();
        db_setup::setup_posts_db(&db).unwrap();
        (dir, db)
    }

    fn actor(id: i32, roles: &[Role]) -> Actor {
        Actor::new(id, format!("user{}", id), roles.iter().copied().collect::<RoleSet>())
    }

    #[test]
    fn test_create_and_read_post() {
        let (_dir, db) = open_db();
        let id = create_post(&db, 1, "Chào", "Nội dung", PostStatus::Draft).unwrap();
        let post = read_post(&db, &id).unwrap().unwrap();
        assert_eq!(post.metadata.title, "Chào");
        assert_eq!(post.metadata.status, PostStatus::Draft);
        assert_eq!(post.metadata.author_id, 1);
        assert_eq!(post.content, "Nội dung");
    }

    #[test]
    fn test_read_missing_post_is_none() {
        let (_dir, db) = open_db();
        let missing = Uuid::new_v4().to_string();
        assert!(read_post(&db, &missing).unwrap().is_none());
        assert!(matches!(read_post(&db, "not-a-uuid"), Err(DbError::Uuid(_))));
    }

    #[test]
    fn test_full_lifecycle_updates_index_and_log() {
        let (_dir, db) = open_db();
        let author = actor(1, &[Role::Author]);
        let moderator = actor(2, &[Role::Moderator]);
        let editor = actor(3, &[Role::Editor]);
        let id = create_post(&db, author.id, "Title", "Body", PostStatus::Draft).unwrap();

        apply_transition(&db, &id, WorkflowAction::SubmitReview, &author).unwrap();
        assert_eq!(read_post_summaries_by_status(&db, PostStatus::Review, 10, 0).unwrap().len(), 1);
        assert!(read_post_summaries_by_status(&db, PostStatus::Draft, 10, 0).unwrap().is_empty());

        apply_transition(&db, &id, WorkflowAction::Approve, &moderator).unwrap();
        apply_transition(&db, &id, WorkflowAction::Archive, &editor).unwrap();

        let meta = read_post_metadata(&db, &id).unwrap().unwrap();
        assert_eq!(meta.status, PostStatus::Archived);
        let published = read_post_summaries_by_status(&db, PostStatus::Published, 10, 0).unwrap();
        assert!(published.is_empty());

        let log = read_transition_log(&db, &id).unwrap();
        let steps: Vec<(u32, WorkflowAction)> =
            log.iter().map(|e| (e.sequence, e.action)).collect();
        assert_eq!(
            steps,
            vec![
                (1, WorkflowAction::SubmitReview),
                (2, WorkflowAction::Approve),
                (3, WorkflowAction::Archive)
            ]
        );
        assert_eq!(log[1].from, PostStatus::Review);
        assert_eq!(log[1].to, PostStatus::Published);
    }

    #[test]
    fn test_second_approval_sees_new_status() {
        let (_dir, db) = open_db();
        let moderator = actor(2, &[Role::Moderator]);
        let id = create_post(&db, 1, "Title", "Body", PostStatus::Review).unwrap();

        apply_transition(&db, &id, WorkflowAction::Approve, &moderator).unwrap();
        let second = apply_transition(&db, &id, WorkflowAction::Approve, &moderator);
        assert!(matches!(
            second,
            Err(DbError::TransitionRejected {
                status: PostStatus::Published,
                denial: Denial::WrongStatus,
                ..
            })
        ));
        assert_eq!(read_transition_log(&db, &id).unwrap().len(), 1);
    }

    #[test]
    fn test_rejected_transition_leaves_post_untouched() {
        let (_dir, db) = open_db();
        let author = actor(1, &[Role::Author]);
        let id = create_post(&db, 7, "Title", "Body", PostStatus::Review).unwrap();

        let result = apply_transition(&db, &id, WorkflowAction::Approve, &author);
        assert!(matches!(
            result,
            Err(DbError::TransitionRejected { denial: Denial::InsufficientLevel, .. })
        ));
        let meta = read_post_metadata(&db, &id).unwrap().unwrap();
        assert_eq!(meta.status, PostStatus::Review);
        assert!(meta.last_updated_at.is_none());
        assert!(read_transition_log(&db, &id).unwrap().is_empty());
    }

    #[test]
    fn test_update_draft_only() {
        let (_dir, db) = open_db();
        let author = actor(1, &[Role::Author]);
        let id = create_post(&db, 1, "Old", "Old body", PostStatus::Draft).unwrap();

        let meta = update_draft_post(&db, &author, &id, "New", "New body").unwrap();
        assert_eq!(meta.title, "New");
        assert_eq!(read_post(&db, &id).unwrap().unwrap().content, "New body");

        apply_transition(&db, &id, WorkflowAction::SubmitReview, &author).unwrap();
        assert!(matches!(
            update_draft_post(&db, &author, &id, "Again", "x"),
            Err(DbError::EditNotAllowed(_))
        ));
    }

    #[test]
    fn test_filter_by_author_and_status() {
        let (_dir, db) = open_db();
        create_post(&db, 1, "a", "x", PostStatus::Draft).unwrap();
        create_post(&db, 1, "b", "x", PostStatus::Review).unwrap();
        create_post(&db, 2, "c", "x", PostStatus::Review).unwrap();

        let by_author = PostFilter { status: None, author_id: Some(1) };
        let own = read_post_summaries(&db, by_author, 10, 0).unwrap();
        assert_eq!(own.len(), 2);
        let own_review = read_post_summaries(
            &db,
            PostFilter { status: Some(PostStatus::Review), author_id: Some(1) },
            10,
            0,
        )
        .unwrap();
        assert_eq!(own_review.len(), 1);
        assert_eq!(own_review[0].metadata.title, "b");
        let in_review = PostFilter { status: Some(PostStatus::Review), author_id: None };
        let all_review = read_post_summaries(&db, in_review, 10, 0).unwrap();
        assert_eq!(all_review.len(), 2);
        let paged = read_post_summaries(&db, PostFilter::default(), 2, 2).unwrap();
        assert_eq!(paged.len(), 1);
    }

    #[test]
    fn test_listing_surfaces_storage_errors() {
        let (_dir, db) = open_db();
        let good = create_post(&db, 1, "ok", "x", PostStatus::Review).unwrap();
        let broken = Uuid::new_v4().into_bytes();

        let write_txn = db.begin_write().unwrap();
        {
            let mut metadata_table = write_txn.open_table(METADATA).unwrap();
            let mut status_index = write_txn.open_table(STATUS_INDEX).unwrap();
            metadata_table.insert(&broken, "{not json").unwrap();
            status_index.insert(("REVIEW", i64::MIN, &broken), ()).unwrap();
        }
        write_txn.commit().unwrap();

        assert!(matches!(
            read_post_summaries_by_status(&db, PostStatus::Review, 10, 0),
            Err(DbError::SerdeJson(_))
        ));
        let by_author = PostFilter { status: None, author_id: Some(1) };
        assert!(matches!(read_post_summaries(&db, by_author, 10, 0), Err(DbError::SerdeJson(_))));
        assert!(read_post(&db, &good).unwrap().is_some());
    }

    #[test]
    fn test_dangling_index_entry_is_an_error() {
        let (_dir, db) = open_db();
        let orphan = Uuid::new_v4().into_bytes();

        let write_txn = db.begin_write().unwrap();
        {
            let mut status_index = write_txn.open_table(STATUS_INDEX).unwrap();
            status_index.insert(("DRAFT", 0, &orphan), ()).unwrap();
        }
        write_txn.commit().unwrap();

        assert!(matches!(
            read_post_summaries_by_status(&db, PostStatus::Draft, 10, 0),
            Err(DbError::IndexOutOfSync(_))
        ));
    }

    #[test]
    fn test_published_lookup_hides_other_statuses() {
        let (_dir, db) = open_db();
        let draft = create_post(&db, 1, "d", "x", PostStatus::Draft).unwrap();
        assert!(read_published_post(&db, &draft).unwrap().is_none());

        let editor = actor(3, &[Role::Editor]);
        apply_transition(&db, &draft, WorkflowAction::Publish, &editor).unwrap();
        assert!(read_published_post(&db, &draft).unwrap().is_some());
    }
}
