use crate::workflow::{PostRef, PostStatus, RoleSet, WorkflowAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TransitionLogEntry {
    pub sequence: u32, // Sequential number for ordering
    pub action: WorkflowAction,
    pub from: PostStatus,
    pub to: PostStatus,
    pub actor_id: i32,
    pub actor_username: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PostMetadata {
    pub title: String,
    pub status: PostStatus,
    pub author_id: i32,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl PostMetadata {
    pub fn post_ref(&self) -> PostRef {
        PostRef { status: self.status, author_id: self.author_id }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct FullPost {
    pub id: String,
    pub metadata: PostMetadata,
    pub content: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct PostSummary {
    pub id: String,
    pub metadata: PostMetadata,
}

#[derive(Debug, Serialize, Clone)]
pub struct UserAccount {
    pub id: i32,
    pub username: String,
    pub roles: RoleSet,
    pub is_active: bool,
    pub last_login_time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub r#type: String, // 'success' or 'error'
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { message: message.into(), r#type: "success".to_string() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { message: message.into(), r#type: "error".to_string() }
    }

    pub fn is_error(&self) -> bool {
        self.r#type == "error"
    }
}

/// JSON envelope shared by the API and its client.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, message: None, data: Some(data), error: None }
    }

    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: Some(message.into()), data: Some(data), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, message: None, data: None, error: Some(error.into()) }
    }
}

pub mod db_operations;
