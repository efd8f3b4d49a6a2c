use super::roles::{RoleSet, APPROVAL_TIER_MIN_LEVEL, MAX_LEVEL};
use super::status::PostStatus;
use super::transitions::{self, Denial, WorkflowAction, PUBLISH_MIN_LEVEL, TRANSITIONS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest level allowed to create a post straight into review.
pub const CREATE_IN_REVIEW_MIN_LEVEL: u8 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("A new post cannot start in status {0}")]
    InvalidInitialStatus(PostStatus),
    #[error("Level {level} is too low to create a post in status {status}")]
    InitialStatusNotPermitted { status: PostStatus, level: u8 },
}

/// The user on whose behalf a decision is made.
///
/// Built per request from the session and passed in explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i32,
    pub username: String,
    pub roles: RoleSet,
}

impl Actor {
    pub fn new(id: i32, username: impl Into<String>, roles: RoleSet) -> Self {
        Self { id, username: username.into(), roles }
    }

    /// Level used for gating. `super_admin` clears every level gate.
    pub fn effective_level(&self) -> u8 {
        if self.roles.is_super_admin() {
            MAX_LEVEL
        } else {
            role_level(&self.roles)
        }
    }

    pub fn owns(&self, post: &PostRef) -> bool {
        post.author_id == self.id
    }

    pub fn can_see_approval_actions(&self) -> bool {
        can_see_approval_actions(&self.roles)
    }
}

/// The slice of a post the evaluator looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostRef {
    pub status: PostStatus,
    pub author_id: i32,
}

/// A permitted action as handed to a render layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub key: WorkflowAction,
    pub label: String,
    pub variant: String,
    pub icon: String,
}

impl ActionDescriptor {
    pub fn for_action(action: WorkflowAction) -> Self {
        let (label, variant, icon) = match action {
            WorkflowAction::SubmitReview => ("Gửi duyệt", "primary", "send"),
            WorkflowAction::Approve => ("Duyệt bài", "success", "check-circle"),
            WorkflowAction::Reject => ("Từ chối", "danger", "x-circle"),
            WorkflowAction::Publish => ("Xuất bản", "success", "globe"),
            WorkflowAction::Archive => ("Lưu trữ", "secondary", "archive"),
        };
        Self {
            key: action,
            label: label.to_string(),
            variant: variant.to_string(),
            icon: icon.to_string(),
        }
    }
}

pub fn role_level(roles: &RoleSet) -> u8 {
    roles.level()
}

pub fn can_see_approval_actions(roles: &RoleSet) -> bool {
    if roles.is_super_admin() {
        return true;
    }
    role_level(roles) >= APPROVAL_TIER_MIN_LEVEL && !roles.is_author_tier_only()
}

pub fn actor_denial(actor: &Actor, action: WorkflowAction, post: &PostRef) -> Option<Denial> {
    transitions::denial(action, post.status, actor.effective_level(), actor.owns(post))
}

pub fn actor_can_perform(actor: &Actor, action: WorkflowAction, post: &PostRef) -> bool {
    actor_denial(actor, action, post).is_none()
}

/// Actions `actor` may run on `post` right now, in table order.
pub fn available_actions(actor: &Actor, post: &PostRef) -> Vec<ActionDescriptor> {
    let sees_approval = actor.can_see_approval_actions();
    TRANSITIONS
        .iter()
        .map(|rule| rule.action)
        .filter(|action| {
            let approval_only = matches!(action, WorkflowAction::Approve | WorkflowAction::Reject);
            !(approval_only && !sees_approval)
        })
        .filter(|action| actor_can_perform(actor, *action, post))
        .map(ActionDescriptor::for_action)
        .collect()
}

/// Published posts are visible to everyone signed in. Anything else only to
/// its owner and the approval tier.
pub fn can_view(actor: &Actor, post: &PostRef) -> bool {
    post.status == PostStatus::Published || actor.owns(post) || actor.can_see_approval_actions()
}

/// Title and content can change only while the post is a draft, and only
/// by its owner or someone allowed to publish.
pub fn can_edit(actor: &Actor, post: &PostRef) -> bool {
    post.status == PostStatus::Draft
        && (actor.owns(post) || actor.effective_level() >= PUBLISH_MIN_LEVEL)
}

/// Status a freshly created post starts in.
pub fn initial_status(
    requested: Option<PostStatus>,
    level: u8,
) -> Result<PostStatus, WorkflowError> {
    match requested.unwrap_or(PostStatus::Draft) {
        PostStatus::Draft => Ok(PostStatus::Draft),
        PostStatus::Review if level >= CREATE_IN_REVIEW_MIN_LEVEL => Ok(PostStatus::Review),
        PostStatus::Review => Err(WorkflowError::InitialStatusNotPermitted {
            status: PostStatus::Review,
            level,
        }),
        other => Err(WorkflowError::InvalidInitialStatus(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::roles::Role;

    fn actor(id: i32, roles: &[Role]) -> Actor {
        Actor::new(id, format!("user{}", id), roles.iter().copied().collect())
    }

    fn keys(actions: &[ActionDescriptor]) -> Vec<WorkflowAction> {
        actions.iter().map(|a| a.key).collect()
    }

    #[test]
    fn test_author_owner_on_draft_gets_submit_review_only() {
        let author = actor(1, &[Role::Author]);
        let post = PostRef { status: PostStatus::Draft, author_id: 1 };
        assert_eq!(keys(&available_actions(&author, &post)), vec![WorkflowAction::SubmitReview]);
    }

    #[test]
    fn test_author_on_foreign_draft_gets_nothing() {
        let author = actor(1, &[Role::Author]);
        let post = PostRef { status: PostStatus::Draft, author_id: 2 };
        assert!(available_actions(&author, &post).is_empty());
    }

    #[test]
    fn test_moderator_on_review_gets_approve_and_reject() {
        let moderator = actor(3, &[Role::Moderator]);
        let post = PostRef { status: PostStatus::Review, author_id: 1 };
        let actions = keys(&available_actions(&moderator, &post));
        assert!(actions.contains(&WorkflowAction::Approve));
        assert!(actions.contains(&WorkflowAction::Reject));
        assert!(!actions.contains(&WorkflowAction::Publish));
    }

    #[test]
    fn test_super_admin_on_published_gets_archive_only() {
        let root = actor(9, &[Role::SuperAdmin]);
        let post = PostRef { status: PostStatus::Published, author_id: 1 };
        assert_eq!(keys(&available_actions(&root, &post)), vec![WorkflowAction::Archive]);
    }

    #[test]
    fn test_editor_on_review_gets_approve_reject_publish() {
        let editor = actor(4, &[Role::Editor, Role::Author]);
        let post = PostRef { status: PostStatus::Review, author_id: 1 };
        assert_eq!(
            keys(&available_actions(&editor, &post)),
            vec![WorkflowAction::Approve, WorkflowAction::Reject, WorkflowAction::Publish]
        );
    }

    #[test]
    fn test_no_roles_owner_can_still_submit() {
        let nobody = actor(5, &[]);
        let own = PostRef { status: PostStatus::Draft, author_id: 5 };
        assert_eq!(keys(&available_actions(&nobody, &own)), vec![WorkflowAction::SubmitReview]);
        let review = PostRef { status: PostStatus::Review, author_id: 5 };
        assert!(available_actions(&nobody, &review).is_empty());
    }

    #[test]
    fn test_approval_visibility() {
        assert!(can_see_approval_actions(&RoleSet::from([Role::SuperAdmin])));
        assert!(can_see_approval_actions(&RoleSet::from([Role::Moderator])));
        assert!(can_see_approval_actions(&RoleSet::from([Role::Author, Role::Admin])));
        assert!(!can_see_approval_actions(&RoleSet::from([Role::SeniorWriter, Role::Author])));
        assert!(!can_see_approval_actions(&RoleSet::new()));
    }

    #[test]
    fn test_descriptor_shape() {
        let descriptor = ActionDescriptor::for_action(WorkflowAction::Reject);
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["key"], "reject");
        assert_eq!(json["variant"], "danger");
        assert_eq!(json["icon"], "x-circle");
    }

    #[test]
    fn test_can_view() {
        let author = actor(1, &[Role::Author]);
        let moderator = actor(2, &[Role::Moderator]);
        let foreign_review = PostRef { status: PostStatus::Review, author_id: 3 };
        let foreign_published = PostRef { status: PostStatus::Published, author_id: 3 };
        assert!(!can_view(&author, &foreign_review));
        assert!(can_view(&author, &foreign_published));
        assert!(can_view(&moderator, &foreign_review));
    }

    #[test]
    fn test_can_edit_drafts_only() {
        let author = actor(1, &[Role::Author]);
        let editor = actor(2, &[Role::Editor]);
        let own_draft = PostRef { status: PostStatus::Draft, author_id: 1 };
        let own_review = PostRef { status: PostStatus::Review, author_id: 1 };
        let foreign_draft = PostRef { status: PostStatus::Draft, author_id: 3 };
        assert!(can_edit(&author, &own_draft));
        assert!(!can_edit(&author, &own_review));
        assert!(!can_edit(&author, &foreign_draft));
        assert!(can_edit(&editor, &foreign_draft));
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(initial_status(None, 0), Ok(PostStatus::Draft));
        assert_eq!(initial_status(Some(PostStatus::Review), 2), Ok(PostStatus::Review));
        assert!(matches!(
            initial_status(Some(PostStatus::Review), 1),
            Err(WorkflowError::InitialStatusNotPermitted { .. })
        ));
        assert_eq!(
            initial_status(Some(PostStatus::Published), 10),
            Err(WorkflowError::InvalidInitialStatus(PostStatus::Published))
        );
    }
}
