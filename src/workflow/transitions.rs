//! The post lifecycle as one declarative table.
//!
//! Every check in the crate, client or server, goes through [`TRANSITIONS`].

use super::roles::APPROVAL_TIER_MIN_LEVEL;
use super::status::PostStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Level needed to publish or archive.
pub const PUBLISH_MIN_LEVEL: u8 = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown workflow action: '{0}'")]
pub struct UnknownAction(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowAction {
    SubmitReview,
    Approve,
    Reject,
    Publish,
    Archive,
}

impl WorkflowAction {
    pub const ALL: [WorkflowAction; 5] = [
        WorkflowAction::SubmitReview,
        WorkflowAction::Approve,
        WorkflowAction::Reject,
        WorkflowAction::Publish,
        WorkflowAction::Archive,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            WorkflowAction::SubmitReview => "submit-review",
            WorkflowAction::Approve => "approve",
            WorkflowAction::Reject => "reject",
            WorkflowAction::Publish => "publish",
            WorkflowAction::Archive => "archive",
        }
    }

    /// Rows of [`TRANSITIONS`] are laid out in variant order.
    pub fn rule(self) -> &'static TransitionRule {
        &TRANSITIONS[self as usize]
    }

    pub fn target(self) -> PostStatus {
        self.rule().to
    }

    /// Message returned to clients when the transition is applied.
    pub const fn success_message(self) -> &'static str {
        match self {
            WorkflowAction::SubmitReview => "Post submitted for review.",
            WorkflowAction::Approve => "Post approved and published.",
            WorkflowAction::Reject => "Post rejected.",
            WorkflowAction::Publish => "Post published.",
            WorkflowAction::Archive => "Post archived.",
        }
    }
}

impl fmt::Display for WorkflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for WorkflowAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        WorkflowAction::ALL
            .iter()
            .copied()
            .find(|action| action.key() == normalized)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

#[derive(Debug)]
pub struct TransitionRule {
    pub action: WorkflowAction,
    pub from: &'static [PostStatus],
    pub min_level: u8,
    /// Owners pass the level gate for this action.
    pub owner_allowed: bool,
    pub to: PostStatus,
}

pub static TRANSITIONS: [TransitionRule; 5] = [
    TransitionRule {
        action: WorkflowAction::SubmitReview,
        from: &[PostStatus::Draft],
        min_level: APPROVAL_TIER_MIN_LEVEL,
        owner_allowed: true,
        to: PostStatus::Review,
    },
    TransitionRule {
        action: WorkflowAction::Approve,
        from: &[PostStatus::Review],
        min_level: APPROVAL_TIER_MIN_LEVEL,
        owner_allowed: false,
        to: PostStatus::Published,
    },
    TransitionRule {
        action: WorkflowAction::Reject,
        from: &[PostStatus::Review],
        min_level: APPROVAL_TIER_MIN_LEVEL,
        owner_allowed: false,
        to: PostStatus::Rejected,
    },
    TransitionRule {
        action: WorkflowAction::Publish,
        from: &[PostStatus::Draft, PostStatus::Review],
        min_level: PUBLISH_MIN_LEVEL,
        owner_allowed: false,
        to: PostStatus::Published,
    },
    TransitionRule {
        action: WorkflowAction::Archive,
        from: &[PostStatus::Published],
        min_level: PUBLISH_MIN_LEVEL,
        owner_allowed: false,
        to: PostStatus::Archived,
    },
];

/// Why a transition is not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    /// The post is not in a status this action starts from.
    WrongStatus,
    /// The status fits but the actor ranks too low and doesn't own the post.
    InsufficientLevel,
}

impl TransitionRule {
    pub fn accepts_status(&self, status: PostStatus) -> bool {
        self.from.contains(&status)
    }

    pub fn denial(&self, status: PostStatus, actor_level: u8, is_owner: bool) -> Option<Denial> {
        if !self.accepts_status(status) {
            return Some(Denial::WrongStatus);
        }
        if actor_level >= self.min_level || (self.owner_allowed && is_owner) {
            None
        } else {
            Some(Denial::InsufficientLevel)
        }
    }
}

pub fn denial(
    action: WorkflowAction,
    status: PostStatus,
    actor_level: u8,
    is_owner: bool,
) -> Option<Denial> {
    action.rule().denial(status, actor_level, is_owner)
}

pub fn permits(
    action: WorkflowAction,
    status: PostStatus,
    actor_level: u8,
    is_owner: bool,
) -> bool {
    denial(action, status, actor_level, is_owner).is_none()
}

/// String-status entry point. A status that doesn't parse allows nothing.
pub fn can_perform(action: WorkflowAction, status: &str, actor_level: u8, is_owner: bool) -> bool {
    match PostStatus::parse_lenient(status) {
        Some(status) => permits(action, status, actor_level, is_owner),
        None => false,
    }
}
