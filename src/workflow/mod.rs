//! Post workflow rules: roles, statuses, the transition table and the evaluator built on it.

pub mod evaluator;
pub mod roles;
pub mod status;
pub mod transitions;

mod property_tests;

pub use evaluator::{
    actor_can_perform, actor_denial, available_actions, can_edit, can_see_approval_actions,
    can_view, initial_status, role_level, ActionDescriptor, Actor, PostRef, WorkflowError,
};
pub use roles::{Role, RoleSet, UnknownRole};
pub use status::PostStatus;
pub use transitions::{can_perform, denial, permits, Denial, UnknownAction, WorkflowAction};
