//! Property-based tests for the permission evaluator.

#[cfg(test)]
mod tests {
    use crate::workflow::evaluator::{
        available_actions, can_see_approval_actions, role_level, Actor, PostRef,
    };
    use crate::workflow::roles::{Role, RoleSet, APPROVAL_TIER_MIN_LEVEL};
    use crate::workflow::status::PostStatus;
    use crate::workflow::transitions::{can_perform, permits, WorkflowAction};
    use proptest::prelude::*;

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    fn any_role_set() -> impl Strategy<Value = RoleSet> {
        prop::collection::vec(any_role(), 0..5).prop_map(|roles| roles.into_iter().collect())
    }

    fn author_tier_role_set() -> impl Strategy<Value = RoleSet> {
        let author_tier: Vec<Role> =
            Role::ALL.iter().copied().filter(|r| r.is_author_tier()).collect();
        prop::collection::vec(prop::sample::select(author_tier), 1..4)
            .prop_map(|roles| roles.into_iter().collect())
    }

    fn any_status() -> impl Strategy<Value = PostStatus> {
        prop::sample::select(PostStatus::ALL.to_vec())
    }

    fn any_action() -> impl Strategy<Value = WorkflowAction> {
        prop::sample::select(WorkflowAction::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn can_perform_is_deterministic(
            action in any_action(),
            status in any_status(),
            level in 0u8..=10,
            is_owner in any::<bool>(),
        ) {
            let first = can_perform(action, status.as_str(), level, is_owner);
            let second = can_perform(action, status.as_str(), level, is_owner);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn status_case_never_matters(
            action in any_action(),
            status in any_status(),
            level in 0u8..=10,
            is_owner in any::<bool>(),
        ) {
            let upper = can_perform(action, status.as_str(), level, is_owner);
            let lower = can_perform(action, &status.as_str().to_lowercase(), level, is_owner);
            prop_assert_eq!(upper, lower);
        }

        #[test]
        fn super_admin_always_sees_approval_actions(mut roles in any_role_set()) {
            roles.insert(Role::SuperAdmin);
            prop_assert!(can_see_approval_actions(&roles));
        }

        #[test]
        fn author_tier_never_sees_approval_actions(roles in author_tier_role_set()) {
            prop_assert!(roles.level() < APPROVAL_TIER_MIN_LEVEL);
            prop_assert!(!can_see_approval_actions(&roles));
        }

        #[test]
        fn level_is_the_maximum_role_level(roles in any_role_set()) {
            let expected = roles.iter().map(Role::level).max().unwrap_or(0);
            prop_assert_eq!(role_level(&roles), expected);
        }

        #[test]
        fn higher_level_never_loses_an_action(
            action in any_action(),
            status in any_status(),
            level in 0u8..10,
            is_owner in any::<bool>(),
        ) {
            if permits(action, status, level, is_owner) {
                prop_assert!(permits(action, status, level + 1, is_owner));
            }
        }

        #[test]
        fn available_actions_respect_status_gate(
            roles in any_role_set(),
            status in any_status(),
            author_id in 0i32..3,
        ) {
            let actor = Actor::new(1, "prop", roles);
            let post = PostRef { status, author_id };
            for descriptor in available_actions(&actor, &post) {
                prop_assert!(descriptor.key.rule().accepts_status(status));
            }
        }
    }
}
