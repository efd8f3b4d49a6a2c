//! Client-side execution of workflow actions.
//!
//! The dispatcher never decides whether an action is allowed; it only runs an
//! action the server already offered, after the user confirms it:
//! - [`WorkflowBackend`]: one network call per confirmed action
//! - [`Confirm`]: asks the user before anything is sent
//! - [`Notifier`]: reports the outcome back to the user
//!
//! See [`HttpWorkflowBackend`] for the reqwest implementation and
//! [`ConsoleConfirm`]/[`ConsoleNotifier`] for the terminal front end.

mod console;
mod http_backend;

pub use console::{ConsoleConfirm, ConsoleNotifier};
pub use http_backend::HttpWorkflowBackend;

use crate::models::Notification;
use crate::workflow::{ActionDescriptor, PostStatus, WorkflowAction};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The server refused the transition (403, 404, 409 and friends).
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("Network failure: {0}")]
    Network(String),
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl DispatchError {
    /// Stale status on the server: somebody else moved the post first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DispatchError::Rejected { status: 409, .. })
    }
}

/// What the server said after applying an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReply {
    pub message: String,
    pub status: PostStatus,
}

/// Everything a confirmation dialog needs to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub post_id: String,
    pub action: WorkflowAction,
    pub label: String,
    pub message: String,
}

impl ConfirmPrompt {
    pub fn new(post_id: impl Into<String>, action: WorkflowAction) -> Self {
        let label = ActionDescriptor::for_action(action).label;
        let message = format!("Bạn có chắc chắn muốn \"{}\" bài viết này?", label);
        Self { post_id: post_id.into(), action, label, message }
    }
}

#[async_trait::async_trait]
pub trait WorkflowBackend: Send + Sync {
    /// Applies `action` to the post. Exactly one request, never retried.
    async fn perform(
        &self,
        post_id: &str,
        action: WorkflowAction,
    ) -> Result<ActionReply, DispatchError>;
}

#[async_trait::async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A previous dispatch had not finished; nothing was sent.
    Busy,
    /// The user declined; nothing was sent.
    Cancelled,
    Completed { message: String, status: PostStatus },
    Failed { error: DispatchError },
}

/// Clears the in-flight flag when the dispatch ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct WorkflowDispatcher<B> {
    backend: B,
    in_flight: AtomicBool,
}

impl<B: WorkflowBackend> WorkflowDispatcher<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, in_flight: AtomicBool::new(false) }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Confirms and runs one action. Errors never escape; they come back as
    /// [`DispatchOutcome::Failed`] after an error notification.
    pub async fn dispatch<F>(
        &self,
        post_id: &str,
        action: WorkflowAction,
        confirm: &dyn Confirm,
        notifier: &dyn Notifier,
        on_success: F,
    ) -> DispatchOutcome
    where
        F: FnOnce(&ActionReply),
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Dispatch of {} on {} ignored, another one is running", action, post_id);
            return DispatchOutcome::Busy;
        }
        let _guard = InFlight(&self.in_flight);

        let prompt = ConfirmPrompt::new(post_id, action);
        if !confirm.confirm(&prompt).await {
            log::debug!("Dispatch of {} on {} cancelled", action, post_id);
            return DispatchOutcome::Cancelled;
        }

        match self.backend.perform(post_id, action).await {
            Ok(reply) => {
                log::info!("{} on post {} succeeded, now {}", action, post_id, reply.status);
                notifier.notify(Notification::success(reply.message.clone()));
                on_success(&reply);
                DispatchOutcome::Completed { message: reply.message, status: reply.status }
            }
            Err(error) => {
                log::warn!("{} on post {} failed: {}", action, post_id, error);
                notifier.notify(Notification::error(error.to_string()));
                DispatchOutcome::Failed { error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    struct MockBackend {
        calls: AtomicUsize,
        reply: Result<ActionReply, DispatchError>,
    }

    impl MockBackend {
        fn ok(status: PostStatus) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                reply: Ok(ActionReply { message: "done".to_string(), status }),
            }
        }

        fn failing(error: DispatchError) -> Self {
            Self { calls: AtomicUsize::new(0), reply: Err(error) }
        }
    }

    #[async_trait::async_trait]
    impl WorkflowBackend for MockBackend {
        async fn perform(
            &self,
            _post_id: &str,
            _action: WorkflowAction,
        ) -> Result<ActionReply, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    struct Answer(bool);

    #[async_trait::async_trait]
    impl Confirm for Answer {
        async fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Notification>>);

    impl Notifier for Recorder {
        fn notify(&self, notification: Notification) {
            self.0.lock().unwrap().push(notification);
        }
    }

    #[actix_web::test]
    async fn test_declined_confirmation_sends_nothing() {
        let dispatcher = WorkflowDispatcher::new(MockBackend::ok(PostStatus::Review));
        let notes = Recorder::default();
        let mut refreshed = false;

        let outcome = dispatcher
            .dispatch("p1", WorkflowAction::SubmitReview, &Answer(false), &notes, |_| {
                refreshed = true
            })
            .await;

        assert_eq!(outcome, DispatchOutcome::Cancelled);
        assert_eq!(dispatcher.backend().calls.load(Ordering::SeqCst), 0);
        assert!(notes.0.lock().unwrap().is_empty());
        assert!(!refreshed);
        assert!(!dispatcher.is_loading());
    }

    #[actix_web::test]
    async fn test_success_notifies_and_refreshes_once() {
        let dispatcher = WorkflowDispatcher::new(MockBackend::ok(PostStatus::Published));
        let notes = Recorder::default();
        let refreshed = Arc::new(AtomicUsize::new(0));

        let counter = refreshed.clone();
        let outcome = dispatcher
            .dispatch("p1", WorkflowAction::Approve, &Answer(true), &notes, move |reply| {
                assert_eq!(reply.status, PostStatus::Published);
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(
            outcome,
            DispatchOutcome::Completed {
                message: "done".to_string(),
                status: PostStatus::Published,
            }
        );
        assert_eq!(dispatcher.backend().calls.load(Ordering::SeqCst), 1);
        assert_eq!(refreshed.load(Ordering::SeqCst), 1);
        assert_eq!(*notes.0.lock().unwrap(), vec![Notification::success("done")]);
    }

    #[actix_web::test]
    async fn test_failure_is_reported_not_propagated() {
        let error = DispatchError::Rejected {
            status: 409,
            message: "Post already published".to_string(),
        };
        let dispatcher = WorkflowDispatcher::new(MockBackend::failing(error.clone()));
        let notes = Recorder::default();
        let mut refreshed = false;

        let outcome = dispatcher
            .dispatch("p1", WorkflowAction::Approve, &Answer(true), &notes, |_| refreshed = true)
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed { error: error.clone() });
        assert!(error.is_conflict());
        assert!(!refreshed);
        let notes = notes.0.lock().unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].is_error());
        assert_eq!(notes[0].message, "Post already published");
        assert!(!dispatcher.is_loading());
    }

    #[actix_web::test]
    async fn test_network_failure_clears_loading() {
        let error = DispatchError::Network("connection refused".to_string());
        let dispatcher = WorkflowDispatcher::new(MockBackend::failing(error.clone()));
        let notes = Recorder::default();

        let outcome = dispatcher
            .dispatch("p1", WorkflowAction::Publish, &Answer(true), &notes, |_| {
                panic!("refresh after a failed call")
            })
            .await;

        assert_eq!(outcome, DispatchOutcome::Failed { error: error.clone() });
        assert!(!error.is_conflict());
        assert_eq!(dispatcher.backend().calls.load(Ordering::SeqCst), 1);
        assert_eq!(notes.0.lock().unwrap()[0].message, "Network failure: connection refused");
        assert!(!dispatcher.is_loading());

        let outcome = dispatcher
            .dispatch("p1", WorkflowAction::Publish, &Answer(false), &notes, |_| {})
            .await;
        assert_eq!(outcome, DispatchOutcome::Cancelled);
    }

    #[actix_web::test]
    async fn test_busy_while_in_flight() {
        let dispatcher = WorkflowDispatcher::new(MockBackend::ok(PostStatus::Review));
        dispatcher.in_flight.store(true, Ordering::Release);

        let notes = Recorder::default();
        let outcome = dispatcher
            .dispatch("p1", WorkflowAction::SubmitReview, &Answer(true), &notes, |_| {})
            .await;

        assert_eq!(outcome, DispatchOutcome::Busy);
        assert_eq!(dispatcher.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_prompt_uses_action_label() {
        let prompt = ConfirmPrompt::new("p1", WorkflowAction::Reject);
        assert_eq!(prompt.label, "Từ chối");
        assert!(prompt.message.contains("Từ chối"));
    }
}
