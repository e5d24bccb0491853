//! Notification seam invoked by the workflow engine.
//!
//! Notifications are fire-and-forget: the engine signals terminal
//! transitions and step advances and moves on. A failing notifier is logged
//! and never fails the decision that triggered it.

use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowEvent {
    Approved,
    Rejected,
    StepAdvanced,
}

impl WorkflowEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::StepAdvanced => "step_advanced",
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, expense_id: Uuid, event: WorkflowEvent, recipients: &[Uuid]);
}

/// Default notifier: emits a tracing event and nothing else.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, expense_id: Uuid, event: WorkflowEvent, recipients: &[Uuid]) {
        tracing::info!(
            expense = %expense_id,
            event = event.as_str(),
            recipients = recipients.len(),
            "workflow notification"
        );
    }
}
