use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::approver::ApproverRecord;
use crate::domain::request::{Request, RequestId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    NewRequest,
    HrProcessing,
    Deny,
    Reapprove,
}

/// Structured payload handed to the external dispatcher. The core only
/// assembles it; templating and delivery live outside this workspace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationDirective {
    pub email_kind: EmailKind,
    pub request_id: RequestId,
    pub title: String,
    pub total_cost: Decimal,
    pub author_email: String,
    pub author_name: String,
    pub approver_email: String,
    pub approver_title: String,
    pub team_coach_email: String,
    pub team_coach_title: String,
    pub comment: Option<String>,
}

impl NotificationDirective {
    pub fn assemble(
        email_kind: EmailKind,
        request: &Request,
        approver: &ApproverRecord,
        comment: Option<&str>,
    ) -> Self {
        Self {
            email_kind,
            request_id: request.id.clone(),
            title: request.title.clone(),
            total_cost: request.total_cost,
            author_email: request.author_email.clone(),
            author_name: request.author_name.clone(),
            approver_email: approver.practice_lead_email.clone(),
            approver_title: approver.practice_lead_title.clone(),
            team_coach_email: approver.team_coach_email.clone(),
            team_coach_title: approver.team_coach_title.clone(),
            comment: comment.map(str::to_string),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Fire-and-forget from the engine's perspective: a dispatch failure is
/// logged by the caller and never rolls back a committed transition.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, directive: &NotificationDirective) -> Result<(), DispatchError>;
}

#[derive(Clone, Default)]
pub struct InMemoryDispatcher {
    sent: Arc<Mutex<Vec<NotificationDirective>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl InMemoryDispatcher {
    pub fn failing(reason: impl Into<String>) -> Self {
        let dispatcher = Self::default();
        match dispatcher.fail_with.lock() {
            Ok(mut slot) => *slot = Some(reason.into()),
            Err(poisoned) => *poisoned.into_inner() = Some(reason.into()),
        }
        dispatcher
    }

    pub fn sent(&self) -> Vec<NotificationDirective> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl NotificationDispatcher for InMemoryDispatcher {
    fn dispatch(&self, directive: &NotificationDirective) -> Result<(), DispatchError> {
        let failure = match self.fail_with.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(reason) = failure {
            return Err(DispatchError::Delivery(reason));
        }

        match self.sent.lock() {
            Ok(mut sent) => sent.push(directive.clone()),
            Err(poisoned) => poisoned.into_inner().push(directive.clone()),
        }
        Ok(())
    }
}
