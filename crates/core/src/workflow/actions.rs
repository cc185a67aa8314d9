use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approver::ApproverRecord;
use crate::domain::budget::Budget;
use crate::domain::request::{CoachOpinion, Request};
use crate::notify::NotificationDirective;
use crate::roles::RoleSet;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestAction {
    Send,
    Approve,
    Deny,
    Reapprove,
    MarkCompleted,
    Discard,
    CoachOpinion(CoachOpinion),
}

impl RequestAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Send => ActionKind::Send,
            Self::Approve => ActionKind::Approve,
            Self::Deny => ActionKind::Deny,
            Self::Reapprove => ActionKind::Reapprove,
            Self::MarkCompleted => ActionKind::MarkCompleted,
            Self::Discard => ActionKind::Discard,
            Self::CoachOpinion(_) => ActionKind::CoachOpinion,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Send,
    Approve,
    Deny,
    Reapprove,
    MarkCompleted,
    Discard,
    CoachOpinion,
}

/// Everything the engine needs besides the request itself: who is
/// acting, their resolved roles, the optional comment body, a snapshot
/// of the coach's budget for the current year (None skips budget
/// effects), and the approver record the request points at.
#[derive(Clone, Debug)]
pub struct ActionContext<'a> {
    pub actor_email: &'a str,
    pub roles: &'a RoleSet,
    pub comment: Option<&'a str>,
    pub budget: Option<&'a Budget>,
    pub approver: &'a ApproverRecord,
    pub now: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BudgetEffect {
    None,
    Deduct { amount: Decimal },
    Restore { amount: Decimal },
}

/// Comment the caller must append alongside the transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub author_email: String,
    pub body: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ApplyOutcome {
    pub request: Request,
    pub budget_effect: BudgetEffect,
    pub notification: Option<NotificationDirective>,
    pub comment: Option<NewComment>,
    /// Advisory only: the deduction would push (or has pushed) the
    /// budget below zero. Never blocks the transition.
    pub over_budget: bool,
    /// Discard: the caller deletes the request and its items.
    pub discard: bool,
}
