use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approver::ApproverId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestItemId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Draft,
    Submitted,
    Resubmitted,
    AwaitingCeoApproval,
    HrProcessing,
    Rejected,
    Booking,
    Completed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Booking | Self::Completed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Training,
    Travel,
    Accommodation,
    Software,
}

/// Advisory team-coach opinion. Never blocks or advances the workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoachOpinion {
    Approve,
    Disapprove,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestItem {
    pub id: RequestItemId,
    pub kind: ItemKind,
    pub description: String,
    pub cost: Decimal,
    pub start_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub title: String,
    pub status: RequestStatus,
    pub total_cost: Decimal,
    pub author_email: String,
    pub author_name: String,
    pub approver_id: ApproverId,
    pub team_coach_opinion: Option<CoachOpinion>,
    pub approved_by_ceo: bool,
    pub changed_by_hr: bool,
    /// True while this request's cost is deducted from a budget.
    pub budget_committed: bool,
    pub submission_date: Option<DateTime<Utc>>,
    pub deadline_date: Option<NaiveDate>,
    pub version: u32,
    pub items: Vec<RequestItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Request {
    /// Re-derives `total_cost` and `deadline_date` from the live items.
    /// Must run after every item mutation.
    pub fn recompute_totals(&mut self) {
        self.total_cost = self.items.iter().map(|item| item.cost).sum();
        self.deadline_date = self.items.iter().filter_map(|item| item.start_date).min();
    }

    pub fn replace_items(&mut self, items: Vec<RequestItem>) {
        self.items = items;
        self.recompute_totals();
    }

    /// Item-edit path for HR after submission: swaps the items and flags
    /// the request for re-approval. The flag is consumed by the
    /// Reapprove / MarkCompleted actions.
    pub fn apply_hr_item_change(&mut self, items: Vec<RequestItem>) {
        self.replace_items(items);
        self.changed_by_hr = true;
    }
}
