use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApproverId(pub String);

/// One organizational approval line: who coaches, approves and signs off
/// for a given team member. A request points at exactly one record via
/// `approver_id` and that record fixes the whole chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverRecord {
    pub id: ApproverId,
    pub team_member_email: String,
    pub team_coach_email: String,
    pub team_coach_title: String,
    pub practice_lead_email: String,
    pub practice_lead_title: String,
    pub ceo_email: String,
}
