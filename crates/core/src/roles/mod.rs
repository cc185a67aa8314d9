use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::approver::{ApproverId, ApproverRecord};
use crate::domain::request::Request;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Requester,
    TeamCoach,
    PracticeLead,
    DeliveryDirector,
    Hr,
}

/// The full set of roles an actor holds for one request. An actor can
/// hold several at once (a coach approving their own request is both
/// Requester and TeamCoach).
pub type RoleSet = BTreeSet<Role>;

/// Resolves actor emails onto workflow roles. Matching is exact email
/// equality (case-insensitive) against the approver record the request
/// points at; HR membership comes from an external group check and is
/// supplied up front.
#[derive(Clone, Debug, Default)]
pub struct RoleResolver {
    hr_members: HashSet<String>,
}

impl RoleResolver {
    pub fn new(hr_member_emails: Vec<String>) -> Self {
        Self {
            hr_members: hr_member_emails.into_iter().map(|email| normalize_email(&email)).collect(),
        }
    }

    pub fn is_hr_member(&self, email: &str) -> bool {
        self.hr_members.contains(&normalize_email(email))
    }

    pub fn roles_for(
        &self,
        actor_email: &str,
        request: &Request,
        approver: &ApproverRecord,
    ) -> RoleSet {
        let actor = normalize_email(actor_email);
        let mut roles = RoleSet::new();

        if actor == normalize_email(&request.author_email) {
            roles.insert(Role::Requester);
        }
        if actor == normalize_email(&approver.team_coach_email) {
            roles.insert(Role::TeamCoach);
        }
        if actor == normalize_email(&approver.practice_lead_email) {
            roles.insert(Role::PracticeLead);
        }
        if actor == normalize_email(&approver.ceo_email) {
            roles.insert(Role::DeliveryDirector);
        }
        if self.hr_members.contains(&actor) {
            roles.insert(Role::Hr);
        }

        roles
    }
}

/// Indexed approver lookup. Small sets would survive a linear scan, but
/// the index keeps resolution O(1) as the org grows.
#[derive(Clone, Debug, Default)]
pub struct ApproverDirectory {
    by_id: HashMap<String, ApproverRecord>,
    by_member_email: HashMap<String, ApproverRecord>,
}

impl ApproverDirectory {
    pub fn new(records: Vec<ApproverRecord>) -> Self {
        let mut directory = Self::default();
        for record in records {
            directory.insert(record);
        }
        directory
    }

    pub fn insert(&mut self, record: ApproverRecord) {
        self.by_member_email.insert(normalize_email(&record.team_member_email), record.clone());
        self.by_id.insert(record.id.0.clone(), record);
    }

    pub fn find_by_id(&self, id: &ApproverId) -> Option<&ApproverRecord> {
        self.by_id.get(&id.0)
    }

    pub fn find_by_member_email(&self, email: &str) -> Option<&ApproverRecord> {
        self.by_member_email.get(&normalize_email(email))
    }
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
