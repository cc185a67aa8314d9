use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::RwLock;

use spendy_core::domain::approver::{ApproverId, ApproverRecord};
use spendy_core::domain::budget::{Budget, BudgetId};
use spendy_core::domain::comment::Comment;
use spendy_core::domain::request::{Request, RequestId};
use spendy_core::roles::normalize_email;

use super::{
    ApproverRepository, BudgetRepository, CommentRepository, RepositoryError, RequestRepository,
};

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, Request>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn save(&self, request: Request) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn save_expecting_version(
        &self,
        request: Request,
        expected_version: u32,
    ) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        match requests.get(&request.id.0) {
            Some(stored) if stored.version == expected_version => {
                requests.insert(request.id.0.clone(), request);
                Ok(())
            }
            _ => Err(RepositoryError::Conflict {
                entity: "request",
                id: request.id.0.clone(),
                expected: expected_version,
            }),
        }
    }

    async fn delete_with_items(&self, id: &RequestId) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        requests.remove(&id.0);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBudgetRepository {
    budgets: RwLock<HashMap<String, Budget>>,
}

#[async_trait::async_trait]
impl BudgetRepository for InMemoryBudgetRepository {
    async fn find_by_coach_and_year(
        &self,
        team_coach_email: &str,
        year: i32,
    ) -> Result<Option<Budget>, RepositoryError> {
        let needle = normalize_email(team_coach_email);
        let budgets = self.budgets.read().await;
        Ok(budgets
            .values()
            .find(|b| normalize_email(&b.team_coach_email) == needle && b.year == year)
            .cloned())
    }

    async fn save(&self, budget: Budget) -> Result<(), RepositoryError> {
        let mut budgets = self.budgets.write().await;
        budgets.insert(budget.id.0.clone(), budget);
        Ok(())
    }

    async fn adjust_available(
        &self,
        id: &BudgetId,
        delta: Decimal,
    ) -> Result<Decimal, RepositoryError> {
        let mut budgets = self.budgets.write().await;
        match budgets.get_mut(&id.0) {
            Some(budget) => {
                budget.available += delta;
                Ok(budget.available)
            }
            None => Err(RepositoryError::NotFound { entity: "budget", id: id.0.clone() }),
        }
    }
}

#[derive(Default)]
pub struct InMemoryCommentRepository {
    comments: RwLock<Vec<Comment>>,
}

#[async_trait::async_trait]
impl CommentRepository for InMemoryCommentRepository {
    async fn append(&self, comment: Comment) -> Result<(), RepositoryError> {
        let mut comments = self.comments.write().await;
        comments.push(comment);
        Ok(())
    }

    async fn list_by_request(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let comments = self.comments.read().await;
        let mut matching: Vec<Comment> =
            comments.iter().filter(|c| c.request_id == *request_id).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }
}

#[derive(Default)]
pub struct InMemoryApproverRepository {
    approvers: RwLock<HashMap<String, ApproverRecord>>,
}

#[async_trait::async_trait]
impl ApproverRepository for InMemoryApproverRepository {
    async fn find_by_id(&self, id: &ApproverId) -> Result<Option<ApproverRecord>, RepositoryError> {
        let approvers = self.approvers.read().await;
        Ok(approvers.get(&id.0).cloned())
    }

    async fn find_by_member_email(
        &self,
        team_member_email: &str,
    ) -> Result<Option<ApproverRecord>, RepositoryError> {
        let needle = normalize_email(team_member_email);
        let approvers = self.approvers.read().await;
        Ok(approvers
            .values()
            .find(|a| normalize_email(&a.team_member_email) == needle)
            .cloned())
    }

    async fn save(&self, approver: ApproverRecord) -> Result<(), RepositoryError> {
        let mut approvers = self.approvers.write().await;
        approvers.insert(approver.id.0.clone(), approver);
        Ok(())
    }
}
