use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use spendy_core::domain::approver::{ApproverId, ApproverRecord};
use spendy_core::domain::budget::{Budget, BudgetId};
use spendy_core::domain::comment::Comment;
use spendy_core::domain::request::{Request, RequestId};

pub mod approver;
pub mod budget;
pub mod comment;
pub mod memory;
pub mod request;

pub use approver::SqlApproverRepository;
pub use budget::SqlBudgetRepository;
pub use comment::SqlCommentRepository;
pub use memory::{
    InMemoryApproverRepository, InMemoryBudgetRepository, InMemoryCommentRepository,
    InMemoryRequestRepository,
};
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} {id} was modified concurrently (expected version {expected})")]
    Conflict { entity: &'static str, id: String, expected: u32 },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError>;

    async fn save(&self, request: Request) -> Result<(), RepositoryError>;

    /// Persists the request only if the stored row still carries
    /// `expected_version`; returns `Conflict` otherwise.
    async fn save_expecting_version(
        &self,
        request: Request,
        expected_version: u32,
    ) -> Result<(), RepositoryError>;

    async fn delete_with_items(&self, id: &RequestId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait BudgetRepository: Send + Sync {
    async fn find_by_coach_and_year(
        &self,
        team_coach_email: &str,
        year: i32,
    ) -> Result<Option<Budget>, RepositoryError>;

    async fn save(&self, budget: Budget) -> Result<(), RepositoryError>;

    /// Adds `delta` (negative for a deduction) to the available amount in a
    /// single atomic update and returns the new available amount.
    async fn adjust_available(
        &self,
        id: &BudgetId,
        delta: Decimal,
    ) -> Result<Decimal, RepositoryError>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn append(&self, comment: Comment) -> Result<(), RepositoryError>;

    async fn list_by_request(&self, request_id: &RequestId)
        -> Result<Vec<Comment>, RepositoryError>;
}

#[async_trait]
pub trait ApproverRepository: Send + Sync {
    async fn find_by_id(&self, id: &ApproverId) -> Result<Option<ApproverRecord>, RepositoryError>;

    async fn find_by_member_email(
        &self,
        team_member_email: &str,
    ) -> Result<Option<ApproverRecord>, RepositoryError>;

    async fn save(&self, approver: ApproverRecord) -> Result<(), RepositoryError>;
}
