use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use spendy_core::domain::comment::{Comment, CommentId};
use spendy_core::domain::request::{Request, RequestId};
use spendy_core::errors::{ApplicationError, DomainError};
use spendy_core::notify::NotificationDispatcher;
use spendy_core::roles::RoleResolver;
use spendy_core::workflow::{ActionContext, BudgetEffect, RequestAction, WorkflowEngine};

use crate::repositories::budget::{adjust_available_in, fetch_budget_by_coach_and_year_in};
use crate::repositories::comment::append_comment_in;
use crate::repositories::request::{
    delete_request_in, fetch_request_in, update_request_expecting_version_in,
};
use crate::repositories::{approver::fetch_approver_in, RepositoryError};
use crate::DbPool;

/// What the caller gets back after an action: the updated request, the
/// side effects that were persisted, and whether the notification
/// actually went out (delivery failures never roll back the
/// transition).
#[derive(Clone, Debug)]
pub struct ActionReceipt {
    pub request: Request,
    pub over_budget: bool,
    pub notified: bool,
    pub budget_available: Option<Decimal>,
    pub discarded: bool,
}

/// Drives one action end to end: load state, resolve roles, run the
/// engine, then persist the request update, budget adjustment, and
/// comment in a single transaction.
pub struct WorkflowService<D: NotificationDispatcher> {
    pool: DbPool,
    engine: WorkflowEngine,
    resolver: RoleResolver,
    dispatcher: D,
}

fn map_repo(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::Conflict { .. } => ApplicationError::Conflict(error.to_string()),
        other => ApplicationError::Persistence(other.to_string()),
    }
}

impl<D: NotificationDispatcher> WorkflowService<D> {
    pub fn new(pool: DbPool, engine: WorkflowEngine, resolver: RoleResolver, dispatcher: D) -> Self {
        Self { pool, engine, resolver, dispatcher }
    }

    pub async fn execute(
        &self,
        request_id: &RequestId,
        actor_email: &str,
        action: RequestAction,
        comment: Option<&str>,
    ) -> Result<ActionReceipt, ApplicationError> {
        self.execute_inner(request_id, actor_email, action, comment, None).await
    }

    /// Optimistic variant: `expected_version` is the version the actor
    /// last observed. A mismatch comes back as a retryable conflict
    /// before any effect is applied, so acting on stale state can never
    /// double-deduct.
    pub async fn execute_expecting_version(
        &self,
        request_id: &RequestId,
        actor_email: &str,
        action: RequestAction,
        comment: Option<&str>,
        expected_version: u32,
    ) -> Result<ActionReceipt, ApplicationError> {
        self.execute_inner(request_id, actor_email, action, comment, Some(expected_version)).await
    }

    async fn execute_inner(
        &self,
        request_id: &RequestId,
        actor_email: &str,
        action: RequestAction,
        comment: Option<&str>,
        expected_version: Option<u32>,
    ) -> Result<ActionReceipt, ApplicationError> {
        let now = Utc::now();

        let mut conn = self.pool.acquire().await.map_err(|e| map_repo(e.into()))?;
        let request = fetch_request_in(&mut *conn, request_id)
            .await
            .map_err(map_repo)?
            .ok_or_else(|| {
                ApplicationError::Domain(DomainError::NotFound {
                    entity: "request",
                    id: request_id.0.clone(),
                })
            })?;
        let approver = fetch_approver_in(&mut *conn, &request.approver_id)
            .await
            .map_err(map_repo)?
            .ok_or_else(|| {
                ApplicationError::Domain(DomainError::NotFound {
                    entity: "approver",
                    id: request.approver_id.0.clone(),
                })
            })?;
        // Missing budget record: the engine skips budget effects.
        let budget =
            fetch_budget_by_coach_and_year_in(&mut *conn, &approver.team_coach_email, now.year())
                .await
                .map_err(map_repo)?;
        drop(conn);

        if let Some(expected) = expected_version {
            if expected != request.version {
                return Err(ApplicationError::Conflict(format!(
                    "request {} was modified concurrently (expected version {expected}, found {})",
                    request_id.0, request.version
                )));
            }
        }

        let roles = self.resolver.roles_for(actor_email, &request, &approver);
        let ctx = ActionContext {
            actor_email,
            roles: &roles,
            comment,
            budget: budget.as_ref(),
            approver: &approver,
            now,
        };

        let outcome = self
            .engine
            .apply(&request, &action, &ctx)
            .map_err(|e| ApplicationError::Domain(DomainError::Workflow(e)))?;

        let mut tx = self.pool.begin().await.map_err(|e| map_repo(e.into()))?;

        if outcome.discard {
            delete_request_in(&mut *tx, request_id).await.map_err(map_repo)?;
        } else {
            update_request_expecting_version_in(&mut *tx, &outcome.request, request.version)
                .await
                .map_err(map_repo)?;
        }

        let mut budget_available = None;
        if let Some(budget) = &budget {
            let delta = match &outcome.budget_effect {
                BudgetEffect::None => None,
                BudgetEffect::Deduct { amount } => Some(-*amount),
                BudgetEffect::Restore { amount } => Some(*amount),
            };
            if let Some(delta) = delta {
                budget_available =
                    Some(adjust_available_in(&mut *tx, &budget.id, delta).await.map_err(map_repo)?);
            }
        }

        if let Some(new_comment) = &outcome.comment {
            let comment = Comment {
                id: CommentId(Uuid::new_v4().to_string()),
                request_id: request_id.clone(),
                author_email: new_comment.author_email.clone(),
                body: new_comment.body.clone(),
                created_at: now,
            };
            append_comment_in(&mut *tx, &comment).await.map_err(map_repo)?;
        }

        tx.commit().await.map_err(|e| map_repo(e.into()))?;

        tracing::info!(
            event_name = "workflow.action_applied",
            request_id = %request_id.0,
            actor = %actor_email,
            action = ?action.kind(),
            from = ?request.status,
            to = ?outcome.request.status,
            over_budget = outcome.over_budget,
            discarded = outcome.discard,
            "workflow action applied",
        );

        let mut notified = false;
        if let Some(directive) = &outcome.notification {
            match self.dispatcher.dispatch(directive) {
                Ok(()) => notified = true,
                Err(error) => {
                    tracing::warn!(
                        event_name = "workflow.notification_failed",
                        request_id = %request_id.0,
                        email_kind = ?directive.email_kind,
                        error = %error,
                        "notification dispatch failed after commit",
                    );
                }
            }
        }

        Ok(ActionReceipt {
            request: outcome.request,
            over_budget: outcome.over_budget,
            notified,
            budget_available,
            discarded: outcome.discard,
        })
    }
}
