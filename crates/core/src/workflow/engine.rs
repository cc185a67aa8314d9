use rust_decimal::Decimal;
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::request::{Request, RequestStatus};
use crate::notify::{EmailKind, NotificationDirective};
use crate::roles::Role;
use crate::workflow::actions::{
    ActionContext, ActionKind, ApplyOutcome, BudgetEffect, NewComment, RequestAction,
};

/// Costs strictly above this amount need CEO sign-off before HR
/// processing. Equality routes to the non-CEO path.
pub const CEO_APPROVAL_THRESHOLD: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("a non-empty comment is required for {action:?}")]
    MissingComment { action: ActionKind },
    #[error("action {action:?} is not legal from status {status:?} for roles {roles:?}")]
    InvalidTransition { status: RequestStatus, action: ActionKind, roles: Vec<Role> },
}

/// The approval state machine. `apply` is pure: it validates the
/// (status, role, action) triple, then returns an updated copy of the
/// request together with the budget and notification side effects the
/// caller must persist as one unit. Errors leave the input untouched.
#[derive(Clone, Debug)]
pub struct WorkflowEngine {
    ceo_approval_threshold: Decimal,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(CEO_APPROVAL_THRESHOLD)
    }
}

impl WorkflowEngine {
    pub fn new(ceo_approval_threshold: Decimal) -> Self {
        Self { ceo_approval_threshold }
    }

    pub fn apply(
        &self,
        request: &Request,
        action: &RequestAction,
        ctx: &ActionContext<'_>,
    ) -> Result<ApplyOutcome, WorkflowError> {
        use RequestStatus::{
            AwaitingCeoApproval, Draft, HrProcessing, Rejected, Resubmitted, Submitted,
        };

        let mut next = request.clone();
        let mut budget_effect = BudgetEffect::None;
        let mut notification = None;
        let mut comment = None;
        let mut over_budget = false;
        let mut discard = false;

        match action {
            RequestAction::Send => {
                self.require(request, action, ctx, Role::Requester)?;
                if !matches!(request.status, Draft | Rejected) {
                    return Err(invalid_transition(request, action, ctx));
                }

                next.status = Submitted;
                // First submission only; resubmissions keep the original date.
                if next.submission_date.is_none() {
                    next.submission_date = Some(ctx.now);
                }
                notification = Some(NotificationDirective::assemble(
                    EmailKind::NewRequest,
                    &next,
                    ctx.approver,
                    None,
                ));
            }
            RequestAction::Approve => match request.status {
                AwaitingCeoApproval => {
                    self.require(request, action, ctx, Role::DeliveryDirector)?;
                    next.approved_by_ceo = true;
                    self.enter_hr_processing(&mut next, ctx, &mut budget_effect, &mut over_budget);
                    notification = Some(NotificationDirective::assemble(
                        EmailKind::HrProcessing,
                        &next,
                        ctx.approver,
                        None,
                    ));
                }
                Submitted | Resubmitted => {
                    if ctx.roles.contains(&Role::PracticeLead) {
                        if request.total_cost > self.ceo_approval_threshold
                            && !request.approved_by_ceo
                        {
                            next.status = AwaitingCeoApproval;
                        } else {
                            self.enter_hr_processing(
                                &mut next,
                                ctx,
                                &mut budget_effect,
                                &mut over_budget,
                            );
                            notification = Some(NotificationDirective::assemble(
                                EmailKind::HrProcessing,
                                &next,
                                ctx.approver,
                                None,
                            ));
                        }
                    } else if ctx.roles.contains(&Role::DeliveryDirector) {
                        // CEO approving ahead of the practice lead: records the
                        // sign-off but does not advance past the approver gate.
                        next.approved_by_ceo = true;
                    } else {
                        return Err(invalid_transition(request, action, ctx));
                    }
                }
                _ => return Err(invalid_transition(request, action, ctx)),
            },
            RequestAction::Deny => {
                if !matches!(request.status, Submitted | Resubmitted | AwaitingCeoApproval) {
                    return Err(invalid_transition(request, action, ctx));
                }
                if !ctx.roles.contains(&Role::PracticeLead)
                    && !ctx.roles.contains(&Role::DeliveryDirector)
                {
                    return Err(invalid_transition(request, action, ctx));
                }
                let body = mandatory_comment(action, ctx)?;

                // A resubmitted request carries a tentative commitment.
                if request.status == Resubmitted && request.budget_committed {
                    budget_effect = BudgetEffect::Restore { amount: request.total_cost };
                    next.budget_committed = false;
                }
                next.status = Rejected;
                notification = Some(NotificationDirective::assemble(
                    EmailKind::Deny,
                    &next,
                    ctx.approver,
                    Some(&body),
                ));
                comment = Some(NewComment { author_email: ctx.actor_email.to_string(), body });
            }
            RequestAction::Reapprove => {
                self.require(request, action, ctx, Role::Hr)?;
                if request.status != HrProcessing || !request.changed_by_hr {
                    return Err(invalid_transition(request, action, ctx));
                }
                let body = mandatory_comment(action, ctx)?;

                next.changed_by_hr = false;
                next.status = Resubmitted;
                notification = Some(NotificationDirective::assemble(
                    EmailKind::Reapprove,
                    &next,
                    ctx.approver,
                    Some(&body),
                ));
                comment = Some(NewComment { author_email: ctx.actor_email.to_string(), body });
            }
            RequestAction::MarkCompleted => {
                self.require(request, action, ctx, Role::Hr)?;
                if request.status != HrProcessing || request.changed_by_hr {
                    return Err(invalid_transition(request, action, ctx));
                }
                next.status = RequestStatus::Completed;
            }
            RequestAction::Discard => {
                self.require(request, action, ctx, Role::Requester)?;
                if !matches!(request.status, Draft | Rejected) {
                    return Err(invalid_transition(request, action, ctx));
                }
                discard = true;
            }
            RequestAction::CoachOpinion(opinion) => {
                self.require(request, action, ctx, Role::TeamCoach)?;
                // Advisory side channel: no status change, no notification.
                next.team_coach_opinion = Some(*opinion);
            }
        }

        next.updated_at = ctx.now;
        next.version = next.version.saturating_add(1);

        Ok(ApplyOutcome { request: next, budget_effect, notification, comment, over_budget, discard })
    }

    pub fn apply_with_audit<S>(
        &self,
        request: &Request,
        action: &RequestAction,
        ctx: &ActionContext<'_>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<ApplyOutcome, WorkflowError>
    where
        S: AuditSink,
    {
        let result = self.apply(request, action, ctx);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    AuditEvent::new(
                        Some(request.id.clone()),
                        audit.correlation_id.clone(),
                        "workflow.transition_applied",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("from", format!("{:?}", request.status))
                    .with_metadata("to", format!("{:?}", outcome.request.status))
                    .with_metadata("action", format!("{:?}", action.kind())),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        Some(request.id.clone()),
                        audit.correlation_id.clone(),
                        "workflow.transition_rejected",
                        AuditCategory::Workflow,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    fn require(
        &self,
        request: &Request,
        action: &RequestAction,
        ctx: &ActionContext<'_>,
        role: Role,
    ) -> Result<(), WorkflowError> {
        if ctx.roles.contains(&role) {
            return Ok(());
        }
        Err(invalid_transition(request, action, ctx))
    }

    /// Deduction fires exactly once per commitment: entering HR
    /// processing while already committed (a resubmit cycle) is a no-op
    /// on the budget. A missing budget record skips the deduction and
    /// suppresses the over-budget warning.
    fn enter_hr_processing(
        &self,
        next: &mut Request,
        ctx: &ActionContext<'_>,
        budget_effect: &mut BudgetEffect,
        over_budget: &mut bool,
    ) {
        next.status = RequestStatus::HrProcessing;
        if next.budget_committed {
            return;
        }
        if let Some(budget) = ctx.budget {
            *over_budget = budget.is_over_budget(next.total_cost);
            *budget_effect = BudgetEffect::Deduct { amount: next.total_cost };
            next.budget_committed = true;
        }
    }
}

fn mandatory_comment(
    action: &RequestAction,
    ctx: &ActionContext<'_>,
) -> Result<String, WorkflowError> {
    match ctx.comment.map(str::trim) {
        Some(body) if !body.is_empty() => Ok(body.to_string()),
        _ => Err(WorkflowError::MissingComment { action: action.kind() }),
    }
}

fn invalid_transition(
    request: &Request,
    action: &RequestAction,
    ctx: &ActionContext<'_>,
) -> WorkflowError {
    WorkflowError::InvalidTransition {
        status: request.status,
        action: action.kind(),
        roles: ctx.roles.iter().copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::approver::{ApproverId, ApproverRecord};
    use crate::domain::budget::{Budget, BudgetId};
    use crate::domain::request::{
        CoachOpinion, ItemKind, Request, RequestId, RequestItem, RequestItemId, RequestStatus,
    };
    use crate::notify::EmailKind;
    use crate::roles::{Role, RoleSet};
    use crate::workflow::actions::{ActionContext, ActionKind, BudgetEffect, RequestAction};

    use super::{WorkflowEngine, WorkflowError};

    fn approver() -> ApproverRecord {
        ApproverRecord {
            id: ApproverId("APV-1".to_string()),
            team_member_email: "dev@example.com".to_string(),
            team_coach_email: "coach@example.com".to_string(),
            team_coach_title: "Team Coach".to_string(),
            practice_lead_email: "lead@example.com".to_string(),
            practice_lead_title: "Practice Lead".to_string(),
            ceo_email: "ceo@example.com".to_string(),
        }
    }

    fn budget(available: Decimal) -> Budget {
        Budget {
            id: BudgetId("BUD-1".to_string()),
            team_coach_email: "coach@example.com".to_string(),
            year: 2026,
            total: Decimal::new(2_000_000, 2),
            available,
        }
    }

    fn request(status: RequestStatus, cost: Decimal) -> Request {
        let now = Utc::now();
        let mut request = Request {
            id: RequestId("REQ-1".to_string()),
            title: "Rust training".to_string(),
            status,
            total_cost: Decimal::ZERO,
            author_email: "dev@example.com".to_string(),
            author_name: "Dev".to_string(),
            approver_id: ApproverId("APV-1".to_string()),
            team_coach_opinion: None,
            approved_by_ceo: false,
            changed_by_hr: false,
            budget_committed: false,
            submission_date: None,
            deadline_date: None,
            version: 1,
            items: vec![RequestItem {
                id: RequestItemId("I-1".to_string()),
                kind: ItemKind::Training,
                description: "Course".to_string(),
                cost,
                start_date: None,
            }],
            created_at: now,
            updated_at: now,
        };
        request.recompute_totals();
        request
    }

    fn roles(roles: &[Role]) -> RoleSet {
        roles.iter().copied().collect()
    }

    struct Ctx {
        approver: ApproverRecord,
        roles: RoleSet,
        budget: Option<Budget>,
        comment: Option<String>,
    }

    impl Ctx {
        fn new(role_list: &[Role]) -> Self {
            Self {
                approver: approver(),
                roles: roles(role_list),
                budget: Some(budget(Decimal::new(1_000_000, 2))),
                comment: None,
            }
        }

        fn without_budget(mut self) -> Self {
            self.budget = None;
            self
        }

        fn with_budget(mut self, budget: Budget) -> Self {
            self.budget = Some(budget);
            self
        }

        fn with_comment(mut self, body: &str) -> Self {
            self.comment = Some(body.to_string());
            self
        }

        fn as_action_context<'a>(&'a self, actor_email: &'a str) -> ActionContext<'a> {
            ActionContext {
                actor_email,
                roles: &self.roles,
                comment: self.comment.as_deref(),
                budget: self.budget.as_ref(),
                approver: &self.approver,
                now: Utc::now(),
            }
        }
    }

    #[test]
    fn send_from_draft_submits_and_stamps_submission_date() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Draft, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::Requester]);

        let outcome = engine
            .apply(&request, &RequestAction::Send, &ctx.as_action_context("dev@example.com"))
            .expect("draft -> submitted");

        assert_eq!(outcome.request.status, RequestStatus::Submitted);
        assert!(outcome.request.submission_date.is_some());
        assert_eq!(outcome.budget_effect, BudgetEffect::None);
        let directive = outcome.notification.expect("approver is notified");
        assert_eq!(directive.email_kind, EmailKind::NewRequest);
        assert_eq!(directive.approver_email, "lead@example.com");
    }

    #[test]
    fn resend_after_rejection_keeps_original_submission_date() {
        let engine = WorkflowEngine::default();
        let mut rejected = request(RequestStatus::Rejected, Decimal::new(120000, 2));
        let original = Utc::now() - chrono::Duration::days(10);
        rejected.submission_date = Some(original);
        let ctx = Ctx::new(&[Role::Requester]);

        let outcome = engine
            .apply(&rejected, &RequestAction::Send, &ctx.as_action_context("dev@example.com"))
            .expect("rejected -> submitted");

        assert_eq!(outcome.request.submission_date, Some(original));
    }

    #[test]
    fn send_requires_requester_role() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Draft, Decimal::ONE);
        let ctx = Ctx::new(&[Role::PracticeLead]);

        let error = engine
            .apply(&request, &RequestAction::Send, &ctx.as_action_context("lead@example.com"))
            .expect_err("lead cannot send someone else's draft");

        assert!(matches!(
            error,
            WorkflowError::InvalidTransition { status: RequestStatus::Draft, action: ActionKind::Send, .. }
        ));
    }

    #[test]
    fn lead_approval_below_threshold_routes_to_hr_and_deducts() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::PracticeLead]);

        let outcome = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("lead@example.com"))
            .expect("submitted -> hr processing");

        assert_eq!(outcome.request.status, RequestStatus::HrProcessing);
        assert!(outcome.request.budget_committed);
        assert_eq!(outcome.budget_effect, BudgetEffect::Deduct { amount: Decimal::new(120000, 2) });
        assert!(!outcome.over_budget);
        assert_eq!(outcome.notification.expect("hr notified").email_kind, EmailKind::HrProcessing);
    }

    #[test]
    fn cost_at_exactly_threshold_skips_ceo() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(5000, 0));
        let ctx = Ctx::new(&[Role::PracticeLead]);

        let outcome = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("lead@example.com"))
            .expect("threshold equality routes non-CEO");

        assert_eq!(outcome.request.status, RequestStatus::HrProcessing);
    }

    #[test]
    fn lead_approval_above_threshold_defers_to_ceo_without_deducting() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(800000, 2));
        let ctx = Ctx::new(&[Role::PracticeLead]);

        let outcome = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("lead@example.com"))
            .expect("submitted -> awaiting ceo");

        assert_eq!(outcome.request.status, RequestStatus::AwaitingCeoApproval);
        assert!(!outcome.request.approved_by_ceo);
        assert_eq!(outcome.budget_effect, BudgetEffect::None);
        assert!(outcome.notification.is_none());
    }

    #[test]
    fn ceo_approval_from_awaiting_deducts_once_and_moves_to_hr() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::AwaitingCeoApproval, Decimal::new(800000, 2));
        let ctx = Ctx::new(&[Role::DeliveryDirector]);

        let outcome = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("ceo@example.com"))
            .expect("awaiting -> hr processing");

        assert_eq!(outcome.request.status, RequestStatus::HrProcessing);
        assert!(outcome.request.approved_by_ceo);
        assert_eq!(outcome.budget_effect, BudgetEffect::Deduct { amount: Decimal::new(800000, 2) });
    }

    #[test]
    fn lead_cannot_act_on_awaiting_ceo_approval() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::AwaitingCeoApproval, Decimal::new(800000, 2));
        let ctx = Ctx::new(&[Role::PracticeLead]);

        let error = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("lead@example.com"))
            .expect_err("only the CEO clears the gate");

        assert!(matches!(error, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn ceo_direct_approval_on_submitted_records_signoff_without_advancing() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(800000, 2));
        let ctx = Ctx::new(&[Role::DeliveryDirector]);

        let outcome = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("ceo@example.com"))
            .expect("ceo pre-approval is legal");

        assert_eq!(outcome.request.status, RequestStatus::Submitted);
        assert!(outcome.request.approved_by_ceo);
        assert_eq!(outcome.budget_effect, BudgetEffect::None);
    }

    #[test]
    fn prior_ceo_signoff_lets_lead_approve_large_cost_directly() {
        let engine = WorkflowEngine::default();
        let mut request = request(RequestStatus::Submitted, Decimal::new(800000, 2));
        request.approved_by_ceo = true;
        let ctx = Ctx::new(&[Role::PracticeLead]);

        let outcome = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("lead@example.com"))
            .expect("signed-off request skips the ceo gate");

        assert_eq!(outcome.request.status, RequestStatus::HrProcessing);
        assert_eq!(outcome.budget_effect, BudgetEffect::Deduct { amount: Decimal::new(800000, 2) });
    }

    #[test]
    fn reapproved_request_is_not_deducted_twice() {
        let engine = WorkflowEngine::default();
        // Already committed from its first pass through HR processing.
        let mut request = request(RequestStatus::Resubmitted, Decimal::new(120000, 2));
        request.budget_committed = true;
        let ctx = Ctx::new(&[Role::PracticeLead]);

        let outcome = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("lead@example.com"))
            .expect("resubmitted -> hr processing");

        assert_eq!(outcome.request.status, RequestStatus::HrProcessing);
        assert_eq!(outcome.budget_effect, BudgetEffect::None);
    }

    #[test]
    fn missing_budget_record_skips_deduction() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::PracticeLead]).without_budget();

        let outcome = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("lead@example.com"))
            .expect("approval proceeds without a budget record");

        assert_eq!(outcome.request.status, RequestStatus::HrProcessing);
        assert_eq!(outcome.budget_effect, BudgetEffect::None);
        assert!(!outcome.request.budget_committed);
        assert!(!outcome.over_budget);
    }

    #[test]
    fn over_budget_is_flagged_but_never_blocks() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::PracticeLead]).with_budget(budget(Decimal::new(100000, 2)));

        let outcome = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("lead@example.com"))
            .expect("over-budget approval still succeeds");

        assert!(outcome.over_budget);
        assert_eq!(outcome.budget_effect, BudgetEffect::Deduct { amount: Decimal::new(120000, 2) });
    }

    #[test]
    fn deny_without_comment_fails_before_any_effect() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::PracticeLead]).with_comment("   ");

        let error = engine
            .apply(&request, &RequestAction::Deny, &ctx.as_action_context("lead@example.com"))
            .expect_err("whitespace comment is rejected");

        assert_eq!(error, WorkflowError::MissingComment { action: ActionKind::Deny });
    }

    #[test]
    fn deny_from_submitted_rejects_without_restoring() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::PracticeLead]).with_comment("not this quarter");

        let outcome = engine
            .apply(&request, &RequestAction::Deny, &ctx.as_action_context("lead@example.com"))
            .expect("submitted -> rejected");

        assert_eq!(outcome.request.status, RequestStatus::Rejected);
        assert_eq!(outcome.budget_effect, BudgetEffect::None);
        let directive = outcome.notification.expect("requester notified");
        assert_eq!(directive.email_kind, EmailKind::Deny);
        assert_eq!(directive.comment.as_deref(), Some("not this quarter"));
        assert_eq!(outcome.comment.expect("comment recorded").body, "not this quarter");
    }

    #[test]
    fn deny_from_resubmitted_restores_the_tentative_commitment() {
        let engine = WorkflowEngine::default();
        let mut request = request(RequestStatus::Resubmitted, Decimal::new(120000, 2));
        request.budget_committed = true;
        let ctx = Ctx::new(&[Role::PracticeLead]).with_comment("too expensive");

        let outcome = engine
            .apply(&request, &RequestAction::Deny, &ctx.as_action_context("lead@example.com"))
            .expect("resubmitted -> rejected");

        assert_eq!(outcome.request.status, RequestStatus::Rejected);
        assert_eq!(
            outcome.budget_effect,
            BudgetEffect::Restore { amount: Decimal::new(120000, 2) }
        );
        assert!(!outcome.request.budget_committed);
    }

    #[test]
    fn denial_does_not_reset_ceo_signoff() {
        let engine = WorkflowEngine::default();
        let mut request = request(RequestStatus::Submitted, Decimal::new(800000, 2));
        request.approved_by_ceo = true;
        let ctx = Ctx::new(&[Role::PracticeLead]).with_comment("defer");

        let outcome = engine
            .apply(&request, &RequestAction::Deny, &ctx.as_action_context("lead@example.com"))
            .expect("deny");

        assert!(outcome.request.approved_by_ceo);
    }

    #[test]
    fn reapprove_requires_the_hr_change_flag() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::HrProcessing, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::Hr]).with_comment("cost adjusted");

        let error = engine
            .apply(&request, &RequestAction::Reapprove, &ctx.as_action_context("hr@example.com"))
            .expect_err("nothing changed, nothing to reapprove");

        assert!(matches!(
            error,
            WorkflowError::InvalidTransition { action: ActionKind::Reapprove, .. }
        ));
    }

    #[test]
    fn reapprove_consumes_flag_and_resubmits() {
        let engine = WorkflowEngine::default();
        let mut request = request(RequestStatus::HrProcessing, Decimal::new(120000, 2));
        request.changed_by_hr = true;
        request.budget_committed = true;
        let ctx = Ctx::new(&[Role::Hr]).with_comment("cost adjusted");

        let outcome = engine
            .apply(&request, &RequestAction::Reapprove, &ctx.as_action_context("hr@example.com"))
            .expect("hr processing -> resubmitted");

        assert_eq!(outcome.request.status, RequestStatus::Resubmitted);
        assert!(!outcome.request.changed_by_hr);
        assert!(outcome.request.budget_committed);
        assert_eq!(outcome.budget_effect, BudgetEffect::None);
        assert_eq!(outcome.notification.expect("chain notified").email_kind, EmailKind::Reapprove);
        assert_eq!(outcome.comment.expect("comment recorded").body, "cost adjusted");
    }

    #[test]
    fn reapprove_without_comment_is_a_validation_error() {
        let engine = WorkflowEngine::default();
        let mut request = request(RequestStatus::HrProcessing, Decimal::new(120000, 2));
        request.changed_by_hr = true;
        let ctx = Ctx::new(&[Role::Hr]);

        let error = engine
            .apply(&request, &RequestAction::Reapprove, &ctx.as_action_context("hr@example.com"))
            .expect_err("comment is mandatory");

        assert_eq!(error, WorkflowError::MissingComment { action: ActionKind::Reapprove });
    }

    #[test]
    fn mark_completed_finishes_an_unchanged_request() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::HrProcessing, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::Hr]);

        let outcome = engine
            .apply(
                &request,
                &RequestAction::MarkCompleted,
                &ctx.as_action_context("hr@example.com"),
            )
            .expect("hr processing -> completed");

        assert_eq!(outcome.request.status, RequestStatus::Completed);
        assert_eq!(outcome.budget_effect, BudgetEffect::None);
        assert!(outcome.notification.is_none());
    }

    #[test]
    fn mark_completed_is_blocked_while_hr_changes_are_pending() {
        let engine = WorkflowEngine::default();
        let mut request = request(RequestStatus::HrProcessing, Decimal::new(120000, 2));
        request.changed_by_hr = true;
        let ctx = Ctx::new(&[Role::Hr]);

        let error = engine
            .apply(
                &request,
                &RequestAction::MarkCompleted,
                &ctx.as_action_context("hr@example.com"),
            )
            .expect_err("changed request must be reapproved first");

        assert!(matches!(error, WorkflowError::InvalidTransition { .. }));
    }

    #[test]
    fn discard_from_draft_delegates_deletion() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Draft, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::Requester]);

        let outcome = engine
            .apply(&request, &RequestAction::Discard, &ctx.as_action_context("dev@example.com"))
            .expect("draft can be discarded");

        assert!(outcome.discard);
        assert_eq!(outcome.budget_effect, BudgetEffect::None);
        assert!(outcome.notification.is_none());
    }

    #[test]
    fn discard_from_submitted_is_illegal() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::Requester]);

        let error = engine
            .apply(&request, &RequestAction::Discard, &ctx.as_action_context("dev@example.com"))
            .expect_err("submitted requests cannot be discarded");

        assert!(matches!(
            error,
            WorkflowError::InvalidTransition { action: ActionKind::Discard, .. }
        ));
    }

    #[test]
    fn coach_opinion_is_advisory_and_ignores_status() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::HrProcessing, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[Role::TeamCoach]);

        let outcome = engine
            .apply(
                &request,
                &RequestAction::CoachOpinion(CoachOpinion::Disapprove),
                &ctx.as_action_context("coach@example.com"),
            )
            .expect("coach opinion is always legal for the coach");

        assert_eq!(outcome.request.status, RequestStatus::HrProcessing);
        assert_eq!(outcome.request.team_coach_opinion, Some(CoachOpinion::Disapprove));
        assert!(outcome.notification.is_none());
    }

    #[test]
    fn actor_without_roles_cannot_do_anything() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::new(120000, 2));
        let ctx = Ctx::new(&[]);

        let error = engine
            .apply(&request, &RequestAction::Approve, &ctx.as_action_context("x@example.com"))
            .expect_err("no roles, no actions");

        assert!(matches!(error, WorkflowError::InvalidTransition { roles, .. } if roles.is_empty()));
    }

    #[test]
    fn successful_apply_bumps_the_request_version() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Draft, Decimal::ONE);
        let ctx = Ctx::new(&[Role::Requester]);

        let outcome = engine
            .apply(&request, &RequestAction::Send, &ctx.as_action_context("dev@example.com"))
            .expect("send");

        assert_eq!(outcome.request.version, request.version + 1);
    }

    #[test]
    fn applied_transition_emits_audit_event() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Draft, Decimal::ONE);
        let ctx = Ctx::new(&[Role::Requester]);
        let sink = InMemoryAuditSink::default();

        engine
            .apply_with_audit(
                &request,
                &RequestAction::Send,
                &ctx.as_action_context("dev@example.com"),
                &sink,
                &AuditContext::new("req-42", "dev@example.com"),
            )
            .expect("send");

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "workflow.transition_applied");
        assert_eq!(events[0].correlation_id, "req-42");
        assert_eq!(events[0].metadata.get("to").map(String::as_str), Some("Submitted"));
    }

    #[test]
    fn rejected_transition_emits_audit_event() {
        let engine = WorkflowEngine::default();
        let request = request(RequestStatus::Submitted, Decimal::ONE);
        let ctx = Ctx::new(&[]);
        let sink = InMemoryAuditSink::default();

        let _ = engine.apply_with_audit(
            &request,
            &RequestAction::Approve,
            &ctx.as_action_context("x@example.com"),
            &sink,
            &AuditContext::new("req-43", "x@example.com"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "workflow.transition_rejected");
    }
}
