pub mod audit;
pub mod comments;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod notify;
pub mod roles;
pub mod workflow;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use comments::CommentLog;
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::approver::{ApproverId, ApproverRecord};
pub use domain::budget::{Budget, BudgetId};
pub use domain::comment::{Comment, CommentId};
pub use domain::request::{
    CoachOpinion, ItemKind, Request, RequestId, RequestItem, RequestItemId, RequestStatus,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use ledger::BudgetLedger;
pub use notify::{
    DispatchError, EmailKind, InMemoryDispatcher, NotificationDirective, NotificationDispatcher,
};
pub use roles::{ApproverDirectory, Role, RoleResolver, RoleSet};
pub use workflow::{
    ActionContext, ActionKind, ApplyOutcome, BudgetEffect, NewComment, RequestAction,
    WorkflowEngine, WorkflowError, CEO_APPROVAL_THRESHOLD,
};
