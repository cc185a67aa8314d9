pub mod actions;
pub mod engine;

pub use actions::{
    ActionContext, ActionKind, ApplyOutcome, BudgetEffect, NewComment, RequestAction,
};
pub use engine::{WorkflowEngine, WorkflowError, CEO_APPROVAL_THRESHOLD};
