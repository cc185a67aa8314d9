pub mod approver;
pub mod budget;
pub mod comment;
pub mod request;
