pub mod bootstrap;
pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod service;

pub use bootstrap::{bootstrap, init_tracing, Application, BootstrapError};
pub use connection::{connect, connect_with_settings, DbPool};
pub use service::{ActionReceipt, WorkflowService};
