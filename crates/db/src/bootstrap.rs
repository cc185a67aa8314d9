use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spendy_core::config::{AppConfig, ConfigError, LoadOptions, LogFormat, LoggingConfig};
use spendy_core::notify::NotificationDispatcher;
use spendy_core::roles::RoleResolver;
use spendy_core::workflow::WorkflowEngine;

use crate::service::WorkflowService;
use crate::{connect, migrations, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

/// Installs the global subscriber once; later calls are no-ops so tests
/// can run in any order.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    let _ = result;
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    Ok(Application { config, db_pool })
}

impl Application {
    /// Builds the workflow service from the loaded configuration: the
    /// CEO threshold feeds the engine, the HR group feeds the resolver.
    pub fn workflow_service<D: NotificationDispatcher>(&self, dispatcher: D) -> WorkflowService<D> {
        WorkflowService::new(
            self.db_pool.clone(),
            WorkflowEngine::new(self.config.workflow.ceo_approval_threshold),
            RoleResolver::new(self.config.workflow.hr_group_emails.clone()),
            dispatcher,
        )
    }
}
