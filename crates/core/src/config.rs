use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::CEO_APPROVAL_THRESHOLD;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub workflow: WorkflowRulesConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WorkflowRulesConfig {
    pub ceo_approval_threshold: Decimal,
    /// Members of the HR group; fed to the role resolver. Sourced from
    /// an external directory in production, listed here for small
    /// deployments and tests.
    pub hr_group_emails: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub ceo_approval_threshold: Option<Decimal>,
    pub hr_group_emails: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://spendy.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            workflow: WorkflowRulesConfig {
                ceo_approval_threshold: CEO_APPROVAL_THRESHOLD,
                hr_group_emails: Vec::new(),
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database: Option<FileDatabase>,
    workflow: Option<FileWorkflow>,
    logging: Option<FileLogging>,
}

#[derive(Debug, Deserialize)]
struct FileDatabase {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FileWorkflow {
    ceo_approval_threshold: Option<String>,
    hr_group_emails: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct FileLogging {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = options.config_path.unwrap_or_else(|| PathBuf::from("spendy.toml"));
        if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
            let file: FileConfig = toml::from_str(&raw)
                .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;
            config.merge_file(file)?;
        } else if options.require_file {
            return Err(ConfigError::MissingConfigFile(path));
        }

        config.apply_env(|key| env::var(key).ok())?;
        config.apply_overrides(options.overrides);
        config.validate()?;
        Ok(config)
    }

    fn merge_file(&mut self, file: FileConfig) -> Result<(), ConfigError> {
        if let Some(database) = file.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }
        if let Some(workflow) = file.workflow {
            if let Some(threshold) = workflow.ceo_approval_threshold {
                self.workflow.ceo_approval_threshold =
                    Decimal::from_str(&threshold).map_err(|_| {
                        ConfigError::Validation(format!(
                            "invalid workflow.ceo_approval_threshold `{threshold}`"
                        ))
                    })?;
            }
            if let Some(emails) = workflow.hr_group_emails {
                self.workflow.hr_group_emails = emails;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SPENDY_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(level) = lookup("SPENDY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SPENDY_LOG_FORMAT") {
            self.logging.format = match format.as_str() {
                "compact" => LogFormat::Compact,
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidEnvOverride {
                        key: "SPENDY_LOG_FORMAT".to_string(),
                        value: format,
                    });
                }
            };
        }
        if let Some(threshold) = lookup("SPENDY_CEO_APPROVAL_THRESHOLD") {
            self.workflow.ceo_approval_threshold = Decimal::from_str(&threshold).map_err(|_| {
                ConfigError::InvalidEnvOverride {
                    key: "SPENDY_CEO_APPROVAL_THRESHOLD".to_string(),
                    value: threshold,
                }
            })?;
        }
        if let Some(emails) = lookup("SPENDY_HR_GROUP_EMAILS") {
            self.workflow.hr_group_emails =
                emails.split(',').map(|email| email.trim().to_string()).collect();
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.database_url {
            self.database.url = url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        if let Some(threshold) = overrides.ceo_approval_threshold {
            self.workflow.ceo_approval_threshold = threshold;
        }
        if let Some(emails) = overrides.hr_group_emails {
            self.workflow.hr_group_emails = emails;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation("database.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.workflow.ceo_approval_threshold < Decimal::ZERO {
            return Err(ConfigError::Validation(
                "workflow.ceo_approval_threshold must be non-negative".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("logging.level must not be empty".to_string()));
        }
        Ok(())
    }
}
