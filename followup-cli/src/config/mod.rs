//! Batch configuration
//!
//! The front end writes a JSON object describing one batch. It is read once
//! at startup into an immutable [`BatchConfig`]; missing values fall back to
//! `FOLLOWUP_*` environment variables (a `.env` file is honored).

pub mod paths;
pub mod raw;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::client::DEFAULT_DIRECTORY_URL;
use crate::api::{ResilienceConfig, RetryConfig, TenantCredentials, TimeoutConfig};
use crate::processor::FollowUpSettings;
use crate::sheet::{KeyColumnKind, LoadOptions};
use crate::tenant::Tenant;
use crate::ui::webdriver::{DEFAULT_BASE_URL, DEFAULT_WEBDRIVER_URL};

pub use paths::{DataDir, default_data_dir};
pub use raw::RawConfig;

pub mod env {
    pub const TENANT: &str = "FOLLOWUP_TENANT";
    pub const LOGIN_EMAIL: &str = "FOLLOWUP_LOGIN_EMAIL";
    pub const LOGIN_PASSWORD: &str = "FOLLOWUP_LOGIN_PASSWORD";
    pub const CLIENT_CODE: &str = "FOLLOWUP_CLIENT_CODE";
    pub const TOKEN: &str = "FOLLOWUP_TOKEN";
    pub const WEBDRIVER_URL: &str = "FOLLOWUP_WEBDRIVER_URL";
}

/// Login for the remote web application
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub email: String,
    password: String,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Unreadable { path: PathBuf, reason: String },
    Parse(String),
    Missing { key: String },
    Invalid { key: String, reason: String },
    /// Another batch holds the tenant's ledgers
    LedgerLocked { path: PathBuf, holder: Option<u32> },
    KeyColumnNotFound { column: String, available: Vec<String> },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Unreadable { path, reason } => {
                write!(f, "cannot read configuration {}: {}", path.display(), reason)
            }
            ConfigError::Parse(reason) => write!(f, "invalid configuration JSON: {}", reason),
            ConfigError::Missing { key } => write!(f, "missing configuration value '{}'", key),
            ConfigError::Invalid { key, reason } => {
                write!(f, "invalid configuration value '{}': {}", key, reason)
            }
            ConfigError::LedgerLocked { path, holder } => {
                write!(f, "another batch is running for this head office (lock {}", path.display())?;
                if let Some(pid) = holder {
                    write!(f, ", held by process {}", pid)?;
                }
                write!(f, ")")
            }
            ConfigError::KeyColumnNotFound { column, available } => write!(
                f,
                "key column '{}' not found; available columns: {}",
                column,
                available.join(", ")
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Everything one batch needs to know, fixed at startup
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub selected_columns: Vec<String>,
    pub key_kind: KeyColumnKind,
    pub key_column: String,
    pub agent_name: String,
    pub tenant: Tenant,
    pub login: LoginCredentials,
    /// Directory credentials for `tenant`; always set for lookup key kinds
    pub directory: Option<TenantCredentials>,
    pub load: LoadOptions,
    pub follow_up: FollowUpSettings,
    pub resilience: ResilienceConfig,
    pub base_url: String,
    pub directory_url: String,
    pub webdriver_url: String,
    /// Save diagnostic screenshots under the data directory
    pub screenshots: bool,
}

impl BatchConfig {
    /// Read and validate the JSON file at `path`, with process environment fallbacks
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_json(&text, process_env)
    }

    pub fn from_json<E>(text: &str, env_var: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_raw(raw, env_var)
    }

    pub fn from_raw<E>(raw: RawConfig, env_var: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let selected_columns = raw.selected_columns.ok_or_else(|| missing("selectedColumns"))?;

        let (key_kind, key_column) = match (raw.key_column_kind, raw.key_column_name) {
            (Some(kind), Some(name)) => (kind, name),
            (Some(_), None) => return Err(missing("keyColumnName")),
            (None, name) => match (raw.legacy_remote_id_column, raw.legacy_tax_id_column, name) {
                (Some(col), _, _) => (KeyColumnKind::RemoteId, col),
                (None, Some(col), _) => (KeyColumnKind::NaturalKey, col),
                _ => return Err(missing("keyColumnKind")),
            },
        };
        if key_column.trim().is_empty() {
            return Err(missing("keyColumnName"));
        }

        let agent_name = non_blank(raw.agent_name).ok_or_else(|| missing("agentName"))?;

        let tenant_name = non_blank(raw.tenant)
            .or_else(|| env_var(env::TENANT))
            .ok_or_else(|| missing("tenant"))?;
        let tenant = Tenant::from_name(&tenant_name).ok_or_else(|| ConfigError::Invalid {
            key: "tenant".to_string(),
            reason: format!(
                "unknown head office '{}' (expected one of {})",
                tenant_name,
                Tenant::ALL.map(|t| t.name()).join(", ")
            ),
        })?;

        let (email, password) = match raw.credentials {
            Some(creds) => (creds.login_email, creds.login_password),
            None => (None, None),
        };
        let email = non_blank(email)
            .or_else(|| non_blank(raw.legacy_email))
            .or_else(|| env_var(env::LOGIN_EMAIL))
            .ok_or_else(|| missing("credentials.loginEmail"))?;
        let password = password
            .filter(|p| !p.is_empty())
            .or_else(|| raw.legacy_password.filter(|p| !p.is_empty()))
            .or_else(|| env_var(env::LOGIN_PASSWORD))
            .ok_or_else(|| missing("credentials.loginPassword"))?;

        let directory = raw
            .directory
            .and_then(|map| {
                map.into_iter()
                    .find(|(name, _)| Tenant::from_name(name) == Some(tenant))
                    .map(|(_, creds)| creds)
            })
            .or_else(|| match (env_var(env::CLIENT_CODE), env_var(env::TOKEN)) {
                (Some(code), Some(token)) => Some(TenantCredentials::new(code, token)),
                _ => None,
            })
            .filter(TenantCredentials::is_complete);
        if key_kind.needs_lookup() && directory.is_none() {
            return Err(missing(&format!("directory.{}", tenant)));
        }

        let mut load = LoadOptions {
            sheet: non_blank(raw.sheet),
            header_row: raw.header_row,
            ..LoadOptions::default()
        };
        if let Some(columns) = raw.date_columns {
            load.date_columns = columns;
        }

        let mut follow_up = FollowUpSettings::default();
        if let Some(custom) = raw.follow_up {
            if let Some(channel) = non_blank(custom.channel) {
                follow_up.channel = channel;
            }
            if let Some(kind) = non_blank(custom.appointment_type) {
                follow_up.appointment_type = kind;
            }
            if let Some(level) = non_blank(custom.interest_level) {
                follow_up.interest_level = level;
            }
            if let Some(prefix) = non_blank(custom.subject_prefix) {
                follow_up.subject_prefix = prefix;
            }
            if let Some(submit) = custom.submit {
                follow_up.submit = submit;
            }
        }

        let mut timeouts = TimeoutConfig::default();
        if let Some(custom) = raw.timeouts {
            if let Some(ms) = custom.poll_ms {
                timeouts.poll = positive("timeouts.pollMs", Duration::from_millis(ms))?;
            }
            if let Some(secs) = custom.step_secs {
                timeouts.step = positive("timeouts.stepSecs", Duration::from_secs(secs))?;
            }
            if let Some(secs) = custom.http_secs {
                timeouts.http = positive("timeouts.httpSecs", Duration::from_secs(secs))?;
            }
        }

        let retry = match raw.retry {
            Some(custom) => RetryConfig::with_backoff(
                custom.backoff.unwrap_or_default(),
                custom.attempts.unwrap_or(1),
                Duration::from_millis(custom.delay_ms.unwrap_or(0)),
            ),
            None => RetryConfig::default(),
        };

        let resilience = ResilienceConfig::builder()
            .retry_config(retry)
            .poll_interval(timeouts.poll)
            .step_timeout(timeouts.step)
            .http_timeout(timeouts.http)
            .build();

        Ok(BatchConfig {
            selected_columns,
            key_kind,
            key_column,
            agent_name,
            tenant,
            login: LoginCredentials::new(email, password),
            directory,
            load,
            follow_up,
            resilience,
            base_url: non_blank(raw.base_url).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            directory_url: non_blank(raw.directory_url).unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string()),
            webdriver_url: non_blank(raw.webdriver_url)
                .or_else(|| env_var(env::WEBDRIVER_URL))
                .unwrap_or_else(|| DEFAULT_WEBDRIVER_URL.to_string()),
            screenshots: raw.screenshots.unwrap_or(true),
        })
    }

    /// Key column first, then the selected columns that are not the key
    pub fn batch_columns(&self) -> Vec<&str> {
        let mut columns = vec![self.key_column.as_str()];
        for column in &self.selected_columns {
            if !columns.iter().any(|c| *c == column.as_str()) {
                columns.push(column.as_str());
            }
        }
        columns
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn missing(key: &str) -> ConfigError {
    ConfigError::Missing { key: key.to_string() }
}

fn positive(key: &str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: "must be greater than zero".to_string(),
        })
    } else {
        Ok(value)
    }
}
