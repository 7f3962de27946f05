//! Errors that end a batch

use crate::config::ConfigError;
use crate::sheet::LoadError;

/// A fault that stops the batch; row-level problems never become one of these
#[derive(Debug)]
pub enum BatchError {
    /// The input workbook could not be used
    Load(LoadError),
    /// Bad or missing configuration, detected before any row
    Config(ConfigError),
    /// Login failed or the browser session is gone
    SessionFatal(String),
    /// A ledger could not be persisted
    Ledger(anyhow::Error),
}

impl BatchError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BatchError::Load(_) | BatchError::Config(_) => 2,
            BatchError::SessionFatal(_) | BatchError::Ledger(_) => 1,
        }
    }
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::Load(e) => write!(f, "{}", e),
            BatchError::Config(e) => write!(f, "{}", e),
            BatchError::SessionFatal(msg) => write!(f, "session failure: {}", msg),
            BatchError::Ledger(e) => write!(f, "ledger failure: {:#}", e),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::Load(e) => Some(e),
            BatchError::Config(e) => Some(e),
            BatchError::SessionFatal(_) => None,
            BatchError::Ledger(e) => Some(&**e),
        }
    }
}

impl From<LoadError> for BatchError {
    fn from(err: LoadError) -> Self {
        BatchError::Load(err)
    }
}

impl From<ConfigError> for BatchError {
    fn from(err: ConfigError) -> Self {
        BatchError::Config(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes() {
        let config = BatchError::from(ConfigError::Missing { key: "tenant".into() });
        assert_eq!(config.exit_code(), 2);
        assert_eq!(BatchError::SessionFatal("gone".into()).exit_code(), 1);
        assert_eq!(BatchError::Ledger(anyhow::anyhow!("disk full")).exit_code(), 1);
    }

    #[test]
    fn test_ledger_message_includes_context_chain() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("disk full")).context("Failed to write ledger");
        let msg = BatchError::Ledger(err.unwrap_err()).to_string();
        assert!(msg.contains("Failed to write ledger"));
        assert!(msg.contains("disk full"));
    }
}
