//! Driving the remote web application
//!
//! [`UiDriver`] is the seam between the batch and the browser. The batch
//! only knows these capabilities; [`webdriver::WebDriverSession`] is the
//! real implementation and tests plug in fakes.

pub mod screenshots;
pub mod wait;
pub mod webdriver;

use std::time::Duration;

use async_trait::async_trait;

use crate::api::RemoteRecordId;
use crate::config::LoginCredentials;
use crate::tenant::SessionState;

pub use screenshots::ScreenshotDir;
pub use wait::{WaitConfig, wait_for};
pub use webdriver::WebDriverSession;

/// Values entered into the follow-up dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpForm {
    pub agent: String,
    pub channel: String,
    pub appointment_type: String,
    pub interest_level: String,
    pub subject: String,
    /// Click the save buttons; off for rehearsal runs
    pub submit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiError {
    /// An element was missing, not interactable, or rejected the input
    Interaction(String),
    /// A bounded wait ran out
    Timeout { step: String, after: Duration },
    /// The browser session is gone; nothing after this can succeed
    SessionLost(String),
}

impl UiError {
    pub fn interaction(msg: impl Into<String>) -> Self {
        UiError::Interaction(msg.into())
    }

    pub fn is_session_fatal(&self) -> bool {
        matches!(self, UiError::SessionLost(_))
    }
}

impl std::fmt::Display for UiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiError::Interaction(msg) => write!(f, "{}", msg),
            UiError::Timeout { step, after } => {
                write!(f, "timed out after {:.1}s waiting for {}", after.as_secs_f64(), step)
            }
            UiError::SessionLost(msg) => write!(f, "browser session lost: {}", msg),
        }
    }
}

impl std::error::Error for UiError {}

/// Capabilities the batch needs from the remote UI
#[async_trait]
pub trait UiDriver: Send {
    async fn login(&mut self, credentials: &LoginCredentials) -> Result<(), UiError>;

    /// Tenant label the session header shows, if logged in
    async fn current_tenant(&mut self) -> Result<SessionState, UiError>;

    /// Trigger the tenant switch with the routing table's opaque value
    async fn select_tenant(&mut self, value: u32) -> Result<(), UiError>;

    async fn open_record(&mut self, id: &RemoteRecordId) -> Result<(), UiError>;

    async fn fill_follow_up(&mut self, form: &FollowUpForm) -> Result<(), UiError>;

    /// PNG of the current page; `None` when the driver cannot capture
    async fn screenshot(&mut self) -> Result<Option<Vec<u8>>, UiError> {
        Ok(None)
    }

    /// End the session; safe to call more than once
    async fn quit(&mut self) -> Result<(), UiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_loss_is_fatal() {
        assert!(UiError::SessionLost("gone".into()).is_session_fatal());
        assert!(!UiError::interaction("no such element").is_session_fatal());
        assert!(
            !UiError::Timeout {
                step: "record page".into(),
                after: Duration::from_secs(20)
            }
            .is_session_fatal()
        );
    }

    #[test]
    fn test_timeout_message() {
        let err = UiError::Timeout {
            step: "follow-up dialog".into(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "timed out after 1.5s waiting for follow-up dialog");
    }
}
