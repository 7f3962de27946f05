//! Executes routing decisions against a live session

use log::{debug, info, warn};
use tokio::time::Instant;

use super::{RouteDecision, Tenant, select_tenant};
use crate::error::BatchError;
use crate::ui::{UiDriver, UiError, WaitConfig};

/// What the session header reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NotLoggedIn,
    LoggedIn(String),
}

/// The session is in a tenant the routing table does not know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantMismatchWarning {
    pub target: Tenant,
    pub current: String,
}

impl std::fmt::Display for TenantMismatchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "session reports '{}', expected head office {}; continuing without switching",
            self.current, self.target
        )
    }
}

impl RouteDecision {
    /// The warning to surface when this decision leaves the session unverified
    pub fn mismatch(&self) -> Option<TenantMismatchWarning> {
        match self {
            RouteDecision::Unrecognized { target, current } => Some(TenantMismatchWarning {
                target: *target,
                current: current.clone(),
            }),
            _ => None,
        }
    }
}

/// Moves a logged-in session into the configured tenant
#[derive(Debug, Clone)]
pub struct TenantRouter {
    target: Tenant,
    wait: WaitConfig,
}

impl TenantRouter {
    pub fn new(target: Tenant, wait: WaitConfig) -> Self {
        Self { target, wait }
    }

    pub fn target(&self) -> Tenant {
        self.target
    }

    /// Read the session's tenant, switch when the table says so, and wait for it to settle
    pub async fn route<D: UiDriver + ?Sized>(&self, driver: &mut D) -> Result<RouteDecision, BatchError> {
        let current = match driver.current_tenant().await.map_err(session_fatal)? {
            SessionState::LoggedIn(label) => label,
            SessionState::NotLoggedIn => {
                return Err(BatchError::SessionFatal(
                    "cannot select a head office before logging in".to_string(),
                ));
            }
        };

        let decision = select_tenant(self.target, &current);
        match &decision {
            RouteDecision::AlreadyThere { .. } => info!("{}", decision.message()),
            RouteDecision::Switch { value, .. } => {
                info!("{}", decision.message());
                driver.select_tenant(*value).await.map_err(session_fatal)?;
                self.settle(driver).await?;
            }
            RouteDecision::Unrecognized { .. } => warn!("{}", decision.message()),
        }
        Ok(decision)
    }

    async fn settle<D: UiDriver + ?Sized>(&self, driver: &mut D) -> Result<(), BatchError> {
        let started = Instant::now();
        loop {
            match driver.current_tenant().await {
                Ok(SessionState::LoggedIn(label)) if Tenant::from_session(&label) == Some(self.target) => {
                    debug!("Session settled in {} after {:?}", self.target, started.elapsed());
                    return Ok(());
                }
                Ok(state) => debug!("Waiting for {}: session shows {:?}", self.target, state),
                Err(e) if e.is_session_fatal() => return Err(session_fatal(e)),
                // The page is mid-postback; try again
                Err(e) => debug!("Tenant probe failed: {}", e),
            }

            let elapsed = started.elapsed();
            if elapsed >= self.wait.timeout {
                return Err(BatchError::SessionFatal(format!(
                    "switch to head office {} did not complete within {:?}",
                    self.target, self.wait.timeout
                )));
            }
            tokio::time::sleep(self.wait.poll.min(self.wait.timeout - elapsed)).await;
        }
    }
}

fn session_fatal(err: UiError) -> BatchError {
    BatchError::SessionFatal(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RemoteRecordId;
    use crate::config::LoginCredentials;
    use crate::ui::FollowUpForm;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Session whose label changes after a switch, optionally after a few probes
    struct FakeSession {
        label: Option<String>,
        switched_to: Vec<u32>,
        settle_after: Option<u32>,
        probes_since_switch: u32,
        pending: Option<String>,
    }

    impl FakeSession {
        fn at(label: &str) -> Self {
            Self {
                label: Some(label.to_string()),
                switched_to: Vec::new(),
                settle_after: Some(2),
                probes_since_switch: 0,
                pending: None,
            }
        }
    }

    #[async_trait]
    impl UiDriver for FakeSession {
        async fn login(&mut self, _credentials: &LoginCredentials) -> Result<(), UiError> {
            Ok(())
        }

        async fn current_tenant(&mut self) -> Result<SessionState, UiError> {
            if self.pending.is_some() {
                self.probes_since_switch += 1;
                if matches!(self.settle_after, Some(n) if self.probes_since_switch >= n) {
                    self.label = self.pending.take();
                }
            }
            Ok(match &self.label {
                Some(label) => SessionState::LoggedIn(label.clone()),
                None => SessionState::NotLoggedIn,
            })
        }

        async fn select_tenant(&mut self, value: u32) -> Result<(), UiError> {
            self.switched_to.push(value);
            let label = match value {
                1 => Tenant::Aldeota,
                3 => Tenant::Sul,
                _ => Tenant::Bezerra,
            };
            self.pending = Some(label.session_label().to_string());
            Ok(())
        }

        async fn open_record(&mut self, _id: &RemoteRecordId) -> Result<(), UiError> {
            Ok(())
        }

        async fn fill_follow_up(&mut self, _form: &FollowUpForm) -> Result<(), UiError> {
            Ok(())
        }

        async fn quit(&mut self) -> Result<(), UiError> {
            Ok(())
        }
    }

    fn quick() -> WaitConfig {
        WaitConfig {
            timeout: Duration::from_millis(200),
            poll: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_switches_and_waits_for_target() {
        let mut session = FakeSession::at("DIGITAL COLLEGE SUL - 74070");
        let router = TenantRouter::new(Tenant::Aldeota, quick());

        let decision = router.route(&mut session).await.unwrap();
        assert_eq!(decision, RouteDecision::Switch { target: Tenant::Aldeota, value: 1 });
        assert_eq!(session.switched_to, vec![1]);
        assert_eq!(session.label.as_deref(), Some(Tenant::Aldeota.session_label()));
    }

    #[tokio::test]
    async fn test_already_there_does_nothing() {
        let mut session = FakeSession::at(Tenant::Bezerra.session_label());
        let router = TenantRouter::new(Tenant::Bezerra, quick());

        let decision = router.route(&mut session).await.unwrap();
        assert!(matches!(decision, RouteDecision::AlreadyThere { .. }));
        assert!(session.switched_to.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_label_degrades_with_warning() {
        let mut session = FakeSession::at("ESCOLA TESTE - 1");
        let router = TenantRouter::new(Tenant::Sul, quick());

        let decision = router.route(&mut session).await.unwrap();
        let warning = decision.mismatch().unwrap();
        assert_eq!(warning.target, Tenant::Sul);
        assert!(warning.to_string().contains("ESCOLATESTE-1"));
        assert!(session.switched_to.is_empty());
    }

    #[tokio::test]
    async fn test_not_logged_in_is_fatal() {
        let mut session = FakeSession::at("x");
        session.label = None;
        let router = TenantRouter::new(Tenant::Sul, quick());

        let err = router.route(&mut session).await.unwrap_err();
        assert!(matches!(err, BatchError::SessionFatal(_)));
    }

    #[tokio::test]
    async fn test_switch_that_never_settles_is_fatal() {
        let mut session = FakeSession::at(Tenant::Sul.session_label());
        session.settle_after = None;
        let router = TenantRouter::new(Tenant::Aldeota, quick());

        let err = router.route(&mut session).await.unwrap_err();
        match err {
            BatchError::SessionFatal(msg) => assert!(msg.contains("Aldeota")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
