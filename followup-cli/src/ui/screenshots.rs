//! Diagnostic screenshots for unattended runs
//!
//! Captures are best effort: a failed capture or write is logged and never
//! changes a row's outcome.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};

use super::UiDriver;

pub const AFTER_LOGIN: &str = "02_pos_login.png";
pub const AFTER_TENANT_SWITCH: &str = "03_troca_sede.png";
pub const FINAL: &str = "zz_final.png";

/// File name for the screenshot taken when a row fails in the UI
pub fn row_error(line: usize) -> String {
    format!("erro_linha_{}.png", line)
}

/// Where screenshots are written; captures are skipped when disabled
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenshotDir {
    dir: Option<PathBuf>,
}

impl ScreenshotDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Capture the current page as `name`; returns the written path
    pub async fn capture<D: UiDriver + ?Sized>(&self, driver: &mut D, name: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;

        let png = match driver.screenshot().await {
            Ok(Some(png)) => png,
            Ok(None) => return None,
            Err(e) => {
                warn!("Screenshot {} not taken: {}", name, e);
                return None;
            }
        };

        let path = dir.join(name);
        match write_png(&path, &png) {
            Ok(()) => {
                debug!("Screenshot saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        }
    }
}

fn write_png(path: &Path, png: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create screenshot directory: {}", parent.display()))?;
    }
    std::fs::write(path, png).with_context(|| format!("Failed to write screenshot: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RemoteRecordId;
    use crate::config::LoginCredentials;
    use crate::tenant::SessionState;
    use crate::ui::{FollowUpForm, UiError};
    use async_trait::async_trait;

    struct Camera {
        shot: Result<Option<Vec<u8>>, UiError>,
        taken: usize,
    }

    #[async_trait]
    impl UiDriver for Camera {
        async fn login(&mut self, _credentials: &LoginCredentials) -> Result<(), UiError> {
            Ok(())
        }
        async fn current_tenant(&mut self) -> Result<SessionState, UiError> {
            Ok(SessionState::NotLoggedIn)
        }
        async fn select_tenant(&mut self, _value: u32) -> Result<(), UiError> {
            Ok(())
        }
        async fn open_record(&mut self, _id: &RemoteRecordId) -> Result<(), UiError> {
            Ok(())
        }
        async fn fill_follow_up(&mut self, _form: &FollowUpForm) -> Result<(), UiError> {
            Ok(())
        }
        async fn screenshot(&mut self) -> Result<Option<Vec<u8>>, UiError> {
            self.taken += 1;
            self.shot.clone()
        }
        async fn quit(&mut self) -> Result<(), UiError> {
            Ok(())
        }
    }

    #[test]
    fn test_row_error_name() {
        assert_eq!(row_error(7), "erro_linha_7.png");
    }

    #[tokio::test]
    async fn test_capture_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let shots = ScreenshotDir::new(dir.path().join("screenshots"));
        let mut camera = Camera {
            shot: Ok(Some(vec![0x89, b'P', b'N', b'G'])),
            taken: 0,
        };

        let path = shots.capture(&mut camera, FINAL).await.unwrap();

        assert_eq!(path, dir.path().join("screenshots").join("zz_final.png"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn test_disabled_never_asks_the_driver() {
        let mut camera = Camera {
            shot: Ok(Some(vec![1])),
            taken: 0,
        };
        assert!(ScreenshotDir::disabled().capture(&mut camera, FINAL).await.is_none());
        assert_eq!(camera.taken, 0);
    }

    #[tokio::test]
    async fn test_capture_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let shots = ScreenshotDir::new(dir.path());
        let mut camera = Camera {
            shot: Err(UiError::SessionLost("invalid session id".into())),
            taken: 0,
        };
        assert!(shots.capture(&mut camera, AFTER_LOGIN).await.is_none());
        assert!(!dir.path().join(AFTER_LOGIN).exists());
    }
}
