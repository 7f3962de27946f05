//! Directory lookup data types

use serde::{Deserialize, Serialize};

/// Identifier of a student record in the remote system
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteRecordId(String);

impl RemoteRecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RemoteRecordId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RemoteRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-tenant credentials for the directory service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantCredentials {
    pub client_code: String,
    pub token: String,
}

impl TenantCredentials {
    pub fn new(client_code: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client_code: client_code.into(),
            token: token.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.client_code.trim().is_empty() && !self.token.trim().is_empty()
    }
}

impl std::fmt::Debug for TenantCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantCredentials")
            .field("client_code", &self.client_code)
            .field("token", &"<redacted>")
            .finish()
    }
}
