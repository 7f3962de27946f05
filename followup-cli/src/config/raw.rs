//! On-disk shape of the batch configuration
//!
//! Everything is optional here; [`super::BatchConfig::from_raw`] decides what
//! is required. Older front ends wrote Portuguese snake_case keys, which are
//! still accepted.

use std::collections::HashMap;

use serde::Deserialize;

use crate::api::{Backoff, TenantCredentials};
use crate::sheet::KeyColumnKind;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfig {
    #[serde(alias = "colunas")]
    pub selected_columns: Option<Vec<String>>,
    pub key_column_kind: Option<KeyColumnKind>,
    pub key_column_name: Option<String>,
    #[serde(alias = "atendente")]
    pub agent_name: Option<String>,
    #[serde(alias = "head_office")]
    pub tenant: Option<String>,
    pub credentials: Option<RawCredentials>,

    #[serde(alias = "aba")]
    pub sheet: Option<String>,
    pub header_row: Option<usize>,
    pub date_columns: Option<Vec<String>>,
    pub directory: Option<HashMap<String, TenantCredentials>>,
    pub follow_up: Option<RawFollowUp>,
    pub timeouts: Option<RawTimeouts>,
    pub retry: Option<RawRetry>,
    pub base_url: Option<String>,
    pub directory_url: Option<String>,
    pub webdriver_url: Option<String>,
    pub screenshots: Option<bool>,

    #[serde(rename = "coluna_alunoid")]
    pub legacy_remote_id_column: Option<String>,
    #[serde(rename = "coluna_cpf")]
    pub legacy_tax_id_column: Option<String>,
    #[serde(rename = "sponte_email")]
    pub legacy_email: Option<String>,
    #[serde(rename = "sponte_password")]
    pub legacy_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCredentials {
    pub login_email: Option<String>,
    pub login_password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFollowUp {
    pub channel: Option<String>,
    pub appointment_type: Option<String>,
    pub interest_level: Option<String>,
    pub subject_prefix: Option<String>,
    pub submit: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTimeouts {
    pub poll_ms: Option<u64>,
    pub step_secs: Option<u64>,
    pub http_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRetry {
    pub attempts: Option<u32>,
    pub delay_ms: Option<u64>,
    pub backoff: Option<Backoff>,
}
