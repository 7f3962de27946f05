//! Spreadsheet-driven follow-up automation
//!
//! Reads a workbook of student rows, resolves each row to a remote record
//! through the directory service, and appends a follow-up to that record
//! through a browser session. Outcomes are kept in per-tenant succeeded and
//! failed ledgers so reruns only touch rows that have not succeeded yet.

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod ledger;
pub mod processor;
pub mod sheet;
pub mod tenant;
pub mod ui;

pub use config::{BatchConfig, ConfigError, DataDir, LoginCredentials};
pub use context::{BatchContext, BatchReport, StopSignal};
pub use error::BatchError;
