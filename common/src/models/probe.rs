//! Probe result models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::errors::AppError;

/// Maximum rows a single sample request may ask for.
pub const MAX_SAMPLE_LIMIT: u32 = 1000;

/// The four independent checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProbeCheck {
    /// A live connection can be acquired.
    Connection,
    /// `SELECT 1` round-trips.
    BasicQuery,
    /// The probed table exists and can be counted.
    TableExists,
    /// A bounded row sample can be read.
    TableSample,
}

impl ProbeCheck {
    fn success_message(&self) -> &'static str {
        match self {
            ProbeCheck::Connection => "database connection verified",
            ProbeCheck::BasicQuery => "basic query verified",
            ProbeCheck::TableExists => "table is present and queryable",
            ProbeCheck::TableSample => "table sample read",
        }
    }
}

impl std::fmt::Display for ProbeCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProbeCheck::Connection => "connection",
            ProbeCheck::BasicQuery => "basic_query",
            ProbeCheck::TableExists => "table_exists",
            ProbeCheck::TableSample => "table_sample",
        };
        f.write_str(name)
    }
}

/// Driver and product metadata of a live connection. Informational only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConnectionMetadata {
    pub product_name: String,
    pub product_version: String,
    pub driver_name: String,
    pub driver_version: String,
}

/// Row count of the probed table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TableCount {
    pub table: String,
    pub total: i64,
}

/// One sampled row. Every column is read as text, `None` for SQL NULL or
/// values that cannot be rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DemoRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub age: Option<String>,
}

impl DemoRecord {
    /// Builds a record from positional `id, name, age` columns.
    pub fn from_columns(columns: Vec<Option<String>>) -> Self {
        let mut columns = columns.into_iter();
        Self {
            id: columns.next().flatten(),
            name: columns.next().flatten(),
            age: columns.next().flatten(),
        }
    }
}

impl std::fmt::Display for DemoRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "NULL".to_string());
        write!(
            f,
            "id: {}, name: {}, age: {}",
            show(&self.id),
            show(&self.name),
            show(&self.age)
        )
    }
}

/// Rows read from the probed table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct TableSample {
    pub table: String,
    /// Requested upper bound.
    pub limit: u32,
    /// Rows actually returned; may be below `limit`.
    pub returned: usize,
    pub records: Vec<DemoRecord>,
}

/// Check-specific payload of a passed probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeDetails {
    Connection(ConnectionMetadata),
    BasicQuery { test_value: i64 },
    TableExists(TableCount),
    TableSample(TableSample),
}

/// Outcome of a single check.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProbeResult {
    pub check: ProbeCheck,
    pub passed: bool,
    /// Success summary, or the failure message with the underlying error text.
    pub message: String,
    /// Error code when the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ProbeDetails>,
    /// Narration lines emitted while the check ran, failure included.
    pub narration: Vec<String>,
    pub duration_ms: u64,
}

impl ProbeResult {
    pub fn passed(
        check: ProbeCheck,
        details: ProbeDetails,
        narration: Vec<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            check,
            passed: true,
            message: check.success_message().to_string(),
            error_code: None,
            details: Some(details),
            narration,
            duration_ms,
        }
    }

    pub fn failed(
        check: ProbeCheck,
        error: &AppError,
        narration: Vec<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            check,
            passed: false,
            message: error.to_string(),
            error_code: Some(error.code().to_string()),
            details: None,
            narration,
            duration_ms,
        }
    }
}

/// Outcome of running every check once.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProbeReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    /// True when every check passed.
    pub passed: bool,
    pub results: Vec<ProbeResult>,
}

impl ProbeReport {
    pub fn new(run_id: String, started_at: DateTime<Utc>, results: Vec<ProbeResult>) -> Self {
        Self {
            run_id,
            started_at,
            passed: results.iter().all(|r| r.passed),
            results,
        }
    }

    /// Checks that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

/// Query parameters of the sample endpoint.
#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SampleParams {
    /// Maximum rows to return (1-1000).
    #[validate(range(min = 1, max = MAX_SAMPLE_LIMIT, message = "limit must be between 1 and 1000"))]
    pub limit: Option<u32>,
}
