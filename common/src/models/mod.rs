//! Shared data models.

pub mod connection;
pub mod monitor;
pub mod probe;

// Re-export commonly used types
pub use connection::{redact_url, DbType};
pub use monitor::ConnectionPoolStats;
pub use probe::{
    ConnectionMetadata, DemoRecord, ProbeCheck, ProbeDetails, ProbeReport, ProbeResult,
    SampleParams, TableCount, TableSample, MAX_SAMPLE_LIMIT,
};
