//! Connectivity prober.
//!
//! Four independent checks against a [`ConnectionSource`]: a connection can
//! be acquired, a literal query round-trips, the probed table can be counted,
//! and a bounded sample of its rows can be read.
//!
//! Every check acquires its own connection and drops it before returning.
//! Nothing is retried. Data access errors are mapped onto the check's error
//! kind with the driver message kept verbatim.

use std::sync::Arc;

use async_stream::try_stream;
use futures::stream::{BoxStream, TryStreamExt};

use common::errors::{AppError, AppResult};
use common::models::{ConnectionMetadata, DemoRecord, TableCount, TableSample};
use common::utils::SqlValidator;

use crate::narrator::Narrator;
use crate::source::{ConnectionSource, ProbeConnection};

/// Literal query of the basic query check.
pub const BASIC_QUERY: &str = "SELECT 1 AS test_value";

/// Runs probe checks against an injected connection source.
pub struct Prober {
    source: Arc<dyn ConnectionSource>,
    narrator: Arc<dyn Narrator>,
}

impl Prober {
    pub fn new(source: Arc<dyn ConnectionSource>, narrator: Arc<dyn Narrator>) -> Self {
        Self { source, narrator }
    }

    fn narrate(&self, line: impl Into<String>) {
        self.narrator.narrate(line.into());
    }

    async fn acquire(&self) -> AppResult<Box<dyn ProbeConnection>> {
        self.source
            .acquire()
            .await
            .map_err(|e| AppError::DatabaseConnection(e.to_string()))
    }

    /// Acquires a connection, checks it is open and reports its metadata.
    pub async fn verify_connection(&self) -> AppResult<ConnectionMetadata> {
        self.narrate("=== verifying database connection ===");

        let mut conn = self.acquire().await?;
        if conn.is_closed().await {
            return Err(AppError::DatabaseConnection(
                "acquired connection is already closed".into(),
            ));
        }

        let metadata = conn.metadata().await;
        drop(conn);

        self.narrate(format!("product name: {}", metadata.product_name));
        self.narrate(format!("product version: {}", metadata.product_version));
        self.narrate(format!("driver name: {}", metadata.driver_name));
        self.narrate(format!("driver version: {}", metadata.driver_version));
        self.narrate("database connection verified");
        Ok(metadata)
    }

    /// Runs `SELECT 1 AS test_value` and expects exactly the value 1.
    pub async fn verify_basic_query(&self) -> AppResult<i64> {
        self.narrate("=== verifying basic query ===");

        let mut conn = self.acquire().await?;
        let value = conn
            .fetch_integer(BASIC_QUERY, "test_value")
            .await
            .map_err(|e| AppError::DatabaseQuery(e.to_string()))?
            .ok_or_else(|| AppError::DatabaseQuery(format!("`{}` returned no rows", BASIC_QUERY)))?;
        drop(conn);

        if value != 1 {
            return Err(AppError::DatabaseQuery(format!(
                "expected test_value = 1, got {}",
                value
            )));
        }

        self.narrate("basic query verified");
        Ok(value)
    }

    /// Counts the rows of `table`.
    ///
    /// Passes for any count, zero included: the check is that the query runs.
    pub async fn verify_table_exists(&self, table: &str) -> AppResult<TableCount> {
        self.narrate(format!("=== verifying table `{}` exists ===", table));

        let table = SqlValidator::validate_identifier(table)?;
        let sql = format!("SELECT COUNT(*) AS total FROM {}", table);

        let mut conn = self.acquire().await?;
        let total = conn
            .fetch_integer(&sql, "total")
            .await
            .map_err(|e| AppError::Schema(e.to_string()))?
            .ok_or_else(|| AppError::Schema(format!("COUNT(*) on `{}` returned no rows", table)))?;
        drop(conn);

        self.narrate(format!("`{}` row count: {}", table, total));
        if total < 0 {
            return Err(AppError::Schema(format!(
                "`{}` reported a negative row count: {}",
                table, total
            )));
        }

        self.narrate(format!("table `{}` verified", table));
        Ok(TableCount {
            table: table.to_string(),
            total,
        })
    }

    /// Streams at most `limit` rows of `table` as [`DemoRecord`]s.
    ///
    /// Nothing runs until the stream is polled. The connection is held by the
    /// stream and released when it ends or is dropped. Calling again starts a
    /// fresh query.
    pub fn stream_table_rows<'a>(
        &'a self,
        table: &'a str,
        limit: u32,
    ) -> BoxStream<'a, AppResult<DemoRecord>> {
        Box::pin(try_stream! {
            let table = SqlValidator::validate_identifier(table)?;

            let mut conn = self.acquire().await?;
            let sql = format!(
                "SELECT {}, {}, {} FROM {} LIMIT {}",
                conn.text_column("id"),
                conn.text_column("name"),
                conn.text_column("age"),
                table,
                limit
            );
            let mut rows = conn.fetch_text_rows(&sql);
            while let Some(row) = rows
                .try_next()
                .await
                .map_err(|e| AppError::Schema(e.to_string()))?
            {
                yield DemoRecord::from_columns(row);
            }
        })
    }

    /// Reads at most `limit` rows of `table`, narrating each one.
    ///
    /// An empty table is not a failure.
    pub async fn sample_table_rows(&self, table: &str, limit: u32) -> AppResult<TableSample> {
        self.narrate(format!("=== sampling up to {} rows of `{}` ===", limit, table));

        let mut records = Vec::new();
        let mut rows = self.stream_table_rows(table, limit);
        while let Some(record) = rows.try_next().await? {
            self.narrate(format!("record {} - {}", records.len() + 1, record));
            records.push(record);
        }
        drop(rows);

        self.narrate(format!(
            "table `{}` sampled, {} record(s) returned",
            table,
            records.len()
        ));
        Ok(TableSample {
            table: table.to_string(),
            limit,
            returned: records.len(),
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrator::RecordingNarrator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RefusingSource;

    #[async_trait]
    impl ConnectionSource for RefusingSource {
        async fn acquire(&self) -> Result<Box<dyn ProbeConnection>, sqlx::Error> {
            Err(sqlx::Error::PoolTimedOut)
        }
    }

    fn prober(source: impl ConnectionSource + 'static) -> (Prober, Arc<RecordingNarrator>) {
        let narrator = Arc::new(RecordingNarrator::new());
        (Prober::new(Arc::new(source), narrator.clone()), narrator)
    }

    #[tokio::test]
    async fn test_every_check_reports_connection_error() {
        let (prober, _) = prober(RefusingSource);
        assert!(matches!(
            prober.verify_connection().await,
            Err(AppError::DatabaseConnection(_))
        ));
        assert!(matches!(
            prober.verify_basic_query().await,
            Err(AppError::DatabaseConnection(_))
        ));
        assert!(matches!(
            prober.verify_table_exists("demo").await,
            Err(AppError::DatabaseConnection(_))
        ));
        assert!(matches!(
            prober.sample_table_rows("demo", 3).await,
            Err(AppError::DatabaseConnection(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_table_is_rejected_before_acquire() {
        let (prober, narrator) = prober(RefusingSource);
        assert!(matches!(
            prober.verify_table_exists("demo; DROP TABLE demo").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            prober.sample_table_rows("1demo", 3).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(narrator.lines().len(), 2);
    }

    #[derive(Default)]
    struct CountingSource {
        acquired: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionSource for CountingSource {
        async fn acquire(&self) -> Result<Box<dyn ProbeConnection>, sqlx::Error> {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Err(sqlx::Error::PoolClosed)
        }
    }

    #[tokio::test]
    async fn test_stream_acquires_only_when_polled() {
        let source = Arc::new(CountingSource::default());
        let prober = Prober::new(source.clone(), Arc::new(RecordingNarrator::new()));

        drop(prober.stream_table_rows("demo", 3));
        assert_eq!(source.acquired.load(Ordering::SeqCst), 0);

        let mut stream = prober.stream_table_rows("demo", 3);
        assert!(matches!(
            stream.try_next().await,
            Err(AppError::DatabaseConnection(_))
        ));
        assert_eq!(source.acquired.load(Ordering::SeqCst), 1);
    }
}
