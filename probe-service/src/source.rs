//! Connection sources backing the prober.
//!
//! A [`ConnectionSource`] hands out one live connection per call. The pool
//! behind it is configured and owned outside the prober. Dropping the boxed
//! connection hands it back to the pool, on error paths as well.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{
    ColumnIndex, Connection, Decode, MySql, MySqlPool, PgPool, Postgres, Row, Sqlite, SqlitePool,
    Type,
};

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use common::models::{redact_url, ConnectionMetadata, ConnectionPoolStats, DbType};

/// sqlx release line the service is built against.
const DRIVER_VERSION: &str = "0.8";

/// A row rendered as text, one entry per selected column.
pub type TextRow = Vec<Option<String>>;

/// Factory of live database connections.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Acquires one connection. It is released when the box is dropped.
    async fn acquire(&self) -> Result<Box<dyn ProbeConnection>, sqlx::Error>;

    /// Backend behind this source, when known.
    fn backend(&self) -> Option<DbType> {
        None
    }

    /// Current pool statistics.
    fn pool_stats(&self) -> ConnectionPoolStats {
        ConnectionPoolStats::default()
    }
}

/// One acquired connection, as seen by the prober.
#[async_trait]
pub trait ProbeConnection: Send {
    /// Whether the connection no longer answers.
    async fn is_closed(&mut self) -> bool;

    /// Product and driver metadata. Fields that cannot be read are `"unknown"`.
    async fn metadata(&mut self) -> ConnectionMetadata;

    /// Runs `sql` and reads `column` of the first row as an integer.
    /// `Ok(None)` when the query returns no rows.
    async fn fetch_integer(&mut self, sql: &str, column: &str) -> Result<Option<i64>, sqlx::Error>;

    /// Select-list expression reading `column` as text, aliased back to
    /// `column`. Backends whose drivers cannot decode every type into a string
    /// cast on the server.
    fn text_column(&self, column: &str) -> String {
        column.to_string()
    }

    /// Runs `sql` and streams every row rendered as text.
    fn fetch_text_rows<'a>(&'a mut self, sql: &'a str)
        -> BoxStream<'a, Result<TextRow, sqlx::Error>>;
}

/// Connection pool wrapper for the supported backends.
#[derive(Clone)]
pub enum DatabasePool {
    /// MySQL connection pool.
    MySQL(MySqlPool),
    /// PostgreSQL connection pool.
    Postgres(PgPool),
    /// SQLite connection pool.
    SQLite(SqlitePool),
}

impl DatabasePool {
    pub fn db_type(&self) -> DbType {
        match self {
            DatabasePool::MySQL(_) => DbType::MySQL,
            DatabasePool::Postgres(_) => DbType::Postgres,
            DatabasePool::SQLite(_) => DbType::SQLite,
        }
    }
}

/// [`ConnectionSource`] over a sqlx pool.
pub struct SqlxConnectionSource {
    pool: DatabasePool,
    max_connections: u32,
}

impl SqlxConnectionSource {
    /// Configures a pool from `DATABASE_URL` without opening any connection.
    ///
    /// Connecting is deferred to the first acquire so that an unreachable
    /// database shows up as a failed probe instead of a startup error.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let url = config.database_url()?;
        let db_type = DbType::from_url(url)?;
        let timeout = Duration::from_secs(config.connect_timeout_secs);
        let invalid_url =
            |e: sqlx::Error| AppError::Config(format!("invalid DATABASE_URL: {}", e));

        let (pool, max_connections) = match db_type {
            DbType::MySQL => {
                let pool = MySqlPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(timeout)
                    .connect_lazy(url)
                    .map_err(invalid_url)?;
                (DatabasePool::MySQL(pool), config.max_connections)
            }
            DbType::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(timeout)
                    .connect_lazy(url)
                    .map_err(invalid_url)?;
                (DatabasePool::Postgres(pool), config.max_connections)
            }
            DbType::SQLite => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .acquire_timeout(timeout)
                    .connect_lazy(url)
                    .map_err(invalid_url)?;
                (DatabasePool::SQLite(pool), 1)
            }
        };

        tracing::info!(
            db_type = %db_type,
            url = %redact_url(url),
            max_connections,
            "Connection pool configured"
        );
        Ok(Self::from_pool(pool, max_connections))
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: DatabasePool, max_connections: u32) -> Self {
        Self {
            pool,
            max_connections,
        }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Closes the pool, waiting for checked-out connections to come back.
    pub async fn close(&self) {
        match &self.pool {
            DatabasePool::MySQL(p) => p.close().await,
            DatabasePool::Postgres(p) => p.close().await,
            DatabasePool::SQLite(p) => p.close().await,
        }
    }
}

#[async_trait]
impl ConnectionSource for SqlxConnectionSource {
    async fn acquire(&self) -> Result<Box<dyn ProbeConnection>, sqlx::Error> {
        let conn: Box<dyn ProbeConnection> = match &self.pool {
            DatabasePool::MySQL(p) => Box::new(SqlxConnection::MySQL(p.acquire().await?)),
            DatabasePool::Postgres(p) => Box::new(SqlxConnection::Postgres(p.acquire().await?)),
            DatabasePool::SQLite(p) => Box::new(SqlxConnection::SQLite(p.acquire().await?)),
        };
        Ok(conn)
    }

    fn backend(&self) -> Option<DbType> {
        Some(self.pool.db_type())
    }

    fn pool_stats(&self) -> ConnectionPoolStats {
        let (size, idle, closed) = match &self.pool {
            DatabasePool::MySQL(p) => (p.size(), p.num_idle(), p.is_closed()),
            DatabasePool::Postgres(p) => (p.size(), p.num_idle(), p.is_closed()),
            DatabasePool::SQLite(p) => (p.size(), p.num_idle(), p.is_closed()),
        };
        let idle = idle as u32;
        ConnectionPoolStats {
            active: size.saturating_sub(idle),
            idle,
            max_size: self.max_connections,
            is_connected: !closed,
        }
    }
}

/// A pooled connection checked out of one of the sqlx pools.
enum SqlxConnection {
    MySQL(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

impl SqlxConnection {
    fn db_type(&self) -> DbType {
        match self {
            SqlxConnection::MySQL(_) => DbType::MySQL,
            SqlxConnection::Postgres(_) => DbType::Postgres,
            SqlxConnection::SQLite(_) => DbType::SQLite,
        }
    }

    async fn server_version(&mut self) -> Result<String, sqlx::Error> {
        match self {
            SqlxConnection::MySQL(conn) => {
                sqlx::query_scalar::<_, String>("SELECT VERSION()")
                    .fetch_one(&mut **conn)
                    .await
            }
            SqlxConnection::Postgres(conn) => {
                sqlx::query_scalar::<_, String>("SHOW server_version")
                    .fetch_one(&mut **conn)
                    .await
            }
            SqlxConnection::SQLite(conn) => {
                sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
                    .fetch_one(&mut **conn)
                    .await
            }
        }
    }
}

#[async_trait]
impl ProbeConnection for SqlxConnection {
    async fn is_closed(&mut self) -> bool {
        let ping = match self {
            SqlxConnection::MySQL(conn) => conn.ping().await,
            SqlxConnection::Postgres(conn) => conn.ping().await,
            SqlxConnection::SQLite(conn) => conn.ping().await,
        };
        if let Err(e) = &ping {
            tracing::warn!(error = %e, "Ping on acquired connection failed");
        }
        ping.is_err()
    }

    async fn metadata(&mut self) -> ConnectionMetadata {
        let db_type = self.db_type();
        let product_version = self.server_version().await.unwrap_or_else(|e| {
            tracing::warn!(db_type = %db_type, error = %e, "Failed to read server version");
            "unknown".to_string()
        });

        ConnectionMetadata {
            product_name: db_type.product_name().to_string(),
            product_version,
            driver_name: format!("sqlx-{}", db_type),
            driver_version: DRIVER_VERSION.to_string(),
        }
    }

    fn text_column(&self, column: &str) -> String {
        text_column_expr(self.db_type(), column)
    }

    async fn fetch_integer(&mut self, sql: &str, column: &str) -> Result<Option<i64>, sqlx::Error> {
        match self {
            SqlxConnection::MySQL(conn) => sqlx::query(sql)
                .fetch_optional(&mut **conn)
                .await?
                .map(|row| integer_column(&row, column))
                .transpose(),
            SqlxConnection::Postgres(conn) => sqlx::query(sql)
                .fetch_optional(&mut **conn)
                .await?
                .map(|row| integer_column(&row, column))
                .transpose(),
            SqlxConnection::SQLite(conn) => sqlx::query(sql)
                .fetch_optional(&mut **conn)
                .await?
                .map(|row| integer_column(&row, column))
                .transpose(),
        }
    }

    fn fetch_text_rows<'a>(
        &'a mut self,
        sql: &'a str,
    ) -> BoxStream<'a, Result<TextRow, sqlx::Error>> {
        match self {
            SqlxConnection::MySQL(conn) => sqlx::query(sql)
                .fetch(&mut **conn)
                .map_ok(|row| (0..row.len()).map(|i| mysql_text(&row, i)).collect())
                .boxed(),
            SqlxConnection::Postgres(conn) => sqlx::query(sql)
                .fetch(&mut **conn)
                .map_ok(|row| (0..row.len()).map(|i| lossy_text(&row, i)).collect())
                .boxed(),
            SqlxConnection::SQLite(conn) => sqlx::query(sql)
                .fetch(&mut **conn)
                .map_ok(|row| (0..row.len()).map(|i| lossy_text(&row, i)).collect())
                .boxed(),
        }
    }
}

/// Casts `column` to text on the server where the driver would otherwise
/// reject types such as `uuid`, `numeric`, `DECIMAL` or `DATE`.
pub fn text_column_expr(db_type: DbType, column: &str) -> String {
    match db_type {
        DbType::MySQL => format!("CAST({0} AS CHAR) AS {0}", column),
        DbType::Postgres => format!("{0}::text AS {0}", column),
        DbType::SQLite => column.to_string(),
    }
}

/// Reads an integer column, widening 32-bit values.
fn integer_column<'r, R>(row: &'r R, column: &str) -> Result<i64, sqlx::Error>
where
    R: Row,
    for<'c> &'c str: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    i32: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<i64, _>(column)
        .or_else(|err| row.try_get::<i32, _>(column).map(i64::from).map_err(|_| err))
}

/// Renders any column as text. SQL NULL and undecodable values become `None`.
fn lossy_text<'r, R>(row: &'r R, index: usize) -> Option<String>
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    i32: Decode<'r, R::Database> + Type<R::Database>,
    f64: Decode<'r, R::Database> + Type<R::Database>,
    bool: Decode<'r, R::Database> + Type<R::Database>,
    Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v;
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(|n| n.to_string());
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(|b| b.to_string());
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v.map(|bytes| String::from_utf8_lossy(&bytes).into_owned());
    }
    None
}

/// MySQL also has unsigned integers, which the signed decoders reject.
fn mysql_text(row: &MySqlRow, index: usize) -> Option<String> {
    match row.try_get::<Option<u64>, _>(index) {
        Ok(v) => v.map(|n| n.to_string()),
        Err(_) => lossy_text(row, index),
    }
}
