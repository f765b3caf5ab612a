//! Shared fixtures: in-memory SQLite sources and scripted fakes.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use probe_service::{ConnectionSource, DatabasePool, ProbeConnection, SqlxConnectionSource, TextRow};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use common::models::ConnectionMetadata;

const NAMES: [&str; 5] = ["alice", "bob", "carol", "dave", "erin"];

/// Single-connection in-memory pool. The connection never expires, so the
/// database survives between acquires; a leaked connection makes the next
/// acquire time out.
pub async fn sqlite_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(Duration::from_secs(2))
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite pool")
}

pub async fn create_demo_table(pool: &SqlitePool) {
    sqlx::query("CREATE TABLE demo (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)")
        .execute(pool)
        .await
        .expect("create demo table");
}

pub async fn insert_demo_rows(pool: &SqlitePool, count: usize) {
    for (i, name) in NAMES.iter().cycle().take(count).enumerate() {
        sqlx::query("INSERT INTO demo (name, age) VALUES (?, ?)")
            .bind(*name)
            .bind(20 + i as i64)
            .execute(pool)
            .await
            .expect("insert demo row");
    }
}

pub fn source_for(pool: SqlitePool) -> Arc<SqlxConnectionSource> {
    Arc::new(SqlxConnectionSource::from_pool(DatabasePool::SQLite(pool), 1))
}

/// Source over a `demo` table holding `rows` rows.
pub async fn demo_source(rows: usize) -> Arc<SqlxConnectionSource> {
    let pool = sqlite_pool().await;
    create_demo_table(&pool).await;
    insert_demo_rows(&pool, rows).await;
    source_for(pool)
}

/// Source over a database without a `demo` table.
pub async fn bare_source() -> Arc<SqlxConnectionSource> {
    source_for(sqlite_pool().await)
}

/// Fails every acquire with the given message.
pub struct RefusingSource(pub &'static str);

#[async_trait]
impl ConnectionSource for RefusingSource {
    async fn acquire(&self) -> Result<Box<dyn ProbeConnection>, sqlx::Error> {
        Err(sqlx::Error::Protocol(self.0.to_string()))
    }
}

/// Hands out fake connections with canned answers and counts releases.
pub struct ScriptedSource {
    pub closed: bool,
    pub integer: Option<i64>,
    pub rows: Vec<TextRow>,
    pub acquired: AtomicUsize,
    pub released: Arc<AtomicUsize>,
    pub statements: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn answering(integer: Option<i64>) -> Self {
        Self {
            closed: false,
            integer,
            rows: Vec::new(),
            acquired: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
            statements: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::answering(Some(1))
        }
    }

    pub fn with_rows(mut self, rows: Vec<TextRow>) -> Self {
        self.rows = rows;
        self
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// SQL sent over any connection, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionSource for ScriptedSource {
    async fn acquire(&self) -> Result<Box<dyn ProbeConnection>, sqlx::Error> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            closed: self.closed,
            integer: self.integer,
            rows: self.rows.clone(),
            released: self.released.clone(),
            statements: self.statements.clone(),
        }))
    }
}

struct ScriptedConnection {
    closed: bool,
    integer: Option<i64>,
    rows: Vec<TextRow>,
    released: Arc<AtomicUsize>,
    statements: Arc<Mutex<Vec<String>>>,
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProbeConnection for ScriptedConnection {
    async fn is_closed(&mut self) -> bool {
        self.closed
    }

    async fn metadata(&mut self) -> ConnectionMetadata {
        ConnectionMetadata {
            product_name: "Scripted".into(),
            product_version: "1.0".into(),
            driver_name: "scripted".into(),
            driver_version: "1.0".into(),
        }
    }

    async fn fetch_integer(&mut self, sql: &str, _column: &str) -> Result<Option<i64>, sqlx::Error> {
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(self.integer)
    }

    /// Casts like a server that cannot hand back every type as text.
    fn text_column(&self, column: &str) -> String {
        format!("CAST({0} AS TEXT) AS {0}", column)
    }

    fn fetch_text_rows<'a>(
        &'a mut self,
        sql: &'a str,
    ) -> BoxStream<'a, Result<TextRow, sqlx::Error>> {
        self.statements.lock().unwrap().push(sql.to_string());
        stream::iter(self.rows.clone().into_iter().map(Ok)).boxed()
    }
}
