//! 数据库连通性探测服务
//!
//! 对外部注入的连接源执行一次性诊断：
//! - 获取连接并读取驱动元数据
//! - 执行 `SELECT 1` 字面量查询
//! - 验证探测表存在且可查询
//! - 采样读取探测表的前若干行

pub mod handlers;
pub mod narrator;
pub mod prober;
pub mod routes;
pub mod service;
pub mod source;
pub mod state;

pub use narrator::{Narrator, RecordingNarrator, TracingNarrator};
pub use prober::Prober;
pub use routes::create_router;
pub use service::{Probe, ProbeService};
pub use source::{ConnectionSource, DatabasePool, ProbeConnection, SqlxConnectionSource, TextRow};
pub use state::AppState;
