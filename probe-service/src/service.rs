//! 探测服务模块
//!
//! 将探测结果（成功或失败）连同过程中记录的叙述行一起封装为 `ProbeResult`。

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use common::models::{ProbeCheck, ProbeDetails, ProbeReport, ProbeResult};

use crate::narrator::RecordingNarrator;
use crate::prober::Prober;
use crate::source::ConnectionSource;

/// 单次探测请求
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    Connection,
    BasicQuery,
    TableExists(&'a str),
    TableSample(&'a str, u32),
}

impl Probe<'_> {
    pub fn check(&self) -> ProbeCheck {
        match self {
            Probe::Connection => ProbeCheck::Connection,
            Probe::BasicQuery => ProbeCheck::BasicQuery,
            Probe::TableExists(_) => ProbeCheck::TableExists,
            Probe::TableSample(..) => ProbeCheck::TableSample,
        }
    }
}

/// 数据库探测服务
pub struct ProbeService {
    source: Arc<dyn ConnectionSource>,
}

impl ProbeService {
    /// 创建新的探测服务实例
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Self { source }
    }

    /// 执行单项探测
    pub async fn run(&self, probe: Probe<'_>) -> ProbeResult {
        let check = probe.check();
        let narrator = Arc::new(RecordingNarrator::new());
        let prober = Prober::new(self.source.clone(), narrator.clone());
        let started = Instant::now();

        let outcome = match probe {
            Probe::Connection => prober.verify_connection().await.map(ProbeDetails::Connection),
            Probe::BasicQuery => prober
                .verify_basic_query()
                .await
                .map(|test_value| ProbeDetails::BasicQuery { test_value }),
            Probe::TableExists(table) => prober
                .verify_table_exists(table)
                .await
                .map(ProbeDetails::TableExists),
            Probe::TableSample(table, limit) => prober
                .sample_table_rows(table, limit)
                .await
                .map(ProbeDetails::TableSample),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        let narration = narrator.take_lines();
        match outcome {
            Ok(details) => {
                tracing::info!(check = %check, duration_ms, "探测通过");
                ProbeResult::passed(check, details, narration, duration_ms)
            }
            Err(e) => {
                tracing::warn!(check = %check, duration_ms, error = %e, "探测失败");
                ProbeResult::failed(check, &e, narration, duration_ms)
            }
        }
    }

    /// 依次执行全部四项探测
    pub async fn run_all(&self, table: &str, limit: u32) -> ProbeReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();

        let mut results = Vec::with_capacity(4);
        for probe in [
            Probe::Connection,
            Probe::BasicQuery,
            Probe::TableExists(table),
            Probe::TableSample(table, limit),
        ] {
            results.push(self.run(probe).await);
        }

        let report = ProbeReport::new(run_id, started_at, results);
        tracing::info!(
            run_id = %report.run_id,
            passed = report.passed,
            failures = report.failures().count(),
            "探测完成"
        );
        report
    }
}
