//! 数据库连通性探测服务
//!
//! 启动后可选地执行一次完整探测并写入日志，随后通过 HTTP 暴露各项探测。

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use common::config::{load_dotenv, AppConfig};
use probe_service::{create_router, AppState, Prober, SqlxConnectionSource, TracingNarrator};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "probe-service";
const DEFAULT_PORT: u16 = 8085;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (if present) before anything else
    load_dotenv(Path::new(".env"));

    // 初始化日志追踪
    init_tracing();

    // 加载配置
    let config = AppConfig::load_with_service(SERVICE_NAME, DEFAULT_PORT);

    // 创建连接池（延迟连接，数据库不可达时由探测报告失败）
    let source = Arc::new(
        SqlxConnectionSource::from_config(&config)
            .context("failed to configure connection pool (check DATABASE_URL)")?,
    );

    if config.probe_on_startup {
        startup_probe(&source, &config).await;
    }

    let state = AppState::new(config.clone(), source.clone());
    let app = create_router(state);

    // 启动服务
    let addr = config.bind_address();
    info!(service = SERVICE_NAME, address = %addr, "启动服务");

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务启动失败")?;

    source.close().await;
    info!(service = SERVICE_NAME, "服务已停止");
    Ok(())
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let (plain, json) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json()))
    } else {
        (Some(tracing_subscriber::fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Runs every check once and narrates straight into the log.
async fn startup_probe(source: &Arc<SqlxConnectionSource>, config: &AppConfig) {
    let prober = Prober::new(source.clone(), Arc::new(TracingNarrator));
    let table = config.probe_table.as_str();

    let outcomes = [
        ("connection", prober.verify_connection().await.map(|_| ())),
        ("basic_query", prober.verify_basic_query().await.map(|_| ())),
        ("table_exists", prober.verify_table_exists(table).await.map(|_| ())),
        (
            "table_sample",
            prober
                .sample_table_rows(table, config.sample_limit)
                .await
                .map(|_| ()),
        ),
    ];

    for (check, outcome) in outcomes {
        if let Err(e) = outcome {
            warn!(check, error = %e, "启动探测失败");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "无法监听关闭信号");
        std::future::pending::<()>().await;
    }
}
