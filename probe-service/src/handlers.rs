//! Handler模块

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use common::errors::AppError;
use common::middleware::RequestId;
use common::models::{ConnectionPoolStats, DbType, ProbeReport, ProbeResult, SampleParams};
use common::response::ApiResponse;
use common::utils::SqlValidator;
use crate::service::Probe;
use crate::state::AppState;

/// 依次执行全部探测（使用配置中的表名与采样条数）
#[utoipa::path(
    get,
    path = "/api/probes",
    tag = "probes",
    responses(
        (status = 200, description = "全部探测通过", body = ApiResponse<ProbeReport>),
        (status = 503, description = "至少一项探测失败", body = ApiResponse<ProbeReport>)
    )
)]
pub async fn run_all_probes(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Response {
    let report = state
        .probes
        .run_all(&state.config.probe_table, state.config.sample_limit)
        .await;

    let body = if report.passed {
        ApiResponse::ok(report)
    } else {
        let failed = report.failures().count();
        let total = report.results.len();
        ApiResponse::failed(
            report,
            "PROBE_FAILED",
            format!("{} of {} checks failed", failed, total),
        )
    };
    respond(body, &state, &request_id)
}

/// 验证数据库连接
#[utoipa::path(
    get,
    path = "/api/probes/connection",
    tag = "probes",
    responses(
        (status = 200, description = "连接正常", body = ApiResponse<ProbeResult>),
        (status = 503, description = "连接失败", body = ApiResponse<ProbeResult>)
    )
)]
pub async fn probe_connection(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Response {
    let result = state.probes.run(Probe::Connection).await;
    respond(result_body(result), &state, &request_id)
}

/// 验证基本查询 `SELECT 1`
#[utoipa::path(
    get,
    path = "/api/probes/basic-query",
    tag = "probes",
    responses(
        (status = 200, description = "查询正常", body = ApiResponse<ProbeResult>),
        (status = 503, description = "查询失败", body = ApiResponse<ProbeResult>)
    )
)]
pub async fn probe_basic_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Response {
    let result = state.probes.run(Probe::BasicQuery).await;
    respond(result_body(result), &state, &request_id)
}

/// 验证表是否存在
#[utoipa::path(
    get,
    path = "/api/probes/tables/{table}",
    tag = "probes",
    params(
        ("table" = String, Path, description = "表名")
    ),
    responses(
        (status = 200, description = "表存在且可查询", body = ApiResponse<ProbeResult>),
        (status = 400, description = "表名不合法"),
        (status = 503, description = "表不存在或查询失败", body = ApiResponse<ProbeResult>)
    )
)]
pub async fn probe_table(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(table): Path<String>,
) -> Result<Response, AppError> {
    SqlValidator::validate_identifier(&table)?;
    let result = state.probes.run(Probe::TableExists(&table)).await;
    Ok(respond(result_body(result), &state, &request_id))
}

/// 采样读取表中的若干行
#[utoipa::path(
    get,
    path = "/api/probes/tables/{table}/sample",
    tag = "probes",
    params(
        ("table" = String, Path, description = "表名"),
        SampleParams
    ),
    responses(
        (status = 200, description = "采样成功（可能为空）", body = ApiResponse<ProbeResult>),
        (status = 400, description = "表名或 limit 不合法"),
        (status = 503, description = "查询失败", body = ApiResponse<ProbeResult>)
    )
)]
pub async fn probe_table_sample(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(table): Path<String>,
    params: Result<Query<SampleParams>, QueryRejection>,
) -> Result<Response, AppError> {
    SqlValidator::validate_identifier(&table)?;
    let Query(params) = params.map_err(|e| AppError::Validation(e.body_text()))?;
    params
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let limit = params.limit.unwrap_or(state.config.sample_limit);
    let result = state.probes.run(Probe::TableSample(&table, limit)).await;
    Ok(respond(result_body(result), &state, &request_id))
}

/// 健康检查端点（不访问数据库）
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses(
        (status = 200, description = "服务运行正常", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let pool = state.source.pool_stats();
    Json(HealthResponse {
        status: if pool.is_connected { "healthy" } else { "pool_closed" }.to_string(),
        service: state.config.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        db_type: state.source.backend(),
        pool,
    })
}

fn result_body(result: ProbeResult) -> ApiResponse<ProbeResult> {
    if result.passed {
        return ApiResponse::ok(result);
    }
    let code = result
        .error_code
        .clone()
        .unwrap_or_else(|| "PROBE_FAILED".to_string());
    let message = result.message.clone();
    ApiResponse::failed(result, code, message)
}

fn respond<T: Serialize>(body: ApiResponse<T>, state: &AppState, request_id: &RequestId) -> Response {
    let status = if body.success {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = body
        .with_request_id(request_id.as_str())
        .with_service(state.config.service_name.clone());
    (status, Json(body)).into_response()
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<DbType>,
    pub pool: ConnectionPoolStats,
}
