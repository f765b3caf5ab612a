//! 探测服务路由模块

use axum::{middleware, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use common::middleware::request_id_middleware;
use crate::handlers;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "探测服务 API",
        version = "0.1.0",
        description = "数据库连通性与表结构探测微服务"
    ),
    paths(
        handlers::run_all_probes,
        handlers::probe_connection,
        handlers::probe_basic_query,
        handlers::probe_table,
        handlers::probe_table_sample,
        handlers::health_check,
    ),
    components(schemas(
        common::models::ProbeCheck,
        common::models::ProbeDetails,
        common::models::ProbeResult,
        common::models::ProbeReport,
        common::models::ConnectionMetadata,
        common::models::TableCount,
        common::models::TableSample,
        common::models::DemoRecord,
        common::models::ConnectionPoolStats,
        common::models::DbType,
        handlers::HealthResponse,
    )),
    tags(
        (name = "probes", description = "数据库探测端点"),
        (name = "health", description = "健康检查端点")
    )
)]
pub struct ApiDoc;

/// 创建探测路由
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/probes", get(handlers::run_all_probes))
        .route("/api/probes/connection", get(handlers::probe_connection))
        .route("/api/probes/basic-query", get(handlers::probe_basic_query))
        .route("/api/probes/tables/{table}", get(handlers::probe_table))
        .route(
            "/api/probes/tables/{table}/sample",
            get(handlers::probe_table_sample),
        )
        .route("/api/health", get(handlers::health_check))
}

/// 组装完整应用（路由、中间件、状态）
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(router())
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
