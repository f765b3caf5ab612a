//! 数据库探测服务公共模块
//!
//! 提供各服务共享的基础设施：
//! - 配置加载
//! - 错误类型与 HTTP 错误响应
//! - 统一响应格式
//! - 探测结果数据模型
//! - 请求 ID 中间件

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
