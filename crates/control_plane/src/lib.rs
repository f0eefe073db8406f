//! # Control Plane
//!
//! 任务控制 HTTP 接口 (axum)。
//!
//! 所有已处理的请求都返回 HTTP 200 和 `{code, message}`，`code` 为 0 表示成功；
//! handler panic 转换为 HTTP 500 与 `code = -1`。

mod api;
mod error;
mod response;

pub use api::{router, serve, serve_on};
pub use error::ControlPlaneError;
pub use response::{ApiResponse, CODE_PANIC};
