//! Response envelope `{code, message}`

use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use task_manager::TaskError;

/// Code for a handler panic
pub const CODE_PANIC: i32 = -1;

/// Every handled request answers with this body and HTTP 200
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub code: i32,
    pub message: Value,
}

impl ApiResponse {
    pub fn ok(message: impl Into<Value>) -> Self {
        Self {
            code: 0,
            message: message.into(),
        }
    }

    pub fn error(err: &TaskError) -> Self {
        Self {
            code: err.code(),
            message: Value::String(err.to_string()),
        }
    }
}

impl From<Result<Value, TaskError>> for ApiResponse {
    fn from(result: Result<Value, TaskError>) -> Self {
        match result {
            Ok(message) => Self::ok(message),
            Err(e) => Self::error(&e),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Turn a caught panic into `{code: -1}` with HTTP 500
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %message, "handler panicked");

    let body = ApiResponse {
        code: CODE_PANIC,
        message: Value::String(message),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
