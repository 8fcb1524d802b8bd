//! 统一的 API 错误类型：所有错误响应都是 `{"Message": ...}` JSON。

use axum::Json;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::config::ALLOWED_METHODS;
use crate::storage::StorageError;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Unauthorized,
    MethodNotAllowed(Method),
    PayloadTooLarge(u64),
    Internal(String),
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorBody {
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::NotFound(path) => format!("\"{path}\" is not found"),
            ApiError::Unauthorized => "authentication required".into(),
            ApiError::MethodNotAllowed(method) => format!("method \"{method}\" is not allowed"),
            ApiError::PayloadTooLarge(limit) => {
                format!("request body exceeds the upload limit of {limit} bytes")
            }
            ApiError::Internal(msg) => msg.clone(),
        }
    }

    /// 将存储层错误映射为面向客户端的错误；`path` 为原始 URL 路径。
    pub fn from_storage(error: StorageError, path: &str) -> Self {
        match error {
            StorageError::InvalidPath => ApiError::NotFound(path.to_string()),
            StorageError::LimitExceeded(limit) => ApiError::PayloadTooLarge(limit),
            StorageError::Io(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            message: self.message(),
        });
        match self {
            ApiError::MethodNotAllowed(_) => (
                status,
                [(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS))],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
