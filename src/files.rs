//! 文件读取与上传处理器。

use axum::body::Body as AxumBody;
use axum::extract::rejection::PathRejection;
use axum::extract::{Extension, Path};
use axum::http::{Method, Request, header};
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, info};

use crate::error::ApiError;
use crate::locking::KeyLocks;
use crate::storage::{Storage, StorageError};

#[derive(Debug)]
pub struct UploadConfig {
    pub max_size: u64,
}

/// A validated key together with the file it resolves to.
struct KeyTarget {
    key: String,
    file: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct UploadResponse {
    path: String,
}

/// 按请求方法分派到读取或写入流程。
pub async fn handle_key(
    key: Result<Path<String>, PathRejection>,
    Extension(storage): Extension<Arc<Storage>>,
    Extension(upload): Extension<Arc<UploadConfig>>,
    Extension(locks): Extension<Arc<KeyLocks>>,
    req: Request<AxumBody>,
) -> Result<Response, ApiError> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    // The route only matches one raw segment; the decoded key is checked again.
    let Ok(Path(key)) = key else {
        info!(path, "invalid path");
        return Err(ApiError::NotFound(path));
    };
    let file = match storage.resolve_key(&key).await {
        Ok(file) => file,
        Err(StorageError::InvalidPath) => {
            info!(path, "invalid path");
            return Err(ApiError::NotFound(path));
        }
        Err(err) => {
            error!(path, error = %err, "failed to resolve the file");
            return Err(ApiError::from_storage(err, &path));
        }
    };

    let target = KeyTarget { key, file };
    match method {
        Method::GET | Method::HEAD => serve_file(&path, &storage, &target, req).await,
        Method::POST | Method::PUT => {
            upload_file(path, &storage, &upload, &locks, target, req).await
        }
        _ => {
            info!(path, %method, "method not allowed");
            Err(ApiError::MethodNotAllowed(method))
        }
    }
}

/// 读取流程：交给 `ServeFile`，由其处理 MIME、Last-Modified 与缺失文件。
async fn serve_file(
    path: &str,
    storage: &Storage,
    target: &KeyTarget,
    mut req: Request<AxumBody>,
) -> Result<Response, ApiError> {
    if storage.is_dir(&target.file).await {
        info!(path, "requested key is a directory");
        return Err(ApiError::NotFound(path.to_string()));
    }
    // Always serve the whole file.
    req.headers_mut().remove(header::RANGE);
    req.headers_mut().remove(header::IF_RANGE);

    let response = match ServeFile::new(&target.file).oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    info!(path, status = response.status().as_u16(), "file served");
    Ok(response.map(AxumBody::new))
}

/// 写入流程：截断目标文件并写入完整请求体。
async fn upload_file(
    path: String,
    storage: &Storage,
    upload: &UploadConfig,
    locks: &KeyLocks,
    target: KeyTarget,
    req: Request<AxumBody>,
) -> Result<Response, ApiError> {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    if upload.max_size > 0
        && let Some(length) = declared
        && length > upload.max_size
    {
        info!(path, size = length, limit = upload.max_size, "upload too large");
        return Err(ApiError::PayloadTooLarge(upload.max_size));
    }

    let _guard = locks.lock_key(&target.key).await;
    match storage
        .write_stream(&target.file, req.into_body(), upload.max_size)
        .await
    {
        Ok(size) => {
            info!(path, size, "file uploaded");
            Ok(JsonResponse(UploadResponse { path }).into_response())
        }
        Err(StorageError::LimitExceeded(limit)) => {
            info!(path, limit, "upload too large");
            Err(ApiError::PayloadTooLarge(limit))
        }
        Err(err) => {
            error!(path = %target.file.display(), error = %err, "failed to write body to the file");
            Err(ApiError::from_storage(err, &path))
        }
    }
}

/// 未匹配单段 key 规则的路径统一返回 404。
pub async fn not_found(req: Request<AxumBody>) -> ApiError {
    let path = req.uri().path().to_string();
    info!(path, method = %req.method(), "invalid path");
    ApiError::NotFound(path)
}
