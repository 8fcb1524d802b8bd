//! HTTP 辅助工具：挂载前缀与安全响应头。

use axum::body::Body as AxumBody;
use axum::http::{HeaderValue, Request, header};
use axum::{middleware, response::Response};
use std::io;

/// Fixed URL prefix under which keys are served, e.g. `/files`.
#[derive(Clone, Debug)]
pub struct Mount {
    prefix: String,
}

impl Mount {
    /// 规范化前缀：补齐开头的 `/`，去掉结尾的 `/`。
    pub fn new(raw: &str) -> io::Result<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.contains(['{', '}', '*']) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid mount prefix {raw:?}"),
            ));
        }
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Route rule matching exactly one non-empty segment after the prefix.
    pub fn key_route(&self) -> String {
        format!("{}/{{key}}", self.prefix)
    }

    /// 判断请求路径是否落在挂载点下（含挂载点本身）。
    pub fn covers(&self, path: &str) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(&self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// 为上传内容添加基础安全响应头，避免浏览器嗅探类型。
pub async fn add_security_headers(request: Request<AxumBody>, next: middleware::Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers
        .entry(header::X_CONTENT_TYPE_OPTIONS)
        .or_insert(HeaderValue::from_static("nosniff"));
    headers
        .entry(header::X_FRAME_OPTIONS)
        .or_insert(HeaderValue::from_static("DENY"));
    response
}

#[cfg(test)]
mod tests {
    use super::Mount;

    #[test]
    fn prefix_is_normalized() {
        assert_eq!(Mount::new("files").unwrap().prefix(), "/files");
        assert_eq!(Mount::new("/snaps/").unwrap().prefix(), "/snaps");
        assert_eq!(Mount::new("/").unwrap().prefix(), "");
        assert_eq!(Mount::new("/files").unwrap().key_route(), "/files/{key}");
    }

    #[test]
    fn prefix_rejects_route_syntax() {
        assert!(Mount::new("/files/{id}").is_err());
        assert!(Mount::new("/files/*rest").is_err());
    }

    #[test]
    fn covers_only_mounted_paths() {
        let mount = Mount::new("/files").unwrap();
        assert!(mount.covers("/files"));
        assert!(mount.covers("/files/"));
        assert!(mount.covers("/files/a/b"));
        assert!(!mount.covers("/filesystem"));
        assert!(!mount.covers("/other"));
    }
}
