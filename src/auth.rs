//! 共享 token 认证：查询参数优先，其次是表单参数。

use axum::body::{Body as AxumBody, Bytes};
use axum::extract::{Extension, Form, FromRequest, Query};
use axum::http::{HeaderMap, Method, Request, header};
use axum::{middleware, response::Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MAX_FORM_BODY_SIZE;
use crate::error::ApiError;
use crate::http::Mount;

/// Shared secret consulted on every request under the mount prefix.
///
/// `None` is the open variant: no request is ever rejected for auth.
#[derive(Debug, Default)]
pub struct TokenAuth {
    secret: Option<String>,
}

impl TokenAuth {
    pub fn open() -> Self {
        Self { secret: None }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
        }
    }

    /// 根据启动参数决定 token：显式给出则使用，否则在受保护模式下随机生成。
    pub fn from_args(token: Option<String>, protected: bool) -> io::Result<Self> {
        match token {
            Some(token) if token.is_empty() => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "token must not be empty",
            )),
            Some(token) => Ok(Self::with_secret(token)),
            None if protected => {
                let token = Uuid::new_v4().simple().to_string();
                warn!(token, "token generated");
                Ok(Self::with_secret(token))
            }
            None => Ok(Self::open()),
        }
    }

    pub fn is_protected(&self) -> bool {
        self.secret.is_some()
    }

    fn accepts(&self, supplied: Option<&str>) -> bool {
        match self.secret.as_deref() {
            Some(secret) => supplied == Some(secret),
            None => true,
        }
    }
}

#[derive(Deserialize)]
struct TokenParams {
    token: Option<String>,
}

/// 认证中间件：挂载点外的路径直接放行，交由路由返回 404。
pub async fn token_middleware(
    Extension(auth): Extension<Arc<TokenAuth>>,
    Extension(mount): Extension<Arc<Mount>>,
    req: Request<AxumBody>,
    next: middleware::Next,
) -> Result<Response, ApiError> {
    if !auth.is_protected() || !mount.covers(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let (token, req) = extract_token(req).await;
    if !auth.accepts(token.as_deref()) {
        info!(path = req.uri().path(), "authentication required");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}

/// Pulls the token from the query string, falling back to a form body.
///
/// A buffered form body is reattached so the write path still sees it. A body
/// that cannot be buffered yields no token; the request is rejected anyway.
async fn extract_token(req: Request<AxumBody>) -> (Option<String>, Request<AxumBody>) {
    let from_query = Query::<TokenParams>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(params)| params.token)
        .filter(|token| !token.is_empty());
    if from_query.is_some() || !carries_form(req.method(), req.headers()) {
        return (from_query, req);
    }

    let (parts, body) = req.into_parts();
    let Some(bytes) = buffer_form_body(body).await else {
        return (None, Request::from_parts(parts, AxumBody::empty()));
    };
    let token = token_from_form(bytes.clone()).await;
    (token, Request::from_parts(parts, AxumBody::from(bytes)))
}

fn carries_form(method: &Method, headers: &HeaderMap) -> bool {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return false;
    }
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

async fn buffer_form_body(body: AxumBody) -> Option<Bytes> {
    match Limited::new(body, MAX_FORM_BODY_SIZE).collect().await {
        Ok(collected) => Some(collected.to_bytes()),
        Err(err) if err.is::<LengthLimitError>() => {
            debug!(limit = MAX_FORM_BODY_SIZE, "form body too large to carry a token");
            None
        }
        Err(err) => {
            debug!(error = %err, "failed to read form body");
            None
        }
    }
}

async fn token_from_form(bytes: Bytes) -> Option<String> {
    let form = Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(AxumBody::from(bytes))
        .ok()?;
    Form::<TokenParams>::from_request(form, &())
        .await
        .ok()
        .and_then(|Form(params)| params.token)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_request(uri: &str, body: &'static str) -> Request<AxumBody> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(AxumBody::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn query_token_wins_over_form() {
        let req = form_request("/files/a?token=query", "token=form");
        let (token, _) = extract_token(req).await;
        assert_eq!(token.as_deref(), Some("query"));
    }

    #[tokio::test]
    async fn empty_query_token_falls_back_to_form() {
        let req = form_request("/files/a?token=", "token=form&x=1");
        let (token, req) = extract_token(req).await;
        assert_eq!(token.as_deref(), Some("form"));

        let body = req
            .into_body()
            .collect()
            .await
            .expect("collect")
            .to_bytes();
        assert_eq!(&body[..], b"token=form&x=1");
    }

    #[tokio::test]
    async fn non_form_body_is_not_consumed() {
        let req = Request::builder()
            .method(Method::PUT)
            .uri("/files/a")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(AxumBody::from("token=form"))
            .expect("request");
        let (token, _) = extract_token(req).await;
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn oversized_form_body_carries_no_token() {
        let body = format!("token=secret&{}", "x".repeat(MAX_FORM_BODY_SIZE));
        let req = Request::builder()
            .method(Method::PUT)
            .uri("/files/a")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(AxumBody::from(body))
            .expect("request");
        let (token, _) = extract_token(req).await;
        assert!(token.is_none());
    }

    #[test]
    fn secret_comparison_is_exact() {
        let auth = TokenAuth::with_secret("secret");
        assert!(auth.accepts(Some("secret")));
        assert!(!auth.accepts(Some("Secret")));
        assert!(!auth.accepts(Some("")));
        assert!(!auth.accepts(None));
        assert!(TokenAuth::open().accepts(None));
    }

    #[test]
    fn from_args_selects_variant() {
        assert!(!TokenAuth::from_args(None, false).unwrap().is_protected());
        assert!(TokenAuth::from_args(None, true).unwrap().is_protected());
        let auth = TokenAuth::from_args(Some("abc".into()), false).unwrap();
        assert!(auth.accepts(Some("abc")));
        assert!(TokenAuth::from_args(Some(String::new()), true).is_err());
    }
}
