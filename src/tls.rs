//! 可选的 TLS 证书加载。

use axum_server::tls_rustls::RustlsConfig;
use std::io;

use crate::config::Args;

/// 同时给出证书与私钥时构建 Rustls 配置；两者都缺省时返回 `None`，使用明文 HTTP。
pub async fn build_rustls_config(args: &Args) -> io::Result<Option<RustlsConfig>> {
    match (&args.tls_cert, &args.tls_key) {
        (Some(cert), Some(key)) => RustlsConfig::from_pem_file(cert, key).await.map(Some),
        (None, None) => Ok(None),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "--tls-cert and --tls-key must be given together",
        )),
    }
}
