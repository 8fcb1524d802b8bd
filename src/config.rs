//! 命令行参数与服务默认配置。

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_PORT: u16 = 25478;
pub const DEFAULT_PREFIX: &str = "/files";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_UPLOAD_LIMIT: u64 = 0;
/// 表单中携带 token 时允许缓冲的最大请求体。
pub const MAX_FORM_BODY_SIZE: usize = 10 * 1024 * 1024;
pub const ALLOWED_METHODS: &str = "GET,HEAD,POST,PUT";
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(
    name = "simple-upload-server",
    version = VERSION_INFO,
    about = "Minimal HTTP upload/download endpoint"
)]
pub struct Args {
    #[arg(env = "UPLOAD_ROOT", help = "Document root for uploaded files")]
    pub root: String,
    #[arg(
        short = 'b',
        long = "ip",
        env = "UPLOAD_BIND",
        default_value = "0.0.0.0",
        help = "IP address to bind"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "UPLOAD_PORT",
        default_value_t = DEFAULT_PORT,
        help = "Port number to listen on"
    )]
    pub port: u16,
    #[arg(
        long,
        alias = "loglevel",
        env = "UPLOAD_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL,
        help = "Logging level used when RUST_LOG is unset"
    )]
    pub log_level: String,
    #[arg(
        long,
        env = "UPLOAD_PREFIX",
        default_value = DEFAULT_PREFIX,
        help = "Mount prefix for uploaded files"
    )]
    pub prefix: String,
    #[arg(long, env = "UPLOAD_TOKEN", help = "Shared token required on every request")]
    pub token: Option<String>,
    #[arg(
        long,
        env = "UPLOAD_PROTECTED",
        help = "Require a token; one is generated when --token is absent"
    )]
    pub protected: bool,
    #[arg(
        long,
        env = "UPLOAD_LIMIT",
        default_value_t = DEFAULT_UPLOAD_LIMIT,
        help = "Max upload size in bytes (0 to disable)"
    )]
    pub upload_limit: u64,
    #[arg(short = 'c', long, env = "UPLOAD_TLS_CERT", help = "TLS cert path")]
    pub tls_cert: Option<String>,
    #[arg(short = 'k', long, env = "UPLOAD_TLS_KEY", help = "TLS key path")]
    pub tls_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_open_variant() {
        let args = Args::try_parse_from(["simple-upload-server", "/srv/data"]).expect("parse");
        assert_eq!(args.root, "/srv/data");
        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(args.prefix, DEFAULT_PREFIX);
        assert!(args.token.is_none());
        assert!(!args.protected);
        assert_eq!(args.upload_limit, 0);
    }

    #[test]
    fn missing_root_is_rejected() {
        assert!(Args::try_parse_from(["simple-upload-server"]).is_err());
    }

    #[test]
    fn legacy_loglevel_alias_is_accepted() {
        let args = Args::try_parse_from(["simple-upload-server", "--loglevel", "debug", "/tmp"])
            .expect("parse");
        assert_eq!(args.log_level, "debug");
    }
}
