//! 日志初始化：环境变量优先，其次使用命令行给出的级别。

use tracing::error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DEFAULT_LOG_LEVEL;

/// 初始化 tracing 日志订阅；级别无法解析时回退到默认值。
pub fn init_logging(level: &str) {
    let parsed = level.parse::<LevelFilter>();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match &parsed {
        Ok(filter) => EnvFilter::default().add_directive((*filter).into()),
        Err(_) => EnvFilter::new(DEFAULT_LOG_LEVEL),
    });
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(err) = parsed {
        error!(level, error = %err, "failed to parse logging level, so set to default");
    }
}
