//! Logging Infrastructure
//!
//! Structured logging setup with optional daily-rolling file output.

use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::config::LoggerConfig;

/// Initialize the global tracing subscriber.
pub fn init(cfg: &LoggerConfig) {
    let filter = EnvFilter::try_new(&cfg.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if let Some(dir) = &cfg.dir {
        if Path::new(dir).exists() {
            let file_appender = tracing_appender::rolling::daily(dir, "delivery-server");
            builder.with_writer(file_appender).with_ansi(false).init();
            return;
        }
    }

    if cfg.format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
