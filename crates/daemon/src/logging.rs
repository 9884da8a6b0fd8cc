// SPDX-License-Identifier: MIT

//! `tracing` subscriber installation (SPEC_FULL §4 "Structured logging"):
//! `EnvFilter` from the resolved log level, plus a non-blocking file
//! appender when a log directory is configured, mirroring the teacher's
//! daemon logging setup.

use crate::config::Config;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global `tracing` subscriber. Returns the file appender's
/// worker guard (if file logging is enabled); the caller must hold onto it
/// for the process lifetime, or buffered log lines are lost on exit.
pub fn init(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "master.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true))
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false).with_target(true));
            subscriber.init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(fmt::layer().with_target(true)).init();
            None
        }
    }
}
