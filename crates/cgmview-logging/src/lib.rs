//! # cgmview-logging
//!
//! Logging for the CGM viewer.
//!
//! ## Key Types
//!
//! - [`Logger`] - User-facing pipeline events on stderr
//! - [`LogEvent`] - Event types
//! - [`LogFormat`] - Output formats (Pretty, JSON, Compact)
//!
//! Diagnostics go through `tracing`; [`init_tracing`] installs the
//! subscriber, optionally with a daily rolling JSON file.

mod events;

use std::path::Path;

pub use events::{LogEvent, LogFormat, Logger};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE_PREFIX: &str = "cgmview.log";

/// Initialize tracing for the application.
///
/// `RUST_LOG` overrides `level`. When `log_dir` is set, events are also
/// written there as JSON lines; keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init_tracing(level: &str, format: LogFormat, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    match format {
        LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            registry
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }

    guard
}
