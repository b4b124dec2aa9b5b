use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// User-facing pipeline events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    DatasetLoaded {
        source: String,
        rows: usize,
        columns: usize,
        warnings: usize,
    },
    SessionsDetected {
        count: usize,
    },
    SelectionFallback {
        requested: u32,
        used: Option<u32>,
    },
    FilterApplied {
        session: Option<u32>,
        matched: usize,
        total: usize,
    },
    ExportWritten {
        destination: String,
        rows: usize,
    },
    ServerStarted {
        address: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Writes pipeline events to stderr in the configured format.
pub struct Logger {
    format: LogFormat,
    quiet: bool,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            quiet: false,
        }
    }

    /// Suppress everything except warnings (selection fallbacks).
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn log(&self, event: &LogEvent) {
        if self.quiet && !matches!(event, LogEvent::SelectionFallback { .. }) {
            return;
        }
        let _ = writeln!(std::io::stderr(), "{}", self.render(event));
    }

    /// The line that [`Logger::log`] would print.
    pub fn render(&self, event: &LogEvent) -> String {
        match self.format {
            LogFormat::Json => event.with_timestamp().to_string(),
            LogFormat::Pretty => Self::render_pretty(event),
            LogFormat::Compact => Self::render_compact(event),
        }
    }

    fn render_pretty(event: &LogEvent) -> String {
        match event {
            LogEvent::DatasetLoaded {
                source,
                rows,
                columns,
                warnings,
            } => {
                let mut line = format!(
                    "{} Loaded {} ({} rows, {} columns)",
                    "✓".bright_green(),
                    source.bold(),
                    rows,
                    columns
                );
                if *warnings > 0 {
                    line.push_str(&format!(
                        " {}",
                        format!(
                            "{} unparseable {} treated as missing",
                            warnings,
                            if *warnings == 1 { "cell" } else { "cells" }
                        )
                        .yellow()
                    ));
                }
                line
            }
            LogEvent::SessionsDetected { count } => format!(
                "{} {} sensor {}",
                "◷".bright_blue(),
                count,
                if *count == 1 { "session" } else { "sessions" }
            ),
            LogEvent::SelectionFallback { requested, used } => match used {
                Some(used) => format!(
                    "{} Session {} does not exist, showing session {}",
                    "⚠".bright_yellow(),
                    requested,
                    used
                ),
                None => format!(
                    "{} Session {} does not exist and the dataset has no sessions",
                    "⚠".bright_yellow(),
                    requested
                ),
            },
            LogEvent::FilterApplied {
                session,
                matched,
                total,
            } => {
                let scope = session
                    .map(|s| format!("session {}", s))
                    .unwrap_or_else(|| "no session".to_string());
                format!(
                    "{} {} of {} readings match ({})",
                    "▶".bright_cyan(),
                    matched,
                    total,
                    scope.dimmed()
                )
            }
            LogEvent::ExportWritten { destination, rows } => format!(
                "{} Exported {} rows to {}",
                "✓".bright_green(),
                rows,
                destination.bold()
            ),
            LogEvent::ServerStarted { address } => format!(
                "  {} {}",
                "->".bright_green(),
                format!("Listening on http://{}", address).bold()
            ),
        }
    }

    fn render_compact(event: &LogEvent) -> String {
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        match event {
            LogEvent::DatasetLoaded {
                source,
                rows,
                warnings,
                ..
            } => format!("[{}] load:{} rows={} warn={}", timestamp, source, rows, warnings),
            LogEvent::SessionsDetected { count } => {
                format!("[{}] sessions:{}", timestamp, count)
            }
            LogEvent::SelectionFallback { requested, used } => format!(
                "[{}] session:fallback {}->{}",
                timestamp,
                requested,
                used.map(|u| u.to_string()).unwrap_or_else(|| "none".to_string())
            ),
            LogEvent::FilterApplied {
                session,
                matched,
                total,
            } => format!(
                "[{}] filter:{} {}/{}",
                timestamp,
                session.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()),
                matched,
                total
            ),
            LogEvent::ExportWritten { destination, rows } => {
                format!("[{}] export:{} rows={}", timestamp, destination, rows)
            }
            LogEvent::ServerStarted { address } => {
                format!("[{}] serve:{}", timestamp, address)
            }
        }
    }
}
