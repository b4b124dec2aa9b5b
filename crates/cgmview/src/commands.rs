use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use cgmview_core::{
    format_stat, notes, write_csv, ChartSeries, FilterControls, GlucoseBand, GlucoseRecord,
    GlucoseSummary, IngestionError, Pipeline, ReferenceBands, SegmentedDataset, SessionSpan, View,
    ViewRequest,
};
use cgmview_logging::{LogEvent, Logger};

use crate::chart;

const TABLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List detected sensor sessions
    Sessions {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show average, max and min glucose
    Summary {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List readings, coloured against the normal range
    Readings {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List readings that carry a note
    Notes {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Plot glucose over time with the reference bands
    Chart {
        #[command(flatten)]
        filter: FilterArgs,

        /// Chart width in columns
        #[arg(long, default_value_t = 72)]
        width: usize,

        /// Chart height in rows
        #[arg(long, default_value_t = 16)]
        height: usize,

        /// Output the chart series as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the filtered readings as CSV
    Export {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serve the HTTP API
    Serve {
        /// Bind address (default: `[server].host` from config, else 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port (default: `[server].port` from config, else 8501)
        #[arg(long)]
        port: Option<u16>,
    },
}

/// Filter controls shared by every view command.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Sensor session to show (launches interactive picker if omitted)
    #[arg(short, long)]
    pub session: Option<u32>,

    /// Show readings on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Show readings on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Lowest glucose to show, mmol/L
    #[arg(long)]
    pub min: Option<f64>,

    /// Highest glucose to show, mmol/L
    #[arg(long)]
    pub max: Option<f64>,

    /// Only readings whose note contains this text (case-insensitive)
    #[arg(short, long)]
    pub keyword: Option<String>,
}

impl From<&FilterArgs> for FilterControls {
    fn from(args: &FilterArgs) -> Self {
        FilterControls {
            session: args.session,
            from: args.from.clone(),
            to: args.to.clone(),
            min: args.min,
            max: args.max,
            keyword: args.keyword.clone(),
        }
    }
}

/// What every command needs: the pipeline, the event logger and the input.
pub struct CommandContext {
    pub pipeline: Pipeline,
    pub logger: Logger,
    pub input: Option<PathBuf>,
}

impl CommandContext {
    /// Load and segment the input file, reporting what was found.
    pub fn load_dataset(&self) -> Result<SegmentedDataset> {
        let path = self.input.as_deref().ok_or(IngestionError::NoInput)?;
        load_dataset(&self.pipeline, &self.logger, path)
    }

    fn view(&self, dataset: &SegmentedDataset, filter: &FilterArgs, interactive: bool) -> Result<View> {
        let controls = FilterControls::from(filter);
        let spec = controls.to_spec()?;

        let session = match controls.session {
            Some(id) => Some(id),
            None if interactive => pick_session(dataset)?,
            None => None,
        };

        let view = self.pipeline.run(
            dataset,
            &ViewRequest {
                session,
                filter: spec,
            },
        );

        if let Some(fallback) = view.selection_fallback {
            self.logger.log(&LogEvent::SelectionFallback {
                requested: fallback.requested,
                used: fallback.used,
            });
        }
        self.logger.log(&LogEvent::FilterApplied {
            session: view.session,
            matched: view.records.len(),
            total: dataset.records.len(),
        });

        Ok(view)
    }
}

pub fn load_dataset(pipeline: &Pipeline, logger: &Logger, path: &Path) -> Result<SegmentedDataset> {
    let dataset = pipeline
        .load(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    for warning in &dataset.warnings {
        tracing::debug!(
            row = warning.row,
            column = %warning.column,
            value = %warning.value,
            "Unparseable cell treated as missing"
        );
    }

    logger.log(&LogEvent::DatasetLoaded {
        source: path.display().to_string(),
        rows: dataset.records.len(),
        columns: dataset.columns.len(),
        warnings: dataset.warnings.len(),
    });
    logger.log(&LogEvent::SessionsDetected {
        count: dataset.session_ids.len(),
    });

    Ok(dataset)
}

pub fn handle_command(command: Command, ctx: &CommandContext) -> Result<()> {
    let dataset = ctx.load_dataset()?;

    match command {
        Command::Sessions { json } => {
            let spans = dataset.spans();
            if json {
                println!("{}", serde_json::to_string_pretty(&spans)?);
            } else if spans.is_empty() {
                println!("{}", "No sessions found.".dimmed());
            } else {
                print_sessions_table(&spans);
            }
        }
        Command::Summary { filter, json } => {
            let view = ctx.view(&dataset, &filter, !json)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view.summary)?);
            } else {
                print_summary(view.session, &view.summary);
            }
        }
        Command::Readings { filter, json } => {
            let view = ctx.view(&dataset, &filter, !json)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view.records)?);
            } else if view.records.is_empty() {
                println!("{}", "No readings match.".dimmed());
            } else {
                print_readings_table(&view.records);
            }
        }
        Command::Notes { filter, json } => {
            let view = ctx.view(&dataset, &filter, !json)?;
            let annotated = notes(&view.records);
            if json {
                println!("{}", serde_json::to_string_pretty(&annotated)?);
            } else if annotated.is_empty() {
                println!("{}", "No notes.".dimmed());
            } else {
                print_readings_table(&annotated);
            }
        }
        Command::Chart {
            filter,
            width,
            height,
            json,
        } => {
            let view = ctx.view(&dataset, &filter, !json)?;
            let series = ChartSeries::from_records(&view.records);
            if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                for line in chart::render(&series, width, height) {
                    println!("{}", line);
                }
            }
        }
        Command::Export { filter, output } => {
            let interactive = output.is_some();
            let view = ctx.view(&dataset, &filter, interactive)?;
            let destination = match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    write_csv(&dataset.columns, &view.records, file)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    path.display().to_string()
                }
                None => {
                    write_csv(&dataset.columns, &view.records, std::io::stdout().lock())
                        .context("Failed to write CSV to stdout")?;
                    "stdout".to_string()
                }
            };
            ctx.logger.log(&LogEvent::ExportWritten {
                destination,
                rows: view.records.len(),
            });
        }
        Command::Serve { .. } => unreachable!("serve is dispatched in main"),
    }

    Ok(())
}

/// Interactive session picker, used when no `--session` is given.
///
/// Only prompts when there is a real choice and a terminal to ask on;
/// otherwise the pipeline picks the first session.
fn pick_session(dataset: &SegmentedDataset) -> Result<Option<u32>> {
    if dataset.session_ids.len() < 2
        || !std::io::stdin().is_terminal()
        || !std::io::stderr().is_terminal()
    {
        return Ok(None);
    }

    let spans = dataset.spans();
    let items: Vec<String> = spans.iter().map(session_label).collect();

    let selection = dialoguer::FuzzySelect::new()
        .with_prompt("Select a sensor session")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(Some(spans[selection].id))
}

fn session_label(span: &SessionSpan) -> String {
    format!(
        "Session {:<3} | {} → {} | {} readings",
        span.id,
        format_timestamp(span.start),
        format_timestamp(span.end),
        span.readings
    )
}

fn format_timestamp(ts: Option<chrono::NaiveDateTime>) -> String {
    ts.map(|t| t.format(TABLE_TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn print_sessions_table(spans: &[SessionSpan]) {
    println!(
        "{:<8} {:<18} {:<18} {}",
        "SESSION".dimmed(),
        "START".dimmed(),
        "END".dimmed(),
        "READINGS".dimmed(),
    );

    for span in spans {
        println!(
            "{:<8} {:<18} {:<18} {}",
            span.id,
            format_timestamp(span.start),
            format_timestamp(span.end),
            span.readings
        );
    }
}

fn print_summary(session: Option<u32>, summary: &GlucoseSummary) {
    let bands = ReferenceBands::clinical();
    let title = match session {
        Some(id) => format!("=== Summary Statistics (session {}) ===", id),
        None => "=== Summary Statistics ===".to_string(),
    };

    println!("{}", title.bright_blue().bold());
    println!("{}  {}", "Average Glucose:".dimmed(), format_stat(summary.average));
    println!("{}  {}", "Max Glucose:".dimmed(), format_stat(summary.max));
    println!("{}  {}", "Min Glucose:".dimmed(), format_stat(summary.min));
    println!("{}  {}", "Readings:".dimmed(), summary.readings);
    println!(
        "{}  {:.1}–{:.1} mmol/L",
        "Normal Range:".dimmed(),
        bands.lower,
        bands.upper
    );
}

fn print_readings_table(records: &[GlucoseRecord]) {
    println!(
        "{:<18} {:<8} {:<9} {}",
        "TIMESTAMP".dimmed(),
        "GLUCOSE".dimmed(),
        "RANGE".dimmed(),
        "NOTE".dimmed(),
    );

    for record in records {
        let (glucose, band) = match record.glucose_mmol_l {
            Some(value) => (format!("{:.1}", value), band_label(GlucoseBand::classify(value))),
            None => ("-".to_string(), "-".dimmed().to_string()),
        };

        println!(
            "{:<18} {:<8} {:<9} {}",
            format_timestamp(record.timestamp),
            glucose,
            band,
            record.note.as_deref().unwrap_or("")
        );
    }
}

fn band_label(band: GlucoseBand) -> String {
    match band {
        GlucoseBand::Low => "low".bright_red().to_string(),
        GlucoseBand::InRange => "normal".bright_green().to_string(),
        GlucoseBand::High => "high".bright_yellow().to_string(),
    }
}
