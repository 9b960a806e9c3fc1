//! Command-line interface for the botlog binary

use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{self, Config};
use crate::error_codes::{CodeEntry, ErrorCodes};
use crate::logging::{self, LogLocation, LogRecord, Logger, RetentionPolicy, DEBUG};

#[derive(Parser, Debug)]
#[command(name = "botlog")]
#[command(about = "Robot diagnostic logging pipeline")]
pub struct Cli {
    #[arg(long, global = true, help = "Config file path (default: ~/.botlog/config.toml)")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log each line of stdin through the pipeline into a new log file
    Pipe {
        #[arg(long, default_value_t = DEBUG, help = "Level for every line")]
        level: i32,

        #[arg(
            long,
            default_value = "0",
            allow_hyphen_values = true,
            help = "Numeric error code or code name"
        )]
        code: String,

        #[arg(long, default_value = "", help = "Originator tag for every line")]
        originator: String,
    },

    /// Decode a file of parseable records
    Parse {
        #[arg(help = "Log file to decode")]
        file: PathBuf,

        #[arg(long, help = "Print records as JSON")]
        json: bool,
    },

    /// List the registered error codes
    Codes,

    /// Delete old log files
    Cleanup {
        #[arg(long, help = "Retention in days (default: from config)")]
        days: Option<u64>,
    },
}

impl Cli {
    pub fn from_cli() -> Self {
        <Self as Parser>::parse()
    }
}

/// Run the selected command
pub fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Pipe {
            level,
            code,
            originator,
        } => {
            config::ensure_directories(&config)?;
            let logs_dir = config.logs_dir();
            let (info, file) = logging::open_log_file(&logs_dir)?;
            tracing::info!("Logging to: {}", info.path.display());

            let policy = RetentionPolicy::from_config(&config).keep(info.path.clone());
            if let Ok(removed) = logging::cleanup_old_logs(&logs_dir, &policy) {
                if !removed.is_empty() {
                    tracing::info!("Cleaned up {} old log files", removed.len());
                }
            }

            let logger = Logger::new(config)?;
            logger.add_listener(&file);
            let stdin = io::stdin();
            let count = pipe_lines(&logger, stdin.lock(), level, &code, &originator)?;
            logger.shutdown();
            tracing::info!("Logged {} lines", count);
        }
        Command::Parse { file, json } => {
            let records = read_records(&file)?;
            print!("{}", render_records(&records, json)?);
        }
        Command::Codes => {
            print!("{}", render_codes(&ErrorCodes::global().entries()));
        }
        Command::Cleanup { days } => {
            let policy = match days {
                Some(days) => RetentionPolicy::days(days),
                None => RetentionPolicy::from_config(&config),
            };
            let removed = logging::cleanup_old_logs(&config.logs_dir(), &policy)?;
            for path in &removed {
                println!("Deleted {}", path.display());
            }
            println!("Deleted {} log files", removed.len());
        }
    }
    Ok(())
}

/// Log every line from `reader`; the location records the input line number
pub fn pipe_lines<R: BufRead>(
    logger: &Logger,
    reader: R,
    level: i32,
    code: &str,
    originator: &str,
) -> Result<usize> {
    let mut count = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input line")?;
        let location = LogLocation::new("stdin", "pipe", (index + 1) as u32);
        logger.log(level, code, &line, location, originator);
        count += 1;
    }
    Ok(count)
}

/// Read and decode a log file
pub fn read_records(path: &Path) -> Result<Vec<LogRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    logging::parse_records(&text).context("Failed to parse log file")
}

pub fn render_records(records: &[LogRecord], json: bool) -> Result<String> {
    if json {
        let mut out =
            serde_json::to_string_pretty(records).context("Failed to serialize records")?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    for r in records {
        let originator = if r.originator.is_empty() {
            String::new()
        } else {
            format!(" ({})", r.originator)
        };
        out.push_str(&format!(
            "{:>8}ms [{}] {} {}{}: {}\n",
            r.timestamp_ms, r.level_name, r.code, r.location, originator, r.details
        ));
    }
    Ok(out)
}

pub fn render_codes(entries: &[CodeEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            format!(
                "{:>5}  {:<32} {}\n",
                e.code,
                e.name.as_deref().unwrap_or("-"),
                e.message
            )
        })
        .collect()
}
