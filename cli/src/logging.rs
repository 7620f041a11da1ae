//! Log output: human-readable records on stdout, every record as JSON in
//! `log.json`, and error records only in `log_errors.json`.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const LOG_FILE: &str = "log.json";
pub const ERROR_LOG_FILE: &str = "log_errors.json";

/// Parse a verbosity given by name (`crit`, `error`, `warn`, `info`,
/// `debug`, `trace`) or by number, 0 (`crit`) through 5 (`trace`).
pub fn parse_verbosity(value: &str) -> Result<LevelFilter, String> {
    let level = match value.trim().to_ascii_lowercase().as_str() {
        "0" | "crit" | "critical" | "1" | "eror" | "error" => LevelFilter::ERROR,
        "2" | "warn" | "warning" => LevelFilter::WARN,
        "3" | "info" => LevelFilter::INFO,
        "4" | "dbug" | "debug" => LevelFilter::DEBUG,
        "5" | "trce" | "trace" => LevelFilter::TRACE,
        other => return Err(format!("unknown verbosity {:?}", other)),
    };
    Ok(level)
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))
}

/// Install the global subscriber. `RUST_LOG` overrides `verbosity`.
pub fn init(verbosity: LevelFilter, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.to_string()));

    let stdout = fmt::layer().with_target(false);
    let json = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(Mutex::new(open_append(&log_dir.join(LOG_FILE))?));
    let errors = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(Mutex::new(open_append(&log_dir.join(ERROR_LOG_FILE))?))
        .with_filter(LevelFilter::ERROR);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(json)
        .with(errors)
        .try_init()
        .context("failed to install log subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verbosity_names() {
        assert_eq!(parse_verbosity("info"), Ok(LevelFilter::INFO));
        assert_eq!(parse_verbosity("DEBUG"), Ok(LevelFilter::DEBUG));
        assert_eq!(parse_verbosity("crit"), Ok(LevelFilter::ERROR));
        assert_eq!(parse_verbosity("trce"), Ok(LevelFilter::TRACE));
    }

    #[test]
    fn test_parse_verbosity_numbers() {
        assert_eq!(parse_verbosity("0"), Ok(LevelFilter::ERROR));
        assert_eq!(parse_verbosity("2"), Ok(LevelFilter::WARN));
        assert_eq!(parse_verbosity("5"), Ok(LevelFilter::TRACE));
        assert!(parse_verbosity("6").is_err());
        assert!(parse_verbosity("loud").is_err());
    }

    #[test]
    fn test_init_creates_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        init(LevelFilter::INFO, &log_dir).unwrap();
        tracing::error!(height = 7, "test failure");

        assert!(log_dir.join(LOG_FILE).exists());
        let errors = std::fs::read_to_string(log_dir.join(ERROR_LOG_FILE)).unwrap();
        let record: serde_json::Value = serde_json::from_str(errors.lines().next().unwrap()).unwrap();
        assert_eq!(record["level"], "ERROR");
        assert_eq!(record["fields"]["height"], 7);
    }
}
