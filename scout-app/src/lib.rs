//! Shared launch logic for the `scout`, `job-alerts` and `company-leads`
//! binaries.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use scout_common::observability::{init_logging, LogConfig, LogFormat};
use scout_common::{RecordKind, ScoutError};
use scout_config::{ScoutConfig, ScoutConfigLoader};
use scout_notify::SmtpTransport;
use scout_pipeline::{Pipeline, RunReport};

pub const CONFIG_ENV: &str = "SCOUT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "scout.yaml";

/// Exit status for a failed run: 2 for configuration problems, 1 otherwise.
pub fn exit_code(err: &ScoutError) -> u8 {
    match err {
        ScoutError::Config(_) => 2,
        _ => 1,
    }
}

/// Where to read configuration from when no path was given explicitly.
pub fn default_config_path() -> PathBuf {
    std::env::var(CONFIG_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// An explicit path must exist; the default one may be absent, in which case
/// settings come from the environment alone.
pub fn load_config(explicit: Option<&Path>) -> Result<ScoutConfig, ScoutError> {
    let loader = match explicit {
        Some(path) => ScoutConfigLoader::new().with_file(path),
        None => ScoutConfigLoader::new().with_optional_file(default_config_path()),
    };
    Ok(loader.load()?)
}

/// Options shared by every entry point.
#[derive(Debug, Clone, Default)]
pub struct Launch {
    pub config: Option<PathBuf>,
    pub json_logs: bool,
}

impl Launch {
    /// Load config, set up logging and run `kinds` in order. Every kind runs
    /// even if an earlier one fails; the exit code reflects the first failure.
    pub async fn run(self, app_name: &'static str, kinds: &[RecordKind]) -> Result<ExitCode> {
        let mut log = LogConfig::for_cli(app_name);
        if self.json_logs {
            log.format = LogFormat::Json;
        }

        let config = match load_config(self.config.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                let _ = init_logging(log);
                tracing::error!(error=%e, "app.config.failed");
                eprintln!("{e}");
                return Ok(ExitCode::from(exit_code(&e)));
            }
        };
        if let Some(log_path) = start_logging(app_name, log) {
            tracing::info!(app = app_name, log=%log_path.display(), "app.start");
        }

        let mut status = 0u8;
        for &kind in kinds {
            match run_once(kind, &config).await {
                Ok(report) => log_report(&report),
                Err(e) => {
                    tracing::error!(kind=%kind, error=%e, "app.run.failed");
                    eprintln!("{kind}: {e}");
                    if status == 0 {
                        status = exit_code(&e);
                    }
                }
            }
        }
        Ok(ExitCode::from(status))
    }
}

/// Logging problems never change the exit code; they are reported on stderr.
fn start_logging(app_name: &str, log: LogConfig) -> Option<PathBuf> {
    match init_logging(log) {
        Ok(path) => Some(path),
        Err(e) => {
            eprintln!("{app_name}: logging disabled: {e:#}");
            None
        }
    }
}

async fn run_once(kind: RecordKind, config: &ScoutConfig) -> Result<RunReport, ScoutError> {
    let pipeline = Pipeline::new(kind, config);
    let client = pipeline.http_client()?;
    pipeline.run(&client, &SmtpTransport::new()).await
}

fn log_report(report: &RunReport) {
    match serde_json::to_string(report) {
        Ok(json) => tracing::info!(report=%json, "app.run.report"),
        Err(e) => tracing::warn!(error=%e, "app.run.report_unserializable"),
    }
    if let Some(err) = &report.notify_error {
        eprintln!("{}: notification not delivered: {err}", report.kind);
    }
}
