//! Run an import into a local directory

use anyhow::Context;
use bulkimport::action::{
    decode_parameters, PARAM_IMPORT_SOURCE_NAME, PARAM_PARAMETERS, PARAM_TARGET,
};
use bulkimport::{
    BulkImportAction, ImportOrchestrator, ImportRun, OrchestratorSettings, SourceRegistry,
};
use bulkimport_types::{RunStatus, RunSummary, SourceConfig};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::repository::LocalDirectoryWriter;

/// Import content into a local directory acting as the repository
#[derive(Args)]
pub struct ImportCommand {
    /// Existing directory the items are written into
    #[arg(long, short = 't')]
    pub target: PathBuf,

    /// Import source name (default: filesystem)
    #[arg(long, short = 's', default_value = "")]
    pub source: String,

    /// Source parameters as a JSON object, e.g. '{"source-directory": "/data/docs"}'
    #[arg(long)]
    pub parameters: Option<String>,

    /// Single source parameter; may be repeated
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// JSON file with orchestrator settings; flags override its values
    #[arg(long, env = "BULKIMPORT_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Maximum number of writes in flight
    #[arg(long, env = "BULKIMPORT_PARALLELISM")]
    pub parallelism: Option<usize>,

    /// Total write attempts per item
    #[arg(long, env = "BULKIMPORT_MAX_ATTEMPTS")]
    pub max_attempts: Option<u32>,

    /// Delay before the first retry (milliseconds)
    #[arg(long, env = "BULKIMPORT_RETRY_BASE_DELAY_MS")]
    pub retry_base_delay_ms: Option<u64>,

    /// Upper bound for a retry delay (milliseconds)
    #[arg(long, env = "BULKIMPORT_RETRY_MAX_DELAY_MS")]
    pub retry_max_delay_ms: Option<u64>,

    /// Items buffered to reorder versions
    #[arg(long, env = "BULKIMPORT_LOOKAHEAD")]
    pub lookahead: Option<usize>,

    /// Identities remembered to reject late versions
    #[arg(long, env = "BULKIMPORT_VERSION_HORIZON")]
    pub version_horizon: Option<usize>,

    /// Enumerate and count items without writing them
    #[arg(long, env = "BULKIMPORT_DRY_RUN")]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

impl ImportCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let settings = self.resolve_settings()?;
        debug!("Orchestrator settings: {:?}", settings);

        let orchestrator = Arc::new(ImportOrchestrator::new(
            Arc::new(SourceRegistry::with_defaults()),
            Arc::new(LocalDirectoryWriter::new()),
            settings,
        ));
        let action = BulkImportAction::new(orchestrator);

        let run = action
            .execute(&self.action_parameters()?)
            .context("Invalid import request")?;
        let status = watch_run(&run, !self.json).await;
        let summary = run.summary();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }

        match status {
            RunStatus::Completed => Ok(()),
            status => anyhow::bail!("import run {} finished as {}", summary.run_id, status),
        }
    }

    /// Settings file first, then flags and environment on top
    fn resolve_settings(&self) -> anyhow::Result<OrchestratorSettings> {
        let mut settings = match &self.settings {
            Some(path) => load_settings(path)?,
            None => OrchestratorSettings::default(),
        };

        if let Some(parallelism) = self.parallelism {
            settings.parallelism = parallelism;
        }
        if let Some(max_attempts) = self.max_attempts {
            settings.max_attempts = max_attempts;
        }
        if let Some(delay) = self.retry_base_delay_ms {
            settings.retry_base_delay_ms = delay;
        }
        if let Some(delay) = self.retry_max_delay_ms {
            settings.retry_max_delay_ms = delay;
        }
        if let Some(lookahead) = self.lookahead {
            settings.lookahead = lookahead;
        }
        if let Some(horizon) = self.version_horizon {
            settings.version_horizon = horizon;
        }
        if self.dry_run {
            settings.dry_run = true;
        }

        Ok(settings.normalize())
    }

    /// String parameters of the `bulk-import` action
    fn action_parameters(&self) -> anyhow::Result<HashMap<String, String>> {
        let mut config = match &self.parameters {
            Some(json) => decode_parameters(json).context("Invalid --parameters")?,
            None => SourceConfig::new(),
        };
        for (key, value) in &self.params {
            config.push(key.clone(), value.clone());
        }

        let mut parameters = HashMap::new();
        parameters.insert(PARAM_IMPORT_SOURCE_NAME.to_string(), self.source.clone());
        parameters.insert(PARAM_PARAMETERS.to_string(), serde_json::to_string(&config)?);
        parameters.insert(
            PARAM_TARGET.to_string(),
            self.target.display().to_string(),
        );
        Ok(parameters)
    }
}

fn load_settings(path: &Path) -> anyhow::Result<OrchestratorSettings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse settings file {}", path.display()))
}

fn create_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Wait for the run, showing progress and cancelling on Ctrl-C
async fn watch_run(run: &ImportRun, show_progress: bool) -> RunStatus {
    let spinner = if show_progress {
        create_spinner()
    } else {
        ProgressBar::hidden()
    };
    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut cancelling = false;

    let status = loop {
        tokio::select! {
            status = run.wait() => break status,
            _ = tokio::signal::ctrl_c(), if !cancelling => {
                warn!("Interrupted, cancelling import run {}", run.id());
                cancelling = true;
                run.cancel();
            }
            _ = ticker.tick() => {
                let progress = run.progress_snapshot();
                spinner.set_message(format!(
                    "{}{} enumerated, {} processed, {} failed, {} in flight",
                    if cancelling { "cancelling: " } else { "" },
                    progress.items_enumerated,
                    progress.items_processed,
                    progress.items_failed,
                    progress.items_in_flight
                ));
            }
        }
    };

    spinner.finish_and_clear();
    status
}

fn print_summary(summary: &RunSummary) {
    let status = match summary.status {
        RunStatus::Completed => summary.status.as_str().bright_green(),
        RunStatus::CompletedWithErrors => summary.status.as_str().bright_yellow(),
        _ => summary.status.as_str().bright_red(),
    };

    println!();
    println!(
        "{} {} {}",
        "Import run".bright_white().bold(),
        summary.run_id.to_string().bright_cyan(),
        status.bold()
    );
    println!("  {:<12} {}", "Source:", summary.source);
    println!("  {:<12} {}", "Target:", summary.target);
    if summary.dry_run {
        println!("  {:<12} {}", "Mode:", "dry run".bright_yellow());
    }
    println!(
        "  {:<12} {} items, {} bytes in {:.1}s",
        "Processed:",
        summary.progress.items_processed,
        summary.progress.bytes_processed,
        summary.duration_seconds
    );
    if let Some(reason) = &summary.abort_reason {
        println!("  {:<12} {}", "Aborted:", reason.bright_red());
    }

    if !summary.failures.is_empty() {
        println!();
        println!(
            "{} {}",
            "Failures:".bright_red().bold(),
            summary.failures.len()
        );
        for failure in &summary.failures {
            println!(
                "  {} {} {}",
                "✗".bright_red(),
                failure.item.bright_white(),
                format!("[{}] {}", failure.kind, failure.message).dimmed()
            );
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        import: ImportCommand,
    }

    fn parse(args: &[&str]) -> ImportCommand {
        TestCli::parse_from(std::iter::once("bulkimport").chain(args.iter().copied())).import
    }

    #[test]
    fn test_flags_override_settings_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let file = temp_dir.path().join("settings.json");
        std::fs::write(&file, r#"{"parallelism": 16, "lookahead": 0}"#).unwrap();

        let command = parse(&[
            "--target",
            "/repo",
            "--settings",
            file.to_str().unwrap(),
            "--max-attempts",
            "5",
        ]);
        let settings = command.resolve_settings().unwrap();

        assert_eq!(settings.parallelism, 16);
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.lookahead, 1);
        assert!(!settings.dry_run);
    }

    #[test]
    fn test_action_parameters_merge_json_and_flags() {
        let command = parse(&[
            "--target",
            "/repo",
            "--parameters",
            r#"{"source-directory": "/data/docs"}"#,
            "--param",
            "version-scheme=suffix",
        ]);
        let parameters = command.action_parameters().unwrap();

        assert_eq!(parameters[PARAM_IMPORT_SOURCE_NAME], "");
        assert_eq!(parameters[PARAM_TARGET], "/repo");
        let config = decode_parameters(&parameters[PARAM_PARAMETERS]).unwrap();
        assert_eq!(config.required("source-directory").unwrap(), "/data/docs");
        assert_eq!(config.required("version-scheme").unwrap(), "suffix");
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=x").is_err());
    }
}
