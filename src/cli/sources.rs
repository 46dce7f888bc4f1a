//! CLI command for inspecting and validating source lists.

use std::path::PathBuf;

use clap::Args;
use serde_json::json;

use crate::sources::{extract_channel_ref, load_sources};

use super::CliError;

/// Sources subcommand
#[derive(Debug, Args)]
pub struct SourcesCommand {
    #[command(subcommand)]
    action: SourcesAction,
}

/// Sources actions
#[derive(Debug, clap::Subcommand)]
enum SourcesAction {
    /// Parse a source CSV and report how each URL will be resolved
    Validate {
        /// Path to the source CSV
        file: PathBuf,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format for sources command
#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

impl SourcesCommand {
    /// Execute the sources command
    pub async fn execute(&self) -> Result<(), CliError> {
        match &self.action {
            SourcesAction::Validate { file, format } => self.execute_validate(file, format),
        }
    }

    fn execute_validate(&self, file: &PathBuf, format: &OutputFormat) -> Result<(), CliError> {
        let sources = load_sources(file)?;

        let mut results = Vec::new();
        let mut invalid = 0usize;
        for source in &sources {
            match extract_channel_ref(&source.url) {
                Ok(reference) => {
                    results.push(json!({
                        "url": source.url,
                        "reference": reference.to_string(),
                        "metadata": source.metadata,
                        "valid": true,
                    }));
                }
                Err(e) => {
                    invalid += 1;
                    results.push(json!({
                        "url": source.url,
                        "error": e.to_string(),
                        "valid": false,
                    }));
                }
            }
        }

        match format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&results).map_err(|e| {
                        CliError::Configuration(format!("failed to serialize results: {e}"))
                    })?
                );
            }
            OutputFormat::Human => {
                println!("{} sources, {} invalid:\n", sources.len(), invalid);
                for result in &results {
                    if result["valid"].as_bool() == Some(true) {
                        println!(
                            "ok   {} -> {}",
                            result["url"].as_str().unwrap_or(""),
                            result["reference"].as_str().unwrap_or("")
                        );
                    } else {
                        println!(
                            "FAIL {} ({})",
                            result["url"].as_str().unwrap_or(""),
                            result["error"].as_str().unwrap_or("")
                        );
                    }
                }
            }
        }

        if invalid > 0 {
            return Err(CliError::InvalidArgument(format!(
                "{invalid} source URL(s) could not be parsed"
            )));
        }
        Ok(())
    }
}
