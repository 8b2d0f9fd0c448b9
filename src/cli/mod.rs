//! Command-line interface for docsort.
//!
//! Provides commands for watching the download directory, organizing
//! individual files, previewing names and inspecting configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::{LlmMode, LoadOptions, ResolvedConfig};
use crate::core::{FanoutSink, JsonlSink, Orchestrator, Organizer, ResultSink, TracingSink};
use crate::domain::{ErrorKind, FileEvent, ProcessingResult, Stage};
use crate::ingest::{DirectoryWatcher, WatcherConfig};

/// docsort - content-based file organizer
#[derive(Parser, Debug)]
#[command(name = "docsort")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: .docsort/config.yaml in this or a parent directory)
    #[arg(long, global = true, env = "DOCSORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Name generator to use
    #[arg(long, global = true, value_enum)]
    pub llm_mode: Option<LlmMode>,

    /// Directory to watch for new files
    #[arg(long, global = true)]
    pub watch_dir: Option<PathBuf>,

    /// Directory organized files are moved into
    #[arg(long, global = true)]
    pub organized_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the download directory and organize new files until interrupted
    Watch,

    /// Organize the given files once
    Process {
        /// Files to organize
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print each result as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Show the name a file would get, without moving it
    Suggest {
        /// File to inspect
        file: PathBuf,
    },

    /// Show resolved configuration
    Config,
}

impl Cli {
    /// Overrides for configuration loading
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            llm_mode: self.llm_mode,
            watch_dir: self.watch_dir.clone(),
            organized_dir: self.organized_dir.clone(),
        }
    }

    /// Execute the CLI command
    pub async fn execute(self, config: ResolvedConfig) -> Result<()> {
        match self.command {
            Commands::Watch => watch(&config).await,
            Commands::Process { files, json } => process_files(&config, files, json).await,
            Commands::Suggest { file } => suggest(&config, file).await,
            Commands::Config => show_config(&config),
        }
    }
}

/// Tracing sink, plus the JSONL results log when configured
async fn build_sink(config: &ResolvedConfig) -> Result<Arc<dyn ResultSink>> {
    let mut sink = FanoutSink::new().with(Arc::new(TracingSink));
    if let Some(path) = &config.processing.results_log {
        let jsonl = JsonlSink::open(path).await?;
        tracing::info!(path = %jsonl.path().display(), "Recording results");
        sink = sink.with(Arc::new(jsonl));
    }
    Ok(Arc::new(sink))
}

/// Run the watcher and organizer until Ctrl-C / SIGTERM
async fn watch(config: &ResolvedConfig) -> Result<()> {
    let cancel = CancellationToken::new();

    let orchestrator = Arc::new(Orchestrator::from_config(config, cancel.clone()));
    tracing::info!(
        organized_dir = %orchestrator.organized_dir().display(),
        namer = orchestrator.namer_name(),
        "Starting organizer"
    );

    let sink = build_sink(config).await?;
    let organizer = Organizer::new(orchestrator, sink, config.processing.max_workers);
    let (events, organizer_task) = organizer.spawn(cancel.clone());

    let watcher = DirectoryWatcher::new(WatcherConfig::from_config(config)?);
    let watch_handle = watcher
        .watch(events, cancel.clone())
        .await
        .with_context(|| format!("Failed to watch {}", config.monitoring.watch_dir.display()))?;

    eprintln!(
        "Watching {} → {} (Ctrl-C to stop)",
        config.monitoring.watch_dir.display(),
        config.monitoring.organized_dir.display()
    );

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, finishing in-flight files");
    cancel.cancel();

    watch_handle.stop().await?;
    let summary = organizer_task.await.context("Organizer task failed")?;

    eprintln!(
        "Stopped. {} organized, {} left in place.",
        summary.succeeded, summary.failed
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Organize each file once, in order
async fn process_files(config: &ResolvedConfig, files: Vec<PathBuf>, json: bool) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config, CancellationToken::new());
    let sink = build_sink(config).await?;

    let mut failed = 0usize;
    let total = files.len();

    for path in files {
        let result = match FileEvent::from_path(&path) {
            Some(event) if config.accepts(event.detected_type) => orchestrator.process(event).await,
            _ => ProcessingResult::failed(
                uuid::Uuid::new_v4(),
                path.clone(),
                Stage::Received,
                ErrorKind::ExtractionFailed,
                format!("Unsupported file type: {}", path.display()),
            ),
        };
        sink.record(&result).await;

        if json {
            println!("{}", serde_json::to_string(&result)?);
        } else {
            print_result(&result);
        }

        if !result.success {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files could not be organized", failed, total);
    }
    Ok(())
}

fn print_result(result: &ProcessingResult) {
    match (&result.new_path, &result.error) {
        (Some(new_path), _) => {
            println!("{} → {}", result.original_path.display(), new_path.display());
        }
        (None, Some(error)) => {
            println!(
                "{} ✗ {}: {}",
                result.original_path.display(),
                error.kind,
                error.message
            );
        }
        (None, None) => {
            println!("{} ✗ (no result)", result.original_path.display());
        }
    }
}

/// Print the name and destination a file would get
async fn suggest(config: &ResolvedConfig, file: PathBuf) -> Result<()> {
    let orchestrator = Orchestrator::from_config(config, CancellationToken::new());
    let suggestion = orchestrator.suggest(&file).await?;

    println!("Generator:   {}", orchestrator.namer_name());
    println!("Candidate:   {}", suggestion.candidate);
    println!("Destination: {}", suggestion.destination.path().display());
    Ok(())
}

fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!(
        "Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    print!("{}", serde_yaml::to_string(config).context("Failed to render configuration")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process_with_overrides() {
        let cli = Cli::try_parse_from([
            "docsort",
            "process",
            "a.pdf",
            "b.txt",
            "--llm-mode",
            "remote",
            "--organized-dir",
            "/tmp/out",
        ])
        .unwrap();

        match &cli.command {
            Commands::Process { files, json } => {
                assert_eq!(files.len(), 2);
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let options = cli.load_options();
        assert_eq!(options.llm_mode, Some(LlmMode::Remote));
        assert_eq!(options.organized_dir, Some(PathBuf::from("/tmp/out")));
        assert!(options.watch_dir.is_none());
    }

    #[test]
    fn test_process_requires_files() {
        assert!(Cli::try_parse_from(["docsort", "process"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["docsort", "--llm-mode", "psychic", "watch"]).is_err());
    }
}
