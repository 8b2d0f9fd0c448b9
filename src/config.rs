//! Configuration for docsort.
//!
//! Configuration sources (highest priority first):
//! 1. Command-line flags (`--llm-mode`, `--watch-dir`, `--organized-dir`)
//! 2. Environment variables (`DOCSORT_*`)
//! 3. Config file (`--config <path>`, else `.docsort/config.yaml`)
//! 4. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .docsort/config.yaml
//! - Relative paths in a discovered file are relative to the project root
//!   (the directory holding `.docsort/`); in an explicit file, relative to
//!   the file's own directory

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::RetryPolicy;
use crate::domain::DetectedType;

pub const CONFIG_DIR: &str = ".docsort";
pub const CONFIG_FILE: &str = "config.yaml";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which name generator to build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    /// Offline keyword heuristic
    #[default]
    Simulated,
    /// Hosted LLM over HTTP
    Remote,
}

impl FromStr for LlmMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" => Ok(Self::Simulated),
            "remote" => Ok(Self::Remote),
            other => Err(ConfigError::InvalidValue {
                key: "llm.mode".to_string(),
                value: other.to_string(),
                reason: "expected simulated or remote".to_string(),
            }),
        }
    }
}

// ============================================================================
// Raw config file schema (matches YAML structure)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub monitoring: MonitoringSection,
    pub llm: LlmSection,
    pub processing: ProcessingSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitoringSection {
    pub watch_dir: Option<String>,
    pub organized_dir: Option<String>,
    pub file_types: Option<Vec<String>>,
    pub stability_delay_ms: Option<u64>,
    pub ignore_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub mode: Option<LlmMode>,
    pub remote: RemoteSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProcessingSection {
    pub content_sample_length: Option<usize>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_secs: Option<u64>,
    pub max_workers: Option<usize>,
    pub results_log: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: Option<String>,
}

// ============================================================================
// Resolved configuration
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringConfig {
    pub watch_dir: PathBuf,
    pub organized_dir: PathBuf,
    pub file_types: Vec<DetectedType>,
    pub stability_delay_ms: u64,
    pub ignore_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteLlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for RemoteLlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com".to_string(),
            model: "claude-3-haiku-20240307".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 50,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LlmConfig {
    pub mode: LlmMode,
    pub remote: RemoteLlmConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingConfig {
    pub content_sample_length: usize,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
    pub max_workers: usize,
    /// Optional JSONL file receiving every result
    pub results_log: Option<PathBuf>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            content_sample_length: 1000,
            retry_attempts: 3,
            retry_delay_secs: 2,
            max_workers: 4,
            results_log: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Fully resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub monitoring: MonitoringConfig,
    pub llm: LlmConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
    /// Path to config file (if one was used)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Retry policy for the placement engine
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.processing.retry_attempts,
            std::time::Duration::from_secs(self.processing.retry_delay_secs),
        )
    }

    /// Whether the event source should emit events for this type
    pub fn accepts(&self, detected_type: DetectedType) -> bool {
        self.monitoring.file_types.contains(&detected_type)
    }
}

/// Command-line overrides, applied after the file and environment
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub llm_mode: Option<LlmMode>,
    pub watch_dir: Option<PathBuf>,
    pub organized_dir: Option<PathBuf>,
}

/// Load configuration from all sources
pub fn load(options: &LoadOptions) -> Result<ResolvedConfig> {
    let config_file = match &options.config_path {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.clone()).into());
            }
            Some(path.clone())
        }
        None => find_config_file(),
    };

    let cwd = std::env::current_dir().context("Failed to determine current directory")?;
    let (file, base_dir) = match &config_file {
        Some(path) => {
            let file = load_config_file(path)?;
            let base_dir = base_dir_for(path, options.config_path.is_some());
            (file, base_dir)
        }
        None => (ConfigFile::default(), cwd.clone()),
    };

    let mut resolved = resolve(file, &base_dir, &cwd, |key| std::env::var(key).ok(), options)?;
    resolved.config_file = config_file;
    Ok(resolved)
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn base_dir_for(config_path: &Path, explicit: bool) -> PathBuf {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    if explicit {
        return parent.to_path_buf();
    }
    // discovered files live in <root>/.docsort/
    parent.parent().unwrap_or(parent).to_path_buf()
}

/// Expand `~` and anchor relative paths at `base`
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let expanded = expand_home(path_str);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

fn expand_home(path_str: &str) -> PathBuf {
    let home = || dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));

    if path_str == "~" {
        home()
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        home().join(rest)
    } else {
        PathBuf::from(path_str)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> std::result::Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: "expected an integer".to_string(),
    })
}

/// Merge file values, environment and CLI overrides, then validate.
///
/// Relative paths from the file are anchored at `base_dir`; those from the
/// environment or command line at `cwd`. `env` is the environment lookup,
/// injected so tests need not touch the process environment.
pub fn resolve(
    file: ConfigFile,
    base_dir: &Path,
    cwd: &Path,
    env: impl Fn(&str) -> Option<String>,
    options: &LoadOptions,
) -> Result<ResolvedConfig> {
    let ConfigFile {
        monitoring,
        llm,
        processing,
        logging,
    } = file;

    // Monitoring
    let watch_dir = options
        .watch_dir
        .as_deref()
        .map(|p| cwd.join(p))
        .or_else(|| env("DOCSORT_WATCH_DIR").map(|v| resolve_path(cwd, &v)))
        .or_else(|| monitoring.watch_dir.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or_else(|| resolve_path(cwd, "~/Downloads"));

    let organized_dir = options
        .organized_dir
        .as_deref()
        .map(|p| cwd.join(p))
        .or_else(|| env("DOCSORT_ORGANIZED_DIR").map(|v| resolve_path(cwd, &v)))
        .or_else(|| monitoring.organized_dir.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or_else(|| watch_dir.join("Organized"));

    let file_types = monitoring
        .file_types
        .unwrap_or_else(|| vec!["pdf".to_string(), "txt".to_string()])
        .iter()
        .map(|t| {
            DetectedType::from_extension(t.trim_start_matches('.')).ok_or_else(|| ConfigError::InvalidValue {
                key: "monitoring.file_types".to_string(),
                value: t.clone(),
                reason: "supported types are pdf and txt".to_string(),
            })
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let ignore_patterns = monitoring
        .ignore_patterns
        .unwrap_or_else(|| vec!["**/.*".to_string(), "**/~$*".to_string()]);

    // LLM
    let mut remote = RemoteLlmConfig::default();
    if let Some(v) = llm.remote.endpoint {
        remote.endpoint = v;
    }
    if let Some(v) = llm.remote.model {
        remote.model = v;
    }
    if let Some(v) = llm.remote.api_key_env {
        remote.api_key_env = v;
    }
    if let Some(v) = llm.remote.max_tokens {
        remote.max_tokens = v;
    }
    if let Some(v) = llm.remote.timeout_secs {
        remote.timeout_secs = v;
    }
    if let Some(v) = env("DOCSORT_LLM_ENDPOINT") {
        remote.endpoint = v;
    }
    if let Some(v) = env("DOCSORT_LLM_MODEL") {
        remote.model = v;
    }
    if let Some(v) = env("DOCSORT_LLM_MAX_TOKENS") {
        remote.max_tokens = parse_env("DOCSORT_LLM_MAX_TOKENS", &v)?;
    }

    let mode = match (options.llm_mode, env("DOCSORT_LLM_MODE")) {
        (Some(mode), _) => mode,
        (None, Some(v)) => v.parse()?,
        (None, None) => llm.mode.unwrap_or_default(),
    };

    // Processing
    let defaults = ProcessingConfig::default();
    let content_sample_length = match env("DOCSORT_SAMPLE_LENGTH") {
        Some(v) => parse_env("DOCSORT_SAMPLE_LENGTH", &v)?,
        None => processing
            .content_sample_length
            .unwrap_or(defaults.content_sample_length),
    };
    let retry_attempts = match env("DOCSORT_RETRY_ATTEMPTS") {
        Some(v) => parse_env("DOCSORT_RETRY_ATTEMPTS", &v)?,
        None => processing.retry_attempts.unwrap_or(defaults.retry_attempts),
    };
    let retry_delay_secs = match env("DOCSORT_RETRY_DELAY") {
        Some(v) => parse_env("DOCSORT_RETRY_DELAY", &v)?,
        None => processing.retry_delay_secs.unwrap_or(defaults.retry_delay_secs),
    };

    // Logging
    let level = env("DOCSORT_LOG_LEVEL")
        .or(logging.level)
        .unwrap_or_else(|| "info".to_string())
        .to_ascii_lowercase();

    let config = ResolvedConfig {
        monitoring: MonitoringConfig {
            watch_dir,
            organized_dir,
            file_types,
            stability_delay_ms: monitoring.stability_delay_ms.unwrap_or(500),
            ignore_patterns,
        },
        llm: LlmConfig { mode, remote },
        processing: ProcessingConfig {
            content_sample_length,
            retry_attempts,
            retry_delay_secs,
            max_workers: processing.max_workers.unwrap_or(defaults.max_workers),
            results_log: processing
                .results_log
                .as_deref()
                .map(|p| resolve_path(base_dir, p)),
        },
        logging: LoggingConfig { level },
        config_file: None,
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &ResolvedConfig) -> std::result::Result<(), ConfigError> {
    if config.monitoring.file_types.is_empty() {
        return Err(ConfigError::Invalid("monitoring.file_types must not be empty".to_string()));
    }
    if config.processing.content_sample_length == 0 {
        return Err(ConfigError::Invalid(
            "processing.content_sample_length must be greater than 0".to_string(),
        ));
    }
    if config.processing.retry_attempts == 0 {
        return Err(ConfigError::Invalid("processing.retry_attempts must be at least 1".to_string()));
    }
    if config.processing.max_workers == 0 {
        return Err(ConfigError::Invalid("processing.max_workers must be greater than 0".to_string()));
    }
    if config.llm.remote.max_tokens == 0 {
        return Err(ConfigError::Invalid("llm.remote.max_tokens must be greater than 0".to_string()));
    }
    if !LOG_LEVELS.contains(&config.logging.level.as_str()) {
        return Err(ConfigError::InvalidValue {
            key: "logging.level".to_string(),
            value: config.logging.level.clone(),
            reason: format!("expected one of {}", LOG_LEVELS.join(", ")),
        });
    }
    for pattern in &config.monitoring.ignore_patterns {
        glob::Pattern::new(pattern).map_err(|e| ConfigError::InvalidValue {
            key: "monitoring.ignore_patterns".to_string(),
            value: pattern.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = resolve(ConfigFile::default(), Path::new("/base"), Path::new("/cwd"), no_env, &LoadOptions::default()).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(config.monitoring.watch_dir, home.join("Downloads"));
        assert_eq!(config.monitoring.organized_dir, home.join("Downloads").join("Organized"));
        assert_eq!(config.monitoring.file_types, vec![DetectedType::Pdf, DetectedType::Text]);
        assert_eq!(config.llm.mode, LlmMode::Simulated);
        assert_eq!(config.processing.content_sample_length, 1000);
        assert_eq!(config.processing.retry_attempts, 3);
        assert_eq!(config.processing.retry_delay_secs, 2);
        assert_eq!(config.logging.level, "info");

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_attempt(1).as_secs(), 2);
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
monitoring:
  watch_dir: inbox
  organized_dir: /srv/sorted
  file_types: [pdf]
llm:
  mode: remote
  remote:
    model: test-model
processing:
  retry_attempts: 5
  results_log: logs/results.jsonl
logging:
  level: DEBUG
"#
        )
        .unwrap();

        let raw = load_config_file(&config_path).unwrap();
        let base = base_dir_for(&config_path, false);
        assert_eq!(base, temp.path());

        let config = resolve(raw, &base, &base, no_env, &LoadOptions::default()).unwrap();
        assert_eq!(config.monitoring.watch_dir, temp.path().join("inbox"));
        assert_eq!(config.monitoring.organized_dir, PathBuf::from("/srv/sorted"));
        assert!(config.accepts(DetectedType::Pdf));
        assert!(!config.accepts(DetectedType::Text));
        assert_eq!(config.llm.mode, LlmMode::Remote);
        assert_eq!(config.llm.remote.model, "test-model");
        assert_eq!(config.llm.remote.max_tokens, 50);
        assert_eq!(config.processing.retry_attempts, 5);
        assert_eq!(
            config.processing.results_log,
            Some(temp.path().join("logs/results.jsonl"))
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_env_and_cli_precedence() {
        let mut raw = ConfigFile::default();
        raw.monitoring.watch_dir = Some("/from/file".to_string());
        raw.processing.retry_attempts = Some(7);

        let env = env_from(&[
            ("DOCSORT_WATCH_DIR", "/from/env"),
            ("DOCSORT_RETRY_ATTEMPTS", "4"),
            ("DOCSORT_LLM_MODE", "remote"),
        ]);
        let options = LoadOptions {
            llm_mode: Some(LlmMode::Simulated),
            ..LoadOptions::default()
        };

        let config = resolve(raw.clone(), Path::new("/base"), Path::new("/cwd"), &env, &options).unwrap();
        assert_eq!(config.monitoring.watch_dir, PathBuf::from("/from/env"));
        assert_eq!(config.processing.retry_attempts, 4);
        assert_eq!(config.llm.mode, LlmMode::Simulated);

        let options = LoadOptions {
            watch_dir: Some(PathBuf::from("/from/cli")),
            ..LoadOptions::default()
        };
        let config = resolve(raw, Path::new("/base"), Path::new("/cwd"), &env, &options).unwrap();
        assert_eq!(config.monitoring.watch_dir, PathBuf::from("/from/cli"));
        assert_eq!(config.llm.mode, LlmMode::Remote);
    }

    #[test]
    fn test_relative_overrides_anchor_at_cwd() {
        let mut raw = ConfigFile::default();
        raw.monitoring.watch_dir = Some("inbox".to_string());

        let env = env_from(&[("DOCSORT_ORGANIZED_DIR", "sorted")]);
        let options = LoadOptions {
            watch_dir: Some(PathBuf::from("downloads")),
            ..LoadOptions::default()
        };

        let config = resolve(raw.clone(), Path::new("/base"), Path::new("/cwd"), &env, &options).unwrap();
        assert_eq!(config.monitoring.watch_dir, PathBuf::from("/cwd/downloads"));
        assert_eq!(config.monitoring.organized_dir, PathBuf::from("/cwd/sorted"));

        // file values still anchor at the config's base directory
        let config = resolve(raw, Path::new("/base"), Path::new("/cwd"), no_env, &LoadOptions::default()).unwrap();
        assert_eq!(config.monitoring.watch_dir, PathBuf::from("/base/inbox"));
        assert_eq!(config.monitoring.organized_dir, PathBuf::from("/base/inbox/Organized"));
    }

    #[test]
    fn test_invalid_env_integer() {
        let env = env_from(&[("DOCSORT_SAMPLE_LENGTH", "lots")]);
        let err = resolve(ConfigFile::default(), Path::new("/base"), Path::new("/cwd"), env, &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("DOCSORT_SAMPLE_LENGTH"));
    }

    #[test]
    fn test_validation() {
        let mut raw = ConfigFile::default();
        raw.processing.retry_attempts = Some(0);
        assert!(resolve(raw, Path::new("/base"), Path::new("/cwd"), no_env, &LoadOptions::default()).is_err());

        let mut raw = ConfigFile::default();
        raw.monitoring.file_types = Some(vec![]);
        assert!(resolve(raw, Path::new("/base"), Path::new("/cwd"), no_env, &LoadOptions::default()).is_err());

        let mut raw = ConfigFile::default();
        raw.monitoring.file_types = Some(vec!["docx".to_string()]);
        assert!(resolve(raw, Path::new("/base"), Path::new("/cwd"), no_env, &LoadOptions::default()).is_err());

        let mut raw = ConfigFile::default();
        raw.monitoring.ignore_patterns = Some(vec!["[".to_string()]);
        assert!(resolve(raw, Path::new("/base"), Path::new("/cwd"), no_env, &LoadOptions::default()).is_err());

        let mut raw = ConfigFile::default();
        raw.logging.level = Some("loud".to_string());
        assert!(resolve(raw, Path::new("/base"), Path::new("/cwd"), no_env, &LoadOptions::default()).is_err());
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let options = LoadOptions {
            config_path: Some(PathBuf::from("/definitely/not/here.yaml")),
            ..LoadOptions::default()
        };
        assert!(load(&options).is_err());
    }

    #[test]
    fn test_resolve_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(resolve_path(&base, "./subdir"), PathBuf::from("/home/user/project/./subdir"));
        assert_eq!(resolve_path(&base, "/absolute/path"), PathBuf::from("/absolute/path"));
        assert_eq!(resolve_path(&base, "~/Downloads"), dirs::home_dir().unwrap().join("Downloads"));
    }
}
