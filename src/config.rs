//! TOML configuration.
//!
//! Every section except `[db]` is optional and falls back to the defaults
//! below. [`load_config`] rejects values the pipeline cannot work with.
//!
//! ```toml
//! [db]
//! path = "./data/srag.sqlite"
//!
//! [chunking]
//! target_chars = 60000
//! sample_rows = 10
//! output_dir = "./output"
//!
//! [retrieval]
//! min_chars = 50000
//! max_chars = 60000
//!
//! [generation]
//! provider = "openai"
//! url = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o-mini"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::context::ContextOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: default_target_chars(),
            sample_rows: default_sample_rows(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_target_chars() -> usize {
    60_000
}
fn default_sample_rows() -> usize {
    10
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

/// Which files `srag parse` picks up when given a directory.
#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.xlsx".to_string(),
        "**/*.pptx".to_string(),
        "**/*.docx".to_string(),
    ]
}
fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_prefix_count")]
    pub prefix_count: usize,
    #[serde(default = "default_result_limit")]
    pub result_limit: i64,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_truncation_marker")]
    pub truncation_marker: String,
    #[serde(default = "default_not_found")]
    pub not_found: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            max_chars: default_max_chars(),
            prefix_count: default_prefix_count(),
            result_limit: default_result_limit(),
            delimiter: default_delimiter(),
            truncation_marker: default_truncation_marker(),
            not_found: default_not_found(),
        }
    }
}

impl RetrievalConfig {
    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            min_chars: self.min_chars,
            max_chars: self.max_chars,
            prefix_count: self.prefix_count,
            delimiter: self.delimiter.clone(),
            truncation_marker: self.truncation_marker.clone(),
            not_found: self.not_found.clone(),
        }
    }
}

fn default_min_chars() -> usize {
    50_000
}
fn default_max_chars() -> usize {
    60_000
}
fn default_prefix_count() -> usize {
    5
}
fn default_result_limit() -> i64 {
    10
}
fn default_delimiter() -> String {
    "   ---   ".to_string()
}
fn default_truncation_marker() -> String {
    "...".to_string()
}
fn default_not_found() -> String {
    "No relevant content found".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StagingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Overrides the built-in system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            url: default_generation_url(),
            model: None,
            api_key_env: default_api_key_env(),
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
            timeout_secs: default_timeout_secs(),
            system_prompt: None,
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_generation_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_secs() -> u64 {
    2
}
fn default_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Defaults only, with the database under `./data`. Used when no
    /// config file is needed (e.g. `srag parse`).
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/srag.sqlite"),
            },
            chunking: ChunkingConfig::default(),
            ingest: IngestConfig::default(),
            retrieval: RetrievalConfig::default(),
            staging: StagingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.target_chars == 0 {
        anyhow::bail!("chunking.target_chars must be > 0");
    }
    if config.chunking.sample_rows == 0 {
        anyhow::bail!("chunking.sample_rows must be > 0");
    }

    // Validate ingest
    if config.ingest.include_globs.is_empty() {
        anyhow::bail!("ingest.include_globs must not be empty");
    }

    // Validate retrieval
    let retrieval = &config.retrieval;
    if retrieval.max_chars == 0 {
        anyhow::bail!("retrieval.max_chars must be > 0");
    }
    if retrieval.min_chars > retrieval.max_chars {
        anyhow::bail!(
            "retrieval.min_chars ({}) must not exceed retrieval.max_chars ({})",
            retrieval.min_chars,
            retrieval.max_chars
        );
    }
    if retrieval.prefix_count == 0 {
        anyhow::bail!("retrieval.prefix_count must be >= 1");
    }
    if retrieval.result_limit < 1 {
        anyhow::bail!("retrieval.result_limit must be >= 1");
    }

    if config.staging.batch_size == 0 {
        anyhow::bail!("staging.batch_size must be > 0");
    }

    // Validate generation
    match config.generation.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if config.generation.model.is_none() {
                anyhow::bail!("generation.model must be specified when provider is 'openai'");
            }
            if config.generation.max_retries == 0 {
                anyhow::bail!("generation.max_retries must be >= 1");
            }
        }
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}
