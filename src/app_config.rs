use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Translation job settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Input, output and checkpoint file locations
    #[serde(default)]
    pub files: FilesConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Settings for one translation job.
///
/// A clone of this is taken when a job starts and shared read-only by every worker.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// System prompt sent as the first message of every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum number of tokens to generate per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Nucleus sampling mass
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Top-k sampling; values <= 0 leave it out of the request
    #[serde(default = "default_top_k")]
    pub top_k: i32,

    /// Whether to request a server-sent-event stream
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Number of workers; values <= 0 are treated as 1
    #[serde(default = "default_threads")]
    pub threads: i64,

    /// Lines per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Minimum delay in seconds between the start of two requests, across all workers
    #[serde(default = "default_delay")]
    pub delay: f64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            stream: true,
            threads: default_threads(),
            batch_size: default_batch_size(),
            delay: default_delay(),
        }
    }
}

impl TranslationConfig {
    /// Worker count with non-positive values coerced to 1
    pub fn effective_threads(&self) -> usize {
        if self.threads <= 0 {
            1
        } else {
            self.threads as usize
        }
    }

    /// Minimum spacing between requests.
    ///
    /// Negative or NaN delays mean no spacing; delays too large for a `Duration` saturate.
    pub fn min_request_delay(&self) -> Duration {
        match Duration::try_from_secs_f64(self.delay) {
            Ok(delay) => delay,
            Err(_) if self.delay > 0.0 => Duration::MAX,
            Err(_) => Duration::ZERO,
        }
    }

    /// Top-k value to send, if any
    pub fn top_k_param(&self) -> Option<u32> {
        if self.top_k > 0 {
            Some(self.top_k as u32)
        } else {
            None
        }
    }

    /// Full chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Validate the settings a job depends on
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(anyhow!("Base URL cannot be empty"));
        }
        Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.base_url))?;

        if self.model.trim().is_empty() {
            return Err(anyhow!("Model cannot be empty"));
        }
        if self.batch_size == 0 {
            return Err(anyhow!("Batch size must be at least 1"));
        }
        if self.max_tokens == 0 {
            return Err(anyhow!("Max tokens must be at least 1"));
        }
        if !self.delay.is_finite() || Duration::try_from_secs_f64(self.delay).is_err() {
            return Err(anyhow!("Delay must be a non-negative number of seconds, got {}", self.delay));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0, got {}", self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(anyhow!("Top-p must be between 0.0 and 1.0, got {}", self.top_p));
        }
        if self.threads <= 0 {
            warn!("Thread count {} is not positive, using 1", self.threads);
        }

        Ok(())
    }
}

/// File locations used by a job
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilesConfig {
    /// Input file, one `id:::text` or bare line per line
    #[serde(default = "default_input_file")]
    pub input_file: String,

    /// Final output, replaced only when a job completes without cancellation
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Checkpoint rewritten after every batch
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            input_file: default_input_file(),
            output_file: default_output_file(),
            checkpoint_file: default_checkpoint_file(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_base_url() -> String {
    "https://api.mistral.ai/v1".to_string()
}

fn default_model() -> String {
    "mistral-large-latest".to_string()
}

fn default_system_prompt() -> String {
    concat!(
        "# ROLE: Master of Game Localization (English to Vietnamese)\n",
        "# CONTEXT: Wuthering Waves (Kuro Games) - Sci-fi, Post-apocalyptic, Solaris-3.\n\n",
        "## 1. MANDATORY TECHNICAL PROTOCOL (STRICT):\n",
        "- FORMAT: Always '{ID}:::{TranslatedText}'. One ID per line. NO blank lines between IDs.\n",
        "- INTEGRITY: Preserve {tags}. No new braces.\n",
        "- LITERALS: Keep '\\n' as literal.\n",
        "- NO CHAT: Output ONLY translated content.\n\n",
        "## 5. FINAL EXECUTION:\n",
        "Translate EVERY line. Format: ID:::Text"
    )
    .to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_top_p() -> f32 {
    1.0
}

fn default_top_k() -> i32 {
    -1
}

fn default_true() -> bool {
    true
}

fn default_threads() -> i64 {
    1
}

fn default_batch_size() -> usize {
    50
}

fn default_delay() -> f64 {
    1.3
}

fn default_input_file() -> String {
    "temp.txt".to_string()
}

fn default_output_file() -> String {
    "tran.txt".to_string()
}

fn default_checkpoint_file() -> String {
    "temp_translating.txt".to_string()
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        self.translation.validate()?;

        if self.files.output_file.trim().is_empty() {
            return Err(anyhow!("Output file cannot be empty"));
        }
        if self.files.checkpoint_file.trim().is_empty() {
            return Err(anyhow!("Checkpoint file cannot be empty"));
        }
        if self.files.output_file == self.files.checkpoint_file {
            return Err(anyhow!("Output and checkpoint files must differ"));
        }

        Ok(())
    }

    /// Load the configuration at `path`, writing a default one if it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            warn!("Config file not found at {:?}, creating default config.", path);
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {:?}", path))?;
        Ok(())
    }
}
