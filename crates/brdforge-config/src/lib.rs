//! Configuration model for brdforge
//!
//! Configuration is an explicit value constructed once at process start
//! and handed down to the generation backend and the CLI; the engine
//! itself never reads ambient global state. Discovery resolves in
//! layers, later layers winning: built-in defaults, then environment
//! variables, then an optional TOML file. Programmatic embedders skip
//! discovery and use the builder directly.

use camino::Utf8PathBuf;
use serde::Deserialize;
use std::fs;

/// Default chat model, matching the OpenAI-compatible backend.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default system prompt pinning the JSON-only reply contract.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Return JSON only. No extra text.";
/// Default API base URL for the generation backend.
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_RUNTIME_DIR: &str = ".runtime";
const DEFAULT_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_LOCK_TIMEOUT_SECS: f64 = 30.0;
const DEFAULT_LOCK_POLL_SECS: f64 = 0.1;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_TEMPERATURE: f64 = 0.3;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {reason}")]
    FileRead { path: String, reason: String },

    #[error("Invalid configuration file {path}: {reason}")]
    FileParse { path: String, reason: String },

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Effective configuration for a brdforge process.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key for the generation backend; absent means generation will
    /// fail with a configuration diagnostic at invocation time.
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint.
    pub api_base_url: String,
    /// Model identifier sent with every generation request.
    pub model: String,
    /// System prompt prefixed to every generation request.
    pub system_prompt: String,
    /// Sampling temperature for generation requests.
    pub temperature: f64,
    /// Optional directory of prompt template overrides.
    pub prompts_dir: Option<Utf8PathBuf>,
    /// Root directory for locks and checkpoints.
    pub runtime_dir: Utf8PathBuf,
    /// Per-stage attempt budget.
    pub max_attempts: u32,
    /// Delay between retry attempts, in seconds.
    pub retry_delay_seconds: f64,
    /// Bounded wait when acquiring the run lock, in seconds.
    pub lock_timeout_seconds: f64,
    /// Poll interval while waiting for the run lock, in seconds.
    pub lock_poll_seconds: f64,
    /// HTTP request timeout for generation calls, in seconds.
    pub request_timeout_seconds: u64,
}

impl Config {
    /// Create a builder with no values set.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Discover configuration: optional TOML file over environment over
    /// defaults.
    ///
    /// # Errors
    /// Fails if the named file is unreadable or malformed, or if any
    /// resulting value is out of range.
    pub fn discover(file: Option<&Utf8PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::from_env();
        if let Some(path) = file {
            builder = builder.merge_file(path)?;
        }
        builder.build()
    }

    /// Checkpoint directory under the runtime root.
    #[must_use]
    pub fn checkpoint_dir(&self) -> Utf8PathBuf {
        self.runtime_dir.join("checkpoints")
    }

    /// Lock file path for the pipeline store under the runtime root.
    #[must_use]
    pub fn lock_path(&self) -> Utf8PathBuf {
        self.runtime_dir.join("pipeline.lock")
    }
}

/// On-disk TOML layout (all values optional).
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    generation: GenerationSection,
    #[serde(default)]
    pipeline: PipelineSection,
}

#[derive(Debug, Default, Deserialize)]
struct GenerationSection {
    api_key: Option<String>,
    api_base_url: Option<String>,
    model: Option<String>,
    system_prompt: Option<String>,
    temperature: Option<f64>,
    prompts_dir: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSection {
    runtime_dir: Option<String>,
    max_attempts: Option<u32>,
    retry_delay_seconds: Option<f64>,
    lock_timeout_seconds: Option<f64>,
    lock_poll_seconds: Option<f64>,
}

/// Fluent builder for [`Config`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    api_key: Option<String>,
    api_base_url: Option<String>,
    model: Option<String>,
    system_prompt: Option<String>,
    temperature: Option<f64>,
    prompts_dir: Option<Utf8PathBuf>,
    runtime_dir: Option<Utf8PathBuf>,
    max_attempts: Option<u32>,
    retry_delay_seconds: Option<f64>,
    lock_timeout_seconds: Option<f64>,
    lock_poll_seconds: Option<f64>,
    request_timeout_seconds: Option<u64>,
}

impl ConfigBuilder {
    /// Seed a builder from environment variables.
    ///
    /// Recognized: `OPENAI_API_KEY`, `OPENAI_MODEL`, `SYSTEM_PROMPT`,
    /// `BRDFORGE_RUNTIME_DIR`, `BRDFORGE_PROMPTS_DIR`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut builder = Self::default();
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            builder.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            builder.model = Some(model);
        }
        if let Ok(prompt) = std::env::var("SYSTEM_PROMPT") {
            builder.system_prompt = Some(prompt);
        }
        if let Ok(dir) = std::env::var("BRDFORGE_RUNTIME_DIR") {
            builder.runtime_dir = Some(Utf8PathBuf::from(dir));
        }
        if let Ok(dir) = std::env::var("BRDFORGE_PROMPTS_DIR") {
            builder.prompts_dir = Some(Utf8PathBuf::from(dir));
        }
        builder
    }

    /// Overlay values from a TOML file; file values win over whatever
    /// the builder currently holds.
    pub fn merge_file(mut self, path: &Utf8PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_std_path()).map_err(|e| ConfigError::FileRead {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::FileParse {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let g = file.generation;
        self.api_key = g.api_key.or(self.api_key);
        self.api_base_url = g.api_base_url.or(self.api_base_url);
        self.model = g.model.or(self.model);
        self.system_prompt = g.system_prompt.or(self.system_prompt);
        self.temperature = g.temperature.or(self.temperature);
        self.prompts_dir = g.prompts_dir.map(Utf8PathBuf::from).or(self.prompts_dir);
        self.request_timeout_seconds = g.request_timeout_seconds.or(self.request_timeout_seconds);

        let p = file.pipeline;
        self.runtime_dir = p.runtime_dir.map(Utf8PathBuf::from).or(self.runtime_dir);
        self.max_attempts = p.max_attempts.or(self.max_attempts);
        self.retry_delay_seconds = p.retry_delay_seconds.or(self.retry_delay_seconds);
        self.lock_timeout_seconds = p.lock_timeout_seconds.or(self.lock_timeout_seconds);
        self.lock_poll_seconds = p.lock_poll_seconds.or(self.lock_poll_seconds);
        Ok(self)
    }

    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn prompts_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.prompts_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn runtime_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.runtime_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn retry_delay_seconds(mut self, seconds: f64) -> Self {
        self.retry_delay_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn lock_timeout_seconds(mut self, seconds: f64) -> Self {
        self.lock_timeout_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn lock_poll_seconds(mut self, seconds: f64) -> Self {
        self.lock_poll_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.request_timeout_seconds = Some(seconds);
        self
    }

    /// Resolve defaults and validate ranges.
    ///
    /// # Errors
    /// [`ConfigError::InvalidValue`] for a zero attempt budget, negative
    /// delays, or an out-of-range temperature.
    pub fn build(self) -> Result<Config, ConfigError> {
        let config = Config {
            api_key: self.api_key,
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: self
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            prompts_dir: self.prompts_dir,
            runtime_dir: self
                .runtime_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_RUNTIME_DIR)),
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            retry_delay_seconds: self.retry_delay_seconds.unwrap_or(0.0),
            lock_timeout_seconds: self.lock_timeout_seconds.unwrap_or(DEFAULT_LOCK_TIMEOUT_SECS),
            lock_poll_seconds: self.lock_poll_seconds.unwrap_or(DEFAULT_LOCK_POLL_SECS),
            request_timeout_seconds: self
                .request_timeout_seconds
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        if config.max_attempts < 1 {
            return Err(ConfigError::InvalidValue {
                key: "max_attempts",
                value: config.max_attempts.to_string(),
            });
        }
        if config.retry_delay_seconds < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "retry_delay_seconds",
                value: config.retry_delay_seconds.to_string(),
            });
        }
        if config.lock_timeout_seconds < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "lock_timeout_seconds",
                value: config.lock_timeout_seconds.to_string(),
            });
        }
        if config.lock_poll_seconds <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "lock_poll_seconds",
                value: config.lock_poll_seconds.to_string(),
            });
        }
        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(ConfigError::InvalidValue {
                key: "temperature",
                value: config.temperature.to_string(),
            });
        }

        Ok(config)
    }
}
