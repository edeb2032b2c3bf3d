use crate::extract::http::DEFAULT_MAX_RETRIES;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NOTES_REF: &str = "refs/notes/intent";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
const ENV_PREFIX: &str = "GITSUMMARY_";

/// Where artifacts are stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Notes ref used as the annotation namespace
    pub notes_ref: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            notes_ref: DEFAULT_NOTES_REF.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Extractor names, highest priority first
    pub extractors: Vec<String>,
    /// Per-extractor timeout
    pub timeout_secs: u64,
    /// Extra attempts on transient provider errors, within the timeout
    pub max_retries: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            extractors: vec!["heuristic".to_string()],
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Settings for one LLM provider. Keys are never stored here, only the
/// name of the environment variable that holds them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: f32,
}

impl ProviderConfig {
    fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            base_url: None,
            api_key_env: None,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderConfig,
    pub anthropic: ProviderConfig,
    pub ollama: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: ProviderConfig::with_model("gpt-4o-mini"),
            anthropic: ProviderConfig::with_model("claude-3-5-sonnet-20241022"),
            ollama: ProviderConfig::with_model("llama3.1"),
        }
    }
}

/// Project configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Service for configuration management
pub struct ConfigService {
    config_path: PathBuf,
    env_prefix: String,
}

impl ConfigService {
    /// Config lives at `<repo_root>/.gitsummary/config.toml`
    pub fn new(repo_root: &Path) -> Self {
        Self {
            config_path: repo_root.join(".gitsummary").join("config.toml"),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment prefix (for isolated tests)
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Write a default config, optionally with a custom extractor order.
    pub fn init(&self, extractors: Option<Vec<String>>) -> Result<ProjectConfig> {
        let mut config = ProjectConfig::default();
        if let Some(extractors) = extractors {
            config.analysis.extractors = extractors;
        }
        self.save(&config)?;
        Ok(config)
    }

    /// Load configuration: defaults, then the file (if any), then
    /// `GITSUMMARY_` env vars with `__` as the section separator.
    pub fn load(&self) -> Result<ProjectConfig> {
        let mut figment = Figment::from(Serialized::defaults(ProjectConfig::default()));

        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));

        let config: ProjectConfig = figment.extract().context("Failed to load configuration")?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, config: &ProjectConfig) -> Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        std::fs::write(&self.config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Get a configuration value by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        let config = self.load()?;
        let value = match key {
            "storage.notes_ref" => config.storage.notes_ref,
            "analysis.extractors" => config.analysis.extractors.join(","),
            "analysis.timeout_secs" => config.analysis.timeout_secs.to_string(),
            "analysis.max_retries" => config.analysis.max_retries.to_string(),
            _ => {
                let (provider, field) = provider_key(key)?;
                let provider = match provider {
                    "openai" => config.providers.openai,
                    "anthropic" => config.providers.anthropic,
                    _ => config.providers.ollama,
                };
                match field {
                    "model" => provider.model,
                    "base_url" => provider.base_url.unwrap_or_default(),
                    "api_key_env" => provider.api_key_env.unwrap_or_default(),
                    _ => provider.temperature.to_string(),
                }
            },
        };
        Ok(value)
    }

    /// Set a configuration value by dotted key
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut config = self.load()?;
        match key {
            "storage.notes_ref" => {
                if !value.starts_with("refs/notes/") {
                    return Err(anyhow::anyhow!(
                        "storage.notes_ref must start with refs/notes/ (got {})",
                        value
                    ));
                }
                config.storage.notes_ref = value.to_string();
            },
            "analysis.extractors" => {
                config.analysis.extractors = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            },
            "analysis.timeout_secs" => {
                config.analysis.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout: {}", value))?;
            },
            "analysis.max_retries" => {
                config.analysis.max_retries = value
                    .parse()
                    .with_context(|| format!("Invalid retry count: {}", value))?;
            },
            _ => {
                let (provider, field) = provider_key(key)?;
                let provider = match provider {
                    "openai" => &mut config.providers.openai,
                    "anthropic" => &mut config.providers.anthropic,
                    _ => &mut config.providers.ollama,
                };
                let optional = (!value.is_empty()).then(|| value.to_string());
                match field {
                    "model" => provider.model = value.to_string(),
                    "base_url" => provider.base_url = optional,
                    "api_key_env" => provider.api_key_env = optional,
                    _ => {
                        provider.temperature = value
                            .parse()
                            .with_context(|| format!("Invalid temperature: {}", value))?
                    },
                }
            },
        }
        self.save(&config)?;
        Ok(())
    }

    /// Check if configuration exists
    pub fn exists(&self) -> bool {
        self.config_path.exists()
    }
}

/// Split `providers.<name>.<field>` into its parts, rejecting unknown keys.
fn provider_key(key: &str) -> Result<(&str, &str)> {
    let unknown = || anyhow::anyhow!("Unknown config key: {}", key);
    let rest = key.strip_prefix("providers.").ok_or_else(unknown)?;
    let (provider, field) = rest.split_once('.').ok_or_else(unknown)?;
    if !matches!(provider, "openai" | "anthropic" | "ollama")
        || !matches!(field, "model" | "base_url" | "api_key_env" | "temperature")
    {
        return Err(unknown());
    }
    Ok((provider, field))
}
