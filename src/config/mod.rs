use crate::core::error::ChatError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAI,
    OpenRouter,
    Vllm,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenAI,
        Provider::OpenRouter,
        Provider::Vllm,
        Provider::Anthropic,
    ];

    /// Comma-separated provider names, for error messages.
    pub fn names() -> String {
        Self::ALL
            .iter()
            .map(Provider::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Provider::OpenAI),
            "openrouter" => Some(Provider::OpenRouter),
            "vllm" => Some(Provider::Vllm),
            "anthropic" => Some(Provider::Anthropic),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::OpenRouter => "openrouter",
            Provider::Vllm => "vllm",
            Provider::Anthropic => "anthropic",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::Vllm => "http://localhost:8000/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-4.1-mini",
            Provider::OpenRouter => "openai/gpt-4.1-mini",
            Provider::Vllm => "meta-llama/Llama-3.1-8B-Instruct",
            Provider::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::OpenRouter => "OPENROUTER_API_KEY",
            Provider::Vllm => "VLLM_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// Bounds applied to every user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub max_iterations: usize,
    pub tool_timeout_secs: u64,
    /// Upper bound on one model request, streaming included
    pub model_timeout_secs: u64,
    pub model_retry_backoff_ms: u64,
    /// Run the router classification turn before the main loop
    pub router: bool,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            tool_timeout_secs: 30,
            model_timeout_secs: 120,
            model_retry_backoff_ms: 500,
            router: false,
        }
    }
}

impl OrchestrationConfig {
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.max_iterations == 0 {
            return Err(ChatError::Config(
                "orchestration.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.tool_timeout_secs == 0 {
            return Err(ChatError::Config(
                "orchestration.tool_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.model_timeout_secs == 0 {
            return Err(ChatError::Config(
                "orchestration.model_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub active_provider: Option<Provider>,
    #[serde(default)]
    pub providers: HashMap<Provider, ProviderConfig>,
    #[serde(default)]
    pub orchestration: OrchestrationConfig,
    #[serde(default = "default_true")]
    pub stream_tokens: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            active_provider: None,
            providers: HashMap::new(),
            orchestration: OrchestrationConfig::default(),
            stream_tokens: true,
        }
    }
}

impl Config {
    fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".toolchat")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    pub fn history_dir() -> PathBuf {
        Self::config_dir().join("history")
    }

    pub fn load() -> Result<Config, ChatError> {
        Self::load_from(&Self::config_path())
    }

    /// Reads the config at `path`, writing a default one first if it is missing.
    pub fn load_from(path: &Path) -> Result<Config, ChatError> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config = serde_yml::from_str::<Config>(&contents)
                .map_err(|e| ChatError::Config(format!("Parse {}: {}", path.display(), e)))?;
            config.orchestration.validate()?;
            debug!(path = %path.display(), "loaded config");
            return Ok(config);
        }

        let config = Config::default();
        if let Err(e) = config.save_to(path) {
            debug!(path = %path.display(), "could not write default config: {}", e);
        } else {
            info!(path = %path.display(), "created default config");
        }
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ChatError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let yaml_content = serde_yml::to_string(self)?;
        fs::write(path, yaml_content)?;
        Ok(())
    }

    pub fn provider(&self) -> Provider {
        self.active_provider.unwrap_or_default()
    }

    pub fn active_provider_config(&self) -> ProviderConfig {
        self.providers
            .get(&self.provider())
            .cloned()
            .unwrap_or_default()
    }

    /// Layers environment variables over the file settings for the active
    /// provider. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = self.provider();
        let entry = self.providers.entry(provider).or_default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = non_empty("MODEL_ENDPOINT") {
            debug!(provider = provider.name(), "base url from MODEL_ENDPOINT");
            entry.base_url = Some(endpoint);
        }
        if let Some(model) = non_empty("MODEL_ID") {
            debug!(provider = provider.name(), "model from MODEL_ID");
            entry.model = Some(model);
        }
        if entry.api_key.as_deref().unwrap_or("").is_empty() {
            if let Some(key) = non_empty(provider.api_key_env()) {
                entry.api_key = Some(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "active_provider: vllm\norchestration:\n  router: true\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.provider(), Provider::Vllm);
        assert!(config.orchestration.router);
        assert_eq!(config.orchestration.max_iterations, 3);
        assert_eq!(config.orchestration.tool_timeout_secs, 30);
        assert_eq!(config.orchestration.model_timeout_secs, 120);
        assert!(config.stream_tokens);
    }

    #[test]
    fn zero_bounds_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "orchestration:\n  max_iterations: 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ChatError::Config(_))
        ));

        let config = OrchestrationConfig {
            tool_timeout_secs: 0,
            ..OrchestrationConfig::default()
        };
        assert!(config.validate().is_err());

        let config = OrchestrationConfig {
            model_timeout_secs: 0,
            ..OrchestrationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn save_round_trips_provider_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config {
            active_provider: Some(Provider::OpenRouter),
            ..Config::default()
        };
        config.providers.insert(
            Provider::OpenRouter,
            ProviderConfig {
                api_key: Some("or-key".to_string()),
                base_url: None,
                model: Some("openai/gpt-4.1".to_string()),
            },
        );
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(fs::read_to_string(&path).unwrap().contains("openrouter"));
    }

    #[test]
    fn env_overrides_apply_to_active_provider() {
        let mut config = Config {
            active_provider: Some(Provider::Vllm),
            ..Config::default()
        };
        config.apply_env_overrides(env(&[
            ("MODEL_ENDPOINT", "http://gpu-box:8000/v1"),
            ("MODEL_ID", "mistralai/Mistral-7B-Instruct-v0.3"),
            ("OPENAI_API_KEY", "not-for-vllm"),
        ]));

        let active = config.active_provider_config();
        assert_eq!(active.base_url.as_deref(), Some("http://gpu-box:8000/v1"));
        assert_eq!(
            active.model.as_deref(),
            Some("mistralai/Mistral-7B-Instruct-v0.3")
        );
        assert_eq!(active.api_key, None);
    }

    #[test]
    fn env_key_does_not_replace_configured_key() {
        let mut config = Config::default();
        config.providers.insert(
            Provider::OpenAI,
            ProviderConfig {
                api_key: Some("from-file".to_string()),
                ..ProviderConfig::default()
            },
        );
        config.apply_env_overrides(env(&[("OPENAI_API_KEY", "from-env"), ("MODEL_ID", "")]));

        let active = config.active_provider_config();
        assert_eq!(active.api_key.as_deref(), Some("from-file"));
        assert_eq!(active.model, None);

        let mut fresh = Config::default();
        fresh.apply_env_overrides(env(&[("OPENAI_API_KEY", "from-env")]));
        assert_eq!(
            fresh.active_provider_config().api_key.as_deref(),
            Some("from-env")
        );
    }

    #[test]
    fn provider_names_parse_case_insensitively() {
        for provider in Provider::ALL {
            assert_eq!(Provider::from_str(provider.name()), Some(provider));
        }
        assert_eq!(Provider::from_str("VLLM"), Some(Provider::Vllm));
        assert_eq!(Provider::from_str("gemini"), None);
        assert_eq!(Provider::names(), "openai, openrouter, vllm, anthropic");
    }
}
