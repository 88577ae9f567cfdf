use crate::config::{Provider, ProviderConfig};
use crate::core::error::ChatError;
use crate::providers::{
    LLMProvider, anthropic::AnthropicProvider, openai_compatible::OpenAICompatibleProvider,
};
use std::collections::HashMap;

type ProviderCreator =
    Box<dyn Fn(&ProviderConfig) -> Result<Box<dyn LLMProvider>, ChatError> + Send + Sync>;

pub struct ProviderFactory {
    creators: HashMap<Provider, ProviderCreator>,
}

fn base_url(provider: Provider, config: &ProviderConfig) -> String {
    config
        .base_url
        .clone()
        .unwrap_or_else(|| provider.default_base_url().to_string())
}

fn model(provider: Provider, config: &ProviderConfig) -> String {
    config
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string())
}

/// Self-hosted vLLM servers usually run without auth; hosted APIs never do.
fn require_key(provider: Provider, config: &ProviderConfig) -> Result<(), ChatError> {
    if provider != Provider::Vllm && config.api_key.as_deref().unwrap_or("").is_empty() {
        return Err(ChatError::Config(format!(
            "No API key for {}; set it in the config file or {}",
            provider.name(),
            provider.api_key_env()
        )));
    }
    Ok(())
}

fn openai_compatible(provider: Provider) -> ProviderCreator {
    Box::new(move |config: &ProviderConfig| {
        require_key(provider, config)?;
        let extra_headers = match provider {
            Provider::OpenRouter => Some(HashMap::from([(
                "X-Title".to_string(),
                "toolchat".to_string(),
            )])),
            _ => None,
        };
        Ok(Box::new(OpenAICompatibleProvider::new(
            base_url(provider, config),
            config.api_key.clone(),
            model(provider, config),
            extra_headers,
        )) as Box<dyn LLMProvider>)
    })
}

impl ProviderFactory {
    pub fn new() -> Self {
        let mut creators: HashMap<Provider, ProviderCreator> = HashMap::new();

        for provider in [Provider::OpenAI, Provider::OpenRouter, Provider::Vllm] {
            creators.insert(provider, openai_compatible(provider));
        }

        creators.insert(
            Provider::Anthropic,
            Box::new(|config: &ProviderConfig| {
                require_key(Provider::Anthropic, config)?;
                Ok(Box::new(AnthropicProvider::new(
                    base_url(Provider::Anthropic, config),
                    config.api_key.clone(),
                    model(Provider::Anthropic, config),
                )) as Box<dyn LLMProvider>)
            }),
        );

        Self { creators }
    }

    pub fn create(
        &self,
        provider: &Provider,
        config: &ProviderConfig,
    ) -> Result<Box<dyn LLMProvider>, ChatError> {
        self.creators
            .get(provider)
            .ok_or_else(|| ChatError::Config(format!("Provider not found: {:?}", provider)))
            .and_then(|creator| creator(config))
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vllm_needs_no_key_and_uses_defaults() {
        let provider = ProviderFactory::new()
            .create(&Provider::Vllm, &ProviderConfig::default())
            .unwrap();
        assert_eq!(provider.model(), Provider::Vllm.default_model());
    }

    #[test]
    fn hosted_providers_require_a_key() {
        let factory = ProviderFactory::new();
        assert!(matches!(
            factory.create(&Provider::OpenAI, &ProviderConfig::default()),
            Err(ChatError::Config(_))
        ));

        let config = ProviderConfig {
            api_key: Some("sk-test".to_string()),
            base_url: None,
            model: Some("gpt-4.1-mini".to_string()),
        };
        let provider = factory.create(&Provider::OpenRouter, &config).unwrap();
        assert_eq!(provider.model(), "gpt-4.1-mini");
    }
}
