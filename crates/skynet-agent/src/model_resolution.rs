//! Model resolution: `model_reference` strings are classified by prefix.
//! `ollama_chat/`/`ollama/` route to the local Ollama client; anything else
//! is a hosted-provider model name. Resolution happens once per agent
//! construction and again after every config change touching `agent`.

use skynet_core::config::ProvidersConfig;
use skynet_credentials::CredentialStore;

use crate::anthropic::AnthropicProvider;
use crate::ollama::OllamaProvider;
use crate::openai::OpenAiProvider;
use crate::provider::LlmProvider;
use crate::registry::lookup as lookup_known_provider;

#[derive(Debug, thiserror::Error)]
pub enum ModelResolutionError {
    #[error("no credential or config entry found for provider {provider}")]
    MissingApiKey { provider: String },
}

/// Resolves a `model_reference` to a concrete provider plus the bare model
/// name to send in the request. `ollama_chat/llama3` resolves to (Ollama
/// provider, "llama3"); `groq/llama-3.3-70b-versatile` resolves to (OpenAI-
/// compatible provider pointed at Groq, "llama-3.3-70b-versatile"); a bare
/// `claude-sonnet-4-6` resolves to (Anthropic provider, same string).
pub fn resolve(
    model_reference: &str,
    providers: &ProvidersConfig,
    credentials: &CredentialStore,
) -> Result<(Box<dyn LlmProvider>, String), ModelResolutionError> {
    if let Some(rest) = model_reference.strip_prefix("ollama_chat/").or_else(|| model_reference.strip_prefix("ollama/")) {
        let base_url = providers.ollama.as_ref().map(|o| o.base_url.clone());
        return Ok((Box::new(OllamaProvider::new(base_url)), rest.to_string()));
    }

    if let Some((provider_id, model_name)) = model_reference.split_once('/') {
        if let Some(known) = lookup_known_provider(provider_id) {
            let api_key = credential_or_config(credentials, provider_id, providers.openai.as_ref().map(|o| o.api_key.clone()))?;
            let provider = OpenAiProvider::with_path(
                known.id.to_string(),
                api_key,
                known.base_url.to_string(),
                known.chat_path.to_string(),
            );
            return Ok((Box::new(provider), model_name.to_string()));
        }
    }

    if model_reference.starts_with("claude") {
        let api_key = credential_or_config(credentials, "anthropic", providers.anthropic.as_ref().map(|a| a.api_key.clone()))?;
        let base_url = providers.anthropic.as_ref().map(|a| a.base_url.clone());
        return Ok((Box::new(AnthropicProvider::new(api_key, base_url)), model_reference.to_string()));
    }

    let api_key = credential_or_config(credentials, "openai", providers.openai.as_ref().map(|o| o.api_key.clone()))?;
    let base_url = providers.openai.as_ref().map(|o| o.base_url.clone());
    Ok((Box::new(OpenAiProvider::new(api_key, base_url)), model_reference.to_string()))
}

/// A `<provider>` credential in the Credential Store wins over the plain
/// config field of the same purpose; the config field is only a fallback.
fn credential_or_config(
    credentials: &CredentialStore,
    provider_id: &str,
    config_value: Option<String>,
) -> Result<String, ModelResolutionError> {
    let credential_name = format!("{provider_id}_api_key");
    if let Ok(credential) = credentials.get(&credential_name) {
        return Ok(credential.plaintext);
    }
    config_value.ok_or_else(|| ModelResolutionError::MissingApiKey { provider: provider_id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skynet_core::config::{AnthropicConfig, OllamaConfig, OpenAiProviderConfig};

    fn store() -> CredentialStore {
        CredentialStore::new(rusqlite::Connection::open_in_memory().unwrap(), "test-key-that-is-at-least-32-bytes!").unwrap()
    }

    #[test]
    fn ollama_prefix_routes_to_local_client() {
        let providers = ProvidersConfig { ollama: Some(OllamaConfig { base_url: "http://host:11434".into() }), ..Default::default() };
        let (provider, model) = resolve("ollama_chat/llama3", &providers, &store()).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(model, "llama3");
    }

    #[test]
    fn known_provider_prefix_routes_to_hosted_endpoint() {
        let providers = ProvidersConfig { openai: Some(OpenAiProviderConfig { api_key: "fallback-key".into(), base_url: "https://api.openai.com".into() }), ..Default::default() };
        let (provider, model) = resolve("groq/llama-3.3-70b-versatile", &providers, &store()).unwrap();
        assert_eq!(provider.name(), "groq");
        assert_eq!(model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn bare_claude_model_routes_to_anthropic() {
        let providers = ProvidersConfig { anthropic: Some(AnthropicConfig { api_key: "sk-ant-test".into(), base_url: "https://api.anthropic.com".into() }), ..Default::default() };
        let (provider, model) = resolve("claude-sonnet-4-6", &providers, &store()).unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(model, "claude-sonnet-4-6");
    }

    #[test]
    fn credential_store_entry_wins_over_config_field() {
        let credentials = store();
        credentials.put("anthropic_api_key", "sk-ant-from-store").unwrap();
        let providers = ProvidersConfig { anthropic: Some(AnthropicConfig { api_key: "sk-ant-from-config".into(), base_url: "https://api.anthropic.com".into() }), ..Default::default() };
        let key = credential_or_config(&credentials, "anthropic", providers.anthropic.map(|a| a.api_key)).unwrap();
        assert_eq!(key, "sk-ant-from-store");
    }

    #[test]
    fn missing_api_key_errors_instead_of_panicking() {
        let providers = ProvidersConfig::default();
        let err = resolve("claude-sonnet-4-6", &providers, &store()).unwrap_err();
        assert!(matches!(err, ModelResolutionError::MissingApiKey { .. }));
    }
}
