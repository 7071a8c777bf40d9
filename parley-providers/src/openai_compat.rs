//! HTTP client for OpenAI-compatible chat completion endpoints

use async_trait::async_trait;
use parley_core::config::{Config, ProviderConfig, ProvidersConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::base::{LLMProvider, LLMResponse, Message, ProviderError, ProviderResult};
use crate::registry::{ProviderRegistry, ProviderSpec};

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f64,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
    #[serde(default)]
    total_tokens: i64,
}

/// Client for any endpoint speaking the `/chat/completions` protocol
pub struct OpenAiCompatClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    default_model: String,
    provider_name: Option<String>,
    extra_headers: HashMap<String, String>,
}

impl OpenAiCompatClient {
    /// Create a new client
    pub fn new(
        api_key: Option<String>,
        api_base: impl Into<String>,
        default_model: impl Into<String>,
        extra_headers: Option<HashMap<String, String>>,
        provider_name: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            default_model: default_model.into(),
            provider_name,
            extra_headers: extra_headers.unwrap_or_default(),
        }
    }

    /// Build a client for `model` from the provider sections of `config`
    pub fn from_config(config: &Config, model: &str) -> ProviderResult<Self> {
        let registry = ProviderRegistry::new();
        let route = route_model(&registry, config, model).ok_or_else(|| {
            ProviderError::ConfigError(format!("No provider found for model: {}", model))
        })?;
        let spec = route.spec;
        let provider_config = route.provider_config;

        let api_key = provider_config
            .map(|cfg| cfg.api_key.clone())
            .filter(|key| !key.is_empty());
        let api_base = provider_config
            .and_then(|cfg| cfg.api_base.clone())
            .filter(|base| !base.trim().is_empty())
            .unwrap_or_else(|| spec.default_api_base.clone());
        if api_base.is_empty() {
            return Err(ProviderError::ConfigError(format!(
                "providers.{}.api_base is required",
                spec.name
            )));
        }
        if api_key.is_none() && spec.requires_key() {
            warn!(
                "No API key configured for {}; requests will fail until {} or providers.{}.api_key is set",
                spec.label(),
                spec.env_key,
                spec.name
            );
        }
        let extra_headers = provider_config.and_then(|cfg| cfg.extra_headers.clone());

        Ok(Self::new(
            api_key,
            api_base,
            route.wire_model,
            extra_headers,
            Some(spec.name.clone()),
        ))
    }

    /// Endpoint base URL
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Whether an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Strip this client's own provider prefix from a model name
    fn wire_model(&self, model: &str) -> String {
        if let Some(name) = &self.provider_name {
            if let Some(rest) = model.strip_prefix(&format!("{}/", name)) {
                return rest.to_string();
            }
        }
        model.to_string()
    }

    fn apply_headers(&self, mut req_builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        req_builder
    }

    fn parse_response(response: ChatCompletionResponse) -> ProviderResult<LLMResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        let mut usage = HashMap::new();
        usage.insert("prompt_tokens".to_string(), response.usage.prompt_tokens);
        usage.insert(
            "completion_tokens".to_string(),
            response.usage.completion_tokens,
        );
        usage.insert("total_tokens".to_string(), response.usage.total_tokens);

        Ok(LLMResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage,
        })
    }
}

/// Where requests for a model go
#[derive(Debug)]
pub struct ProviderRoute<'a> {
    /// Provider that serves the request
    pub spec: &'a ProviderSpec,
    /// Config section holding the key and base; for a detected gateway this
    /// is the section the gateway was detected from
    pub provider_config: Option<&'a ProviderConfig>,
    /// Model name sent on the wire
    pub wire_model: String,
}

/// Pick the endpoint for `model`.
///
/// An explicit `<provider>/` prefix always wins. Otherwise a provider matched
/// by model keywords is used when its section has an API key; failing that, a
/// gateway or local server detected from any configured section (by name, key
/// prefix or base URL) takes the request with the model name unchanged.
pub fn route_model<'a>(
    registry: &'a ProviderRegistry,
    config: &'a Config,
    model: &str,
) -> Option<ProviderRoute<'a>> {
    if let Some((spec, wire_model)) = registry.find_by_prefix(model) {
        return Some(ProviderRoute {
            spec,
            provider_config: config.providers.by_name(&spec.name),
            wire_model,
        });
    }

    let direct = registry
        .find_by_model(model)
        .map(|spec| (spec, config.providers.by_name(&spec.name)));
    let direct_has_key = direct
        .and_then(|(_, cfg)| cfg)
        .is_some_and(|cfg| !cfg.api_key.is_empty());

    if !direct_has_key {
        if let Some((spec, provider_config)) = find_configured_gateway(registry, config) {
            debug!("Routing {} through {}", model, spec.name);
            return Some(ProviderRoute {
                spec,
                provider_config: Some(provider_config),
                wire_model: model.to_string(),
            });
        }
    }

    direct.map(|(spec, provider_config)| ProviderRoute {
        spec,
        provider_config,
        wire_model: model.to_string(),
    })
}

fn find_configured_gateway<'a>(
    registry: &'a ProviderRegistry,
    config: &'a Config,
) -> Option<(&'a ProviderSpec, &'a ProviderConfig)> {
    ProvidersConfig::names().iter().find_map(|&name| {
        let cfg = config.providers.by_name(name)?;
        let api_key = Some(cfg.api_key.as_str()).filter(|key| !key.is_empty());
        let api_base = cfg.api_base.as_deref().filter(|base| !base.trim().is_empty());
        if api_key.is_none() && api_base.is_none() {
            return None;
        }
        registry
            .find_gateway(Some(name), api_key, api_base)
            .map(|spec| (spec, cfg))
    })
}

#[async_trait]
impl LLMProvider for OpenAiCompatClient {
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<String>,
        max_tokens: Option<u32>,
        temperature: f64,
    ) -> ProviderResult<LLMResponse> {
        let model = self.wire_model(&model.unwrap_or_else(|| self.default_model.clone()));
        let request = ChatCompletionRequest {
            model: &model,
            messages: &messages,
            max_tokens,
            temperature,
        };

        debug!(
            "Sending chat request to {} with model {} ({} messages)",
            self.api_base,
            model,
            messages.len()
        );

        let url = format!("{}/chat/completions", self.api_base);
        let response = self
            .apply_headers(self.client.post(&url).json(&request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProviderError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await?;
        let response_data: ChatCompletionResponse = serde_json::from_str(&body)?;
        Self::parse_response(response_data)
    }

    fn get_default_model(&self) -> String {
        self.default_model.clone()
    }
}
