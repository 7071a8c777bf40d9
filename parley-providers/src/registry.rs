//! Provider registry - single source of truth for LLM provider metadata

use serde::{Deserialize, Serialize};

/// One LLM provider's metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    // Identity
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub env_key: String,

    // Gateway / local detection
    #[serde(default)]
    pub is_gateway: bool,
    #[serde(default)]
    pub is_local: bool,
    #[serde(default)]
    pub detect_by_key_prefix: String,
    #[serde(default)]
    pub detect_by_base_keyword: String,

    // Endpoint defaults
    #[serde(default)]
    pub default_api_base: String,
    #[serde(default)]
    pub default_model: String,
}

impl ProviderSpec {
    pub fn label(&self) -> String {
        if !self.display_name.is_empty() {
            self.display_name.clone()
        } else {
            self.name.clone()
        }
    }

    /// Whether requests need an API key
    pub fn requires_key(&self) -> bool {
        !self.is_local
    }
}

/// Registry of available LLM providers
pub struct ProviderRegistry {
    providers: Vec<ProviderSpec>,
}

impl ProviderRegistry {
    /// Create a new provider registry with default providers
    pub fn new() -> Self {
        Self {
            providers: Self::default_providers(),
        }
    }

    /// Get all provider specs
    pub fn all(&self) -> &[ProviderSpec] {
        &self.providers
    }

    /// Find a provider by model name (case-insensitive keyword matching)
    pub fn find_by_model(&self, model: &str) -> Option<&ProviderSpec> {
        let model_lower = model.to_lowercase();
        self.providers
            .iter()
            .filter(|spec| !spec.is_gateway && !spec.is_local)
            .find(|spec| spec.keywords.iter().any(|kw| model_lower.contains(kw)))
    }

    /// Find a gateway/local provider
    pub fn find_gateway(
        &self,
        provider_name: Option<&str>,
        api_key: Option<&str>,
        api_base: Option<&str>,
    ) -> Option<&ProviderSpec> {
        // 1. Direct match by config key
        if let Some(spec) = provider_name.and_then(|name| self.find_by_name(name)) {
            if spec.is_gateway || spec.is_local {
                return Some(spec);
            }
        }

        // 2. Auto-detect by api_key prefix / api_base keyword
        self.providers.iter().find(|spec| {
            let key_match = !spec.detect_by_key_prefix.is_empty()
                && api_key.is_some_and(|key| key.starts_with(&spec.detect_by_key_prefix));
            let base_match = !spec.detect_by_base_keyword.is_empty()
                && api_base.is_some_and(|base| base.contains(&spec.detect_by_base_keyword));
            key_match || base_match
        })
    }

    /// Find a provider by config field name
    pub fn find_by_name(&self, name: &str) -> Option<&ProviderSpec> {
        self.providers.iter().find(|spec| spec.name == name)
    }

    /// Split a `<provider>/model` string whose prefix names a known provider
    pub fn find_by_prefix(&self, model: &str) -> Option<(&ProviderSpec, String)> {
        let (prefix, rest) = model.split_once('/')?;
        self.find_by_name(prefix).map(|spec| (spec, rest.to_string()))
    }

    /// Pick the provider for a model string and return the model name to send.
    ///
    /// A `<provider>/` prefix naming a known provider wins and is stripped;
    /// otherwise the model keywords decide and the name is sent unchanged.
    pub fn resolve(&self, model: &str) -> Option<(&ProviderSpec, String)> {
        self.find_by_prefix(model).or_else(|| {
            self.find_by_model(model)
                .map(|spec| (spec, model.to_string()))
        })
    }

    fn default_providers() -> Vec<ProviderSpec> {
        let yaml = include_str!("providers.yaml");
        serde_yaml::from_str(yaml).expect("Failed to parse default providers configuration")
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
