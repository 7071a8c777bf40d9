//! Configuration schema definitions

use crate::session::DEFAULT_SYSTEM_PROMPT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for parley
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Conversation settings
    #[serde(default)]
    pub agent: AgentConfig,
    /// Provider credentials and endpoints
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Days to keep rolled log files
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "~/.parley/logs".to_string()
}

fn default_retention_days() -> u64 {
    7
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            retention_days: default_retention_days(),
            overrides: HashMap::new(),
        }
    }
}

/// Conversation settings, fixed for the lifetime of the process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model name, optionally prefixed with a provider (`gemini/gemini-2.5-flash`)
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Reply token cap; the provider default applies when unset
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Seed message for every new session
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Maximum number of non-system messages sent as context; unset sends the whole log
    #[serde(default)]
    pub context_window: Option<usize>,
}

fn default_model() -> String {
    "gemini/gemini-2.5-flash".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            system_prompt: default_system_prompt(),
            context_window: None,
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub gemini: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub deepseek: ProviderConfig,
    #[serde(default)]
    pub groq: ProviderConfig,
    #[serde(default)]
    pub ollama: ProviderConfig,
    #[serde(default)]
    pub custom: ProviderConfig,
}

impl ProvidersConfig {
    /// Look up a provider section by its config key
    pub fn by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "gemini" => Some(&self.gemini),
            "openai" => Some(&self.openai),
            "openrouter" => Some(&self.openrouter),
            "deepseek" => Some(&self.deepseek),
            "groq" => Some(&self.groq),
            "ollama" => Some(&self.ollama),
            "custom" => Some(&self.custom),
            _ => None,
        }
    }

    /// Mutable variant of [`ProvidersConfig::by_name`]
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut ProviderConfig> {
        match name {
            "gemini" => Some(&mut self.gemini),
            "openai" => Some(&mut self.openai),
            "openrouter" => Some(&mut self.openrouter),
            "deepseek" => Some(&mut self.deepseek),
            "groq" => Some(&mut self.groq),
            "ollama" => Some(&mut self.ollama),
            "custom" => Some(&mut self.custom),
            _ => None,
        }
    }

    /// Config keys in display order
    pub fn names() -> &'static [&'static str] {
        &[
            "gemini",
            "openai",
            "openrouter",
            "deepseek",
            "groq",
            "ollama",
            "custom",
        ]
    }
}

/// Individual provider configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub extra_headers: Option<HashMap<String, String>>,
}
