//! LLM provider integrations for parley
//!
//! Every supported backend is reached through an OpenAI-compatible
//! `/chat/completions` endpoint; the registry maps model names to endpoints.

pub mod base;
pub mod openai_compat;
pub mod registry;

pub use base::{LLMProvider, LLMResponse, Message, ProviderError, ProviderResult, Role};
pub use openai_compat::{route_model, OpenAiCompatClient, ProviderRoute};
pub use registry::{ProviderRegistry, ProviderSpec};
