pub mod anthropic;
pub mod error;
pub mod extract;
pub mod mock;
pub mod openai;
pub mod prompts;

use crate::config::Settings;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
    Mock,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAI => "openai",
            Provider::Mock => "mock",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAI),
            "mock" => Ok(Provider::Mock),
            other => anyhow::bail!("unknown LLM provider: {other:?}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn generate_text(&self, request: TextRequest) -> anyhow::Result<String>;
}

/// Builds the configured client. `Ok(None)` means the provider is unknown or its API key
/// is not set; callers fall back to placeholder output.
pub fn from_settings(settings: &Settings) -> anyhow::Result<Option<Box<dyn LlmClient>>> {
    let provider = match settings.llm_provider.parse::<Provider>() {
        Ok(provider) => provider,
        Err(err) => {
            tracing::warn!(error = %err, "LLM disabled");
            return Ok(None);
        }
    };

    let client: Box<dyn LlmClient> = match provider {
        Provider::Anthropic => match anthropic::AnthropicClient::from_settings(settings)? {
            Some(client) => Box::new(client),
            None => return Ok(None),
        },
        Provider::OpenAI => match openai::OpenAiClient::from_settings(settings)? {
            Some(client) => Box::new(client),
            None => return Ok(None),
        },
        Provider::Mock => Box::new(mock::MockClient::default()),
    };

    tracing::debug!(provider = %provider, "LLM client configured");
    Ok(Some(client))
}
