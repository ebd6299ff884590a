use crate::llm::{LlmClient, Provider, TextRequest};

const DEFAULT_RESPONSE: &str = "LLM_PROVIDER=mock. No API call was made.";

#[derive(Debug, Clone)]
pub struct MockClient {
    response: String,
}

impl MockClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE)
    }
}

#[async_trait::async_trait]
impl LlmClient for MockClient {
    fn provider(&self) -> Provider {
        Provider::Mock
    }

    async fn generate_text(&self, request: TextRequest) -> anyhow::Result<String> {
        tracing::debug!(prompt_chars = request.prompt.len(), "mock LLM request");
        Ok(self.response.clone())
    }
}
