use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{LlmClient, Provider, TextRequest};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIN_RETRY_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        let Some(api_key) = settings.openai_api_key.clone() else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.llm_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Some(Self {
            http,
            api_key,
            endpoint: settings.openai_base_url.clone(),
            model: settings.openai_model.clone(),
        }))
    }

    async fn create_response(
        &self,
        req: &CreateResponseRequest<'_>,
    ) -> anyhow::Result<(serde_json::Value, CreateResponseResponse)> {
        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read OpenAI response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse OpenAI response JSON: {text}"))?;
        let parsed = serde_json::from_value::<CreateResponseResponse>(raw_json.clone())
            .context("failed to decode OpenAI response into CreateResponseResponse")?;
        Ok((raw_json, parsed))
    }

    /// Prefers the top-level `output_text` some proxies add, else joins the text parts of
    /// every `message` output item.
    fn response_text(res: &CreateResponseResponse) -> String {
        if let Some(text) = res.output_text.as_deref().filter(|t| !t.is_empty()) {
            return text.to_string();
        }

        let parts: Vec<&str> = res
            .output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|c| c.kind == "output_text" || c.kind == "text")
            .filter_map(|c| c.text.as_deref())
            .collect();
        parts.join("\n").trim().to_string()
    }

    fn hit_token_limit(res: &CreateResponseResponse) -> bool {
        res.status.as_deref() == Some("incomplete")
            && res
                .incomplete_details
                .as_ref()
                .and_then(|d| d.reason.as_deref())
                == Some("max_output_tokens")
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn generate_text(&self, input: TextRequest) -> anyhow::Result<String> {
        let make_req = |max_output_tokens: u32| CreateResponseRequest {
            model: &self.model,
            input: &input.prompt,
            instructions: input.system.as_deref(),
            max_output_tokens,
        };

        let (mut raw_json, mut res) = self.create_response(&make_req(input.max_tokens)).await?;

        if Self::hit_token_limit(&res) {
            let bumped = input.max_tokens.saturating_mul(2).max(MIN_RETRY_MAX_TOKENS);
            tracing::warn!(
                model = %self.model,
                from = input.max_tokens,
                to = bumped,
                "OpenAI response incomplete (max_output_tokens); retrying once with higher limit"
            );
            let (rj, r) = self.create_response(&make_req(bumped)).await?;
            raw_json = rj;
            res = r;
        }

        let text = Self::response_text(&res);
        if text.is_empty() {
            return Err(LlmDiagnosticsError {
                provider: Provider::OpenAI,
                stage: "empty_output",
                detail: format!("response contained no text output (status={:?})", res.status),
                raw_output: None,
                raw_response_json: Some(raw_json),
            }
            .into());
        }
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct CreateResponseRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateResponseResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    incomplete_details: Option<IncompleteDetails>,
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct IncompleteDetails {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}
