// Patch-generation provider implementations: Anthropic, OpenAI, and custom
// HTTP endpoints.
#![allow(clippy::cast_precision_loss)]

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, RewireError};

use super::{PatchGenerator, TokenUsage};

/// Whole-file replacements need room; patch responses are much longer than
/// the summaries a chat default allows.
const MAX_PATCH_TOKENS: u32 = 8192;
const PATCH_TEMPERATURE: f64 = 0.3;

// ── Anthropic Provider ──────────────────────────────────────────────

#[derive(Debug)]
pub struct AnthropicGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicGenerator {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: "https://api.anthropic.com".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    usage: AnthropicUsage,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl PatchGenerator for AnthropicGenerator {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!("{}/v1/messages", self.base_url);

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_PATCH_TOKENS,
            temperature: PATCH_TEMPERATURE,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        debug!(model = %self.model, "Requesting patch from Anthropic API");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RewireError::Llm(LlmError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(RewireError::Llm(LlmError::ApiError { status, body: text }));
        }

        let result: AnthropicResponse = resp
            .json()
            .await
            .map_err(|e| RewireError::Llm(LlmError::Parse(e.to_string())))?;

        let text = result
            .content
            .first()
            .map(|c| c.text.clone())
            .unwrap_or_default();

        Ok((
            text,
            TokenUsage {
                input_tokens: result.usage.input_tokens,
                output_tokens: result.usage.output_tokens,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.model.contains("opus") {
            0.015
        } else if self.model.contains("haiku") {
            0.00025
        } else {
            0.003
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.model.contains("opus") {
            0.075
        } else if self.model.contains("haiku") {
            0.00125
        } else {
            0.015
        }
    }
}

// ── OpenAI Provider ─────────────────────────────────────────────────

#[derive(Debug)]
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: "https://api.openai.com".to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<OpenAiMessage>,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: OpenAiUsage,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait::async_trait]
#[allow(clippy::unnecessary_literal_bound)]
impl PatchGenerator for OpenAiGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> crate::error::Result<(String, TokenUsage)> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = OpenAiRequest {
            model: self.model.clone(),
            max_tokens: MAX_PATCH_TOKENS,
            temperature: PATCH_TEMPERATURE,
            messages: vec![OpenAiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        debug!(model = %self.model, "Requesting patch from OpenAI API");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RewireError::Llm(LlmError::Network(e.to_string())))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(RewireError::Llm(LlmError::ApiError { status, body: text }));
        }

        let result: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| RewireError::Llm(LlmError::Parse(e.to_string())))?;

        let text = result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok((
            text,
            TokenUsage {
                input_tokens: result.usage.prompt_tokens,
                output_tokens: result.usage.completion_tokens,
            },
        ))
    }

    fn cost_per_1k_input(&self) -> f64 {
        if self.model.contains("gpt-4o") {
            0.0025
        } else if self.model.contains("gpt-4") {
            0.03
        } else {
            0.0015
        }
    }

    fn cost_per_1k_output(&self) -> f64 {
        if self.model.contains("gpt-4o") {
            0.01
        } else if self.model.contains("gpt-4") {
            0.06
        } else {
            0.002
        }
    }
}

// ── Provider Factory ────────────────────────────────────────────────

/// Create a patch generator from configuration.
pub fn create_generator(
    provider: &str,
    model: &str,
    api_key: &str,
    base_url: Option<&str>,
) -> crate::error::Result<Box<dyn PatchGenerator>> {
    match provider {
        "anthropic" => {
            let mut p = AnthropicGenerator::new(api_key.to_string(), model.to_string());
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        "openai" | "custom" => {
            let mut p = OpenAiGenerator::new(api_key.to_string(), model.to_string());
            if let Some(url) = base_url {
                p = p.with_base_url(url.to_string());
            }
            Ok(Box::new(p))
        }
        other => Err(RewireError::Llm(LlmError::Config(format!(
            "Unknown provider: {other}. Use: anthropic, openai, custom"
        )))),
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // reqwest uses rustls with the `...no-provider` feature, so the process
    // default CryptoProvider must be installed before any `Client` is built or
    // `Client::new()` panics with "No provider set". Idempotent across the
    // parallel test threads — subsequent calls just return Err and are ignored.
    fn ensure_crypto_provider() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }

    #[test]
    fn factory_builds_known_providers() {
        ensure_crypto_provider();
        let anthropic = create_generator("anthropic", "claude-sonnet-4-20250514", "key", None);
        assert_eq!(anthropic.unwrap().name(), "anthropic");

        let openai = create_generator("openai", "gpt-4o", "key", None);
        assert_eq!(openai.unwrap().name(), "openai");
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        let err = create_generator("mystery", "model", "key", None).unwrap_err();
        assert!(matches!(err, RewireError::Llm(LlmError::Config(_))));
    }

    #[test]
    fn custom_provider_uses_openai_shape() {
        ensure_crypto_provider();
        let custom = create_generator("custom", "local-model", "key", Some("http://localhost:8080"));
        assert_eq!(custom.unwrap().model_id(), "local-model");
    }

    #[test]
    fn anthropic_cost_tiers_by_model() {
        ensure_crypto_provider();
        let p = AnthropicGenerator::new("key".into(), "claude-haiku-x".into());
        assert!(p.cost_per_1k_input() < 0.001);
        let p = AnthropicGenerator::new("key".into(), "claude-opus-x".into());
        assert!(p.cost_per_1k_output() > 0.05);
    }
}
