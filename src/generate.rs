//! Answer generation over an assembled context.
//!
//! The model sits behind [`Generator`]. [`OpenAiCompatibleGenerator`] talks
//! to any chat-completions endpoint; [`answer`] wires a context bundle and a
//! question into a prompt and never fails: a model that cannot be reached
//! yields [`GENERATION_FAILED`] instead.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::models::ContextBundle;
use crate::retry::{Failure, RetryPolicy};

/// Answer text returned when generation fails after all retries.
pub const GENERATION_FAILED: &str = "generation failed";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a careful assistant that answers questions \
about office documents. Use only the provided context, which consists of excerpts tagged with \
their source file and sheet. If the context does not contain the answer, say so. Cite the \
sources you used.";

/// A text generation backend.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}

/// Stand-in used when `[generation] provider = "disabled"`; every call fails.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
        bail!("generation is disabled; set [generation] provider in config")
    }
}

/// Chat-completions client (OpenAI wire format).
pub struct OpenAiCompatibleGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    policy: RetryPolicy,
}

impl OpenAiCompatibleGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model,
            api_key: std::env::var(&config.api_key_env).ok(),
            policy: RetryPolicy::new(config.max_retries, Duration::from_secs(config.backoff_secs)),
        })
    }

    async fn attempt(&self, body: &serde_json::Value) -> std::result::Result<String, Failure> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| Failure::Retry(e.into()))?;
        let status = response.status();

        if status.is_success() {
            let json: serde_json::Value = response
                .json()
                .await
                .map_err(|e| Failure::Retry(e.into()))?;
            return parse_chat_response(&json).map_err(Failure::Abort);
        }

        let body_text = response.text().await.unwrap_or_default();
        let err = anyhow::anyhow!("generation API error {}: {}", status, body_text);
        // Rate limited or server error: retry. Other client errors: give up.
        if status.as_u16() == 429 || status.is_server_error() {
            Err(Failure::Retry(err))
        } else {
            Err(Failure::Abort(err))
        }
    }
}

#[async_trait]
impl Generator for OpenAiCompatibleGenerator {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "stream": false,
        });
        let body = &body;
        self.policy
            .run("generate", move || async move { self.attempt(body).await })
            .await
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
pub fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Build the generator configured in `[generation]`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAiCompatibleGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// User message: the context, then the question.
pub fn user_prompt(context: &str, question: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nAnswer using only the context above.",
        context, question
    )
}

/// Outcome of [`answer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    /// Whether the model was asked at all.
    pub generated: bool,
}

/// Answer `question` from `bundle`. A not-found bundle is returned as-is
/// without calling the model.
pub async fn answer(
    generator: &dyn Generator,
    system_prompt: &str,
    question: &str,
    bundle: &ContextBundle,
) -> Answer {
    if bundle.is_not_found() {
        return Answer {
            text: bundle.context.clone(),
            generated: false,
        };
    }

    match generator
        .generate(system_prompt, &user_prompt(&bundle.context, question))
        .await
    {
        Ok(text) => Answer {
            text,
            generated: true,
        },
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "generation failed");
            Answer {
                text: GENERATION_FAILED.to_string(),
                generated: true,
            }
        }
    }
}
