//! Answer synthesis via a chat-completion model.
//!
//! The [`ChatModel`] trait is the seam between the query engine and the
//! language-model service. The production implementation calls the OpenAI
//! chat-completions API with the same retry policy as the embedding
//! backend. The context prompt lists retrieved chunks labeled with their
//! source file so the model can ground its answer.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::SourceChunk;

const SYSTEM_PROMPT: &str = "You are a document assistant. Answer the user's question using only \
the provided context. If the context does not contain the answer, say so.";

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// Build the user message: retrieved chunks as numbered context blocks,
/// each labeled with its source file, followed by the question.
pub fn build_context_prompt(question: &str, sources: &[SourceChunk]) -> String {
    let mut blocks = Vec::with_capacity(sources.len());
    for (i, src) in sources.iter().enumerate() {
        let label = src.file_name.as_deref().unwrap_or("unknown");
        blocks.push(format!("[{}] {}\n{}", i + 1, label, src.text));
    }

    let context = if blocks.is_empty() {
        "(no context found)".to_string()
    } else {
        blocks.join("\n\n")
    };

    format!(
        "Use the context below to answer the question.\n\nContext:\n{}\n\nQuestion: {}",
        context, question
    )
}

/// The shared system prompt for answer synthesis.
pub fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

// ============ OpenAI backend ============

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Chat backend using the OpenAI `POST /v1/chat/completions` endpoint.
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiChatModel {
    model: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let messages = [
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ];
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/chat/completions")
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: ChatResponse = response.json().await?;
                        let content = parsed
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message.content)
                            .ok_or_else(|| {
                                anyhow::anyhow!("chat response contained no message content")
                            })?;
                        return Ok(content);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("chat API error {}: {}", status, text));
                        continue;
                    }

                    let text = response.text().await.unwrap_or_default();
                    bail!("chat API error {}: {}", status, text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("chat completion failed after retries")))
    }
}
