//! Retrieval-augmented answering.
//!
//! [`answer_question`] retrieves the most relevant chunks, formats them
//! with [`format_context`], and asks a [`ChatModel`] to answer using only
//! that context.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::config::LlmConfig;
use crate::context::format_context;
use crate::embedding::post_json_with_retry;
use crate::models::{DocumentChunk, MetadataFilter};
use crate::store::VectorStore;

const OPENAI_BASE_URL: &str = "https://api.openai.com";

const SYSTEM_PROMPT: &str = "You answer questions about Berkshire Hathaway shareholder letters. \
Use only the provided context. Cite sources as [Source N]. \
If the context does not contain the answer, say that you do not know.";

/// A chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Complete a single-turn conversation.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// OpenAI `POST /v1/chat/completions`. Requires `OPENAI_API_KEY`.
pub struct OpenAIChat {
    model: String,
    temperature: f32,
    api_key: String,
    base_url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        let json = post_json_with_retry(
            &self.client,
            &format!("{}/v1/chat/completions", self.base_url),
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .context("Invalid chat response: missing choices[0].message.content")
}

/// Build the chat model named by `[llm].provider`.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        "disabled" => bail!("LLM provider is disabled. Set [llm].provider in config."),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// An answer and the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<DocumentChunk>,
}

/// Retrieve context for `question` and ask `chat` to answer it.
pub async fn answer_question(
    store: &VectorStore,
    chat: &dyn ChatModel,
    question: &str,
    top_k: usize,
    filter: Option<&MetadataFilter>,
) -> Result<Answer> {
    let sources = store.query(question, top_k, filter).await?;
    let context = format_context(&sources);
    let user = format!("Context:\n{}\n\nQuestion: {}", context, question);

    tracing::debug!(model = chat.model_name(), sources = sources.len(), "asking chat model");
    let answer = chat.complete(SYSTEM_PROMPT, &user).await?;
    Ok(Answer { answer, sources })
}
