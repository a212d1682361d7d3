//! Chat model client
//!
//! Thin boundary over an OpenAI-compatible completion endpoint. The trait
//! exists so the pipeline can run against [`MockModel`] in tests without a
//! network or an API key.

use crate::chat::types::ChatMessage;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one completion: system instruction plus the conversation so far,
    /// returning the raw assistant text.
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;
}

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl OpenAiClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<String> {
        let mut payload = Vec::with_capacity(messages.len() + 1);
        payload.push(ChatMessage {
            role: "system".into(),
            content: system.to_string(),
        });
        payload.extend(messages.iter().cloned());

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages: payload,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Store(format!(
                "model endpoint returned {}",
                resp.status()
            )));
        }

        let body: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| Error::UpstreamParse(format!("malformed completion response: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::UpstreamParse("completion had no choices".into()))
    }
}

/// Canned-reply model for tests. Counts calls so tests can assert the
/// greeting path never reaches the model.
pub struct MockModel {
    reply: String,
    calls: AtomicUsize,
}

impl MockModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn complete(&self, _system: &str, _messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_the_tuned_completion_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "temperature": 0.7,
                "max_tokens": 500,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "pronto" } }]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&server.uri(), "sk-test", "gpt-3.5-turbo", 0.7, 500);
        let reply = client
            .complete("instrução", &[ChatMessage::user("oi")])
            .await
            .unwrap();
        assert_eq!(reply, "pronto");
    }

    #[tokio::test]
    async fn empty_choices_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = OpenAiClient::new(&server.uri(), "sk-test", "gpt-3.5-turbo", 0.7, 500);
        let err = client.complete("instrução", &[]).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamParse(_)));
    }

    #[tokio::test]
    async fn mock_model_counts_calls() {
        let model = MockModel::new("ok");
        assert_eq!(model.call_count(), 0);
        model.complete("", &[]).await.unwrap();
        model.complete("", &[]).await.unwrap();
        assert_eq!(model.call_count(), 2);
    }
}
