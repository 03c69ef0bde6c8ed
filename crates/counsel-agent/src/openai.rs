use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use counsel_core::{
    agent::LlmBackend,
    types::{ChatMessage, Role},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Calls an OpenAI-compatible chat-completions API for one agent role.
///
/// Each role gets its own instance (model + temperature), constructed once
/// at process start and injected into the pipeline.
pub struct OpenAiBackend {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl OpenAiBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
            timeout_secs: 120,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::SystemContext => "system",
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        if !system_prompt.is_empty() {
            wire.push(WireMessage { role: "system", content: system_prompt });
        }
        // Context turns are filtered upstream; skip any stragglers so they
        // can never reach the model.
        for msg in messages.iter().filter(|m| m.role != Role::SystemContext) {
            wire.push(WireMessage { role: wire_role(msg.role), content: &msg.content });
        }

        let request_body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: wire,
        };

        info!(
            model = %self.model,
            messages = messages.len(),
            "calling chat completions API"
        );

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()?;

        let response = client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .with_context(|| format!("chat completions request to {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "chat completions returned non-200: {}", body);
            bail!("chat completions error {status}: {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to parse chat completions response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.is_empty() {
            bail!("chat completions returned an empty completion");
        }

        info!(model = %self.model, output_len = content.len(), "completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_role_mapping() {
        assert_eq!(wire_role(Role::User), "user");
        assert_eq!(wire_role(Role::Assistant), "assistant");
        assert_eq!(wire_role(Role::SystemContext), "system");
    }

    #[test]
    fn response_parses_standard_shape() {
        let json = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "hello"}}
            ]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
    }

    #[test]
    fn response_tolerates_null_content() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn request_serializes_roles_and_temperature() {
        let req = ChatRequest {
            model: "gpt-4o-mini",
            temperature: 0.3,
            messages: vec![
                WireMessage { role: "system", content: "sys" },
                WireMessage { role: "user", content: "hi" },
            ],
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "gpt-4o-mini");
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "hi");
    }
}
