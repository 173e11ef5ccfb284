use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;

use super::{ChatMessage, CompletionResponse, LLMClient, ModelId, Provider};
use crate::config::Config;
use crate::path;

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct OpenAIClient {
    client: Client,
    api_key: Option<String>,
    base_url: Option<String>,
}

#[derive(Serialize)]
struct OaiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

impl OpenAIClient {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url.filter(|u| !u.trim().is_empty()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(Some(config.api_key.clone()), config.base_url.clone())
    }

    fn endpoint(&self, provider: Provider) -> String {
        let base = match provider {
            Provider::OpenAi => self.base_url.clone().or_else(|| provider.env_base_url()),
            _ => provider.env_base_url(),
        }
        .unwrap_or_else(|| provider.default_base_url().to_string());
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }

    fn api_key(&self, provider: Provider) -> Option<String> {
        match provider {
            Provider::Ollama => None,
            _ => self.api_key.clone().or_else(|| provider.env_api_key()),
        }
    }
}

impl LLMClient for OpenAIClient {
    fn completion(&self, model: &ModelId, messages: &[ChatMessage]) -> Result<CompletionResponse> {
        let endpoint = self.endpoint(model.provider);
        let req = OaiRequest {
            model: &model.name,
            messages,
            stream: false,
        };

        log::info!("POST {endpoint} (model {model})");
        let mut builder = self.client.post(&endpoint).json(&req);
        if let Some(key) = self.api_key(model.provider) {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .with_context(|| format!("failed to call {endpoint}"))?;
        let status = response.status();
        let text = response.text().context("failed to read completion response")?;
        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| error_message(&body))
                .unwrap_or(text);
            bail!("{} returned {status}: {detail}", model.provider.prefix());
        }
        let body: Value =
            serde_json::from_str(&text).context("failed to decode completion response")?;

        let unknown = Value::Null;
        let served_by = path::resolve_or(&body, "model", &unknown)?;
        let response = CompletionResponse::from_value(body.clone())?;
        log::debug!(
            "{} response from {served_by}",
            if response.is_typed() { "typed" } else { "dynamic" }
        );
        Ok(response)
    }
}

/// `error.message` from an OpenAI-style error body.
fn error_message(body: &Value) -> Option<String> {
    path::resolve(body, "error.message")
        .ok()
        .flatten()
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_endpoint_prefers_configured_base_url_for_openai() {
        let client =
            OpenAIClient::new(None, Some("http://jarvis.local:8000/v1/".into())).unwrap();
        assert_eq!(
            client.endpoint(Provider::OpenAi),
            "http://jarvis.local:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_google_endpoint_ignores_openai_base_url() {
        let client = OpenAIClient::new(None, Some("http://jarvis.local/v1".into())).unwrap();
        assert_eq!(
            client.endpoint(Provider::Google),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );
    }

    #[test]
    fn test_ollama_never_sends_a_key() {
        let client = OpenAIClient::new(Some("secret".into()), None).unwrap();
        assert_eq!(client.api_key(Provider::Ollama), None);
        assert_eq!(client.api_key(Provider::OpenAi).as_deref(), Some("secret"));
    }

    #[test]
    fn test_blank_settings_are_dropped() {
        let client = OpenAIClient::new(Some("  ".into()), Some(String::new())).unwrap();
        assert!(client.api_key.is_none());
        assert!(client.base_url.is_none());
    }

    #[test]
    fn test_error_message_from_body() {
        let body = serde_json::json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        });
        assert_eq!(
            error_message(&body).as_deref(),
            Some("Incorrect API key provided")
        );
        assert_eq!(error_message(&serde_json::json!({"detail": "nope"})), None);
    }

    #[test]
    fn test_request_body() {
        let messages = [ChatMessage {
            role: Role::User,
            content: "Why is the sky blue".into(),
        }];
        let req = OaiRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            stream: false,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "Why is the sky blue"}],
                "stream": false
            })
        );
    }
}
