use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::response::{self, CompletionResponse, NormalizeError, ResponseRecord};
use super::{ChatMessage, LLMClient, ModelId, Role};
use crate::tabs::ChatEntry;

/// How completion responses are translated into chat history records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Adapter {
    /// Accepts both the typed and the dynamic response shape.
    AiSuite,
    /// Typed responses only; the role is always `assistant`.
    #[default]
    AnyLlm,
}

impl Adapter {
    pub fn as_str(self) -> &'static str {
        match self {
            Adapter::AiSuite => "aisuite",
            Adapter::AnyLlm => "anyllm",
        }
    }

    /// Turn the HTML transcript into plain wire messages.
    pub fn chat_history(&self, entries: &[ChatEntry]) -> Vec<ChatMessage> {
        entries
            .iter()
            .filter_map(|entry| {
                let content = entry.plain_text();
                (!content.is_empty()).then(|| ChatMessage {
                    role: entry.role,
                    content,
                })
            })
            .collect()
    }

    pub fn response(&self, response: &CompletionResponse) -> Result<ResponseRecord, NormalizeError> {
        match (self, response) {
            (Adapter::AiSuite, _) => response::normalize(response),
            (Adapter::AnyLlm, CompletionResponse::Typed(_)) => {
                let record = response::normalize(response)?;
                Ok(ResponseRecord {
                    role: Role::Assistant.as_str().to_string(),
                    content: record.content,
                })
            }
            (Adapter::AnyLlm, CompletionResponse::Dynamic(_)) => Err(
                NormalizeError::UnsupportedShape("anyllm expects a typed chat completion".into()),
            ),
        }
    }

    pub fn completion(
        &self,
        client: &dyn LLMClient,
        model: &ModelId,
        entries: &[ChatEntry],
    ) -> Result<ResponseRecord> {
        let messages = self.chat_history(entries);
        log::debug!(
            "{}: sending {} messages to {}",
            self.as_str(),
            messages.len(),
            model
        );
        let response = client.completion(model, &messages)?;
        let record = self
            .response(&response)
            .with_context(|| format!("failed to read the response from {model}"))?;
        log::debug!("{}: role={} content={:?}", self.as_str(), record.role, record.content);
        Ok(record)
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Adapter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aisuite" => Ok(Adapter::AiSuite),
            "anyllm" | "any-llm" => Ok(Adapter::AnyLlm),
            other => Err(format!("unknown adapter `{other}` (expected aisuite or anyllm)")),
        }
    }
}
