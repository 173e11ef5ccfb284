pub mod adapter;
pub mod openai;
pub mod provider;
pub mod response;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use adapter::Adapter;
pub use provider::{ModelId, Provider};
pub use response::{CompletionResponse, ResponseRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A plain-text message as sent over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// A completion backend. Implementations block the calling thread.
pub trait LLMClient: Send + Sync {
    fn completion(&self, model: &ModelId, messages: &[ChatMessage]) -> Result<CompletionResponse>;
}
