use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Ollama,
    Google,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelIdError {
    #[error("model name is empty")]
    Empty,
    #[error("unknown provider `{0}` (expected openai, ollama or google)")]
    UnknownProvider(String),
}

impl Provider {
    pub fn prefix(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
            Provider::Google => "google",
        }
    }

    /// OpenAI-compatible endpoint root.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    pub fn base_url_env(self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_URL"),
            Provider::Ollama => Some("OLLAMA_API_URL"),
            Provider::Google => None,
        }
    }

    pub fn api_key_envs(self) -> &'static [&'static str] {
        match self {
            Provider::OpenAi => &["OPENAI_API_KEY"],
            Provider::Ollama => &[],
            Provider::Google => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        }
    }

    pub fn env_base_url(self) -> Option<String> {
        self.base_url_env()
            .and_then(|var| env::var(var).ok())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn env_api_key(self) -> Option<String> {
        self.api_key_envs()
            .iter()
            .find_map(|var| env::var(var).ok().filter(|v| !v.trim().is_empty()))
    }
}

impl FromStr for Provider {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            "google" | "gemini" | "googlegenai" => Ok(Provider::Google),
            other => Err(ModelIdError::UnknownProvider(other.to_string())),
        }
    }
}

/// `provider:name`, e.g. `ollama:qwen2.5:latest`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelId {
    pub provider: Provider,
    pub name: String,
}

impl FromStr for ModelId {
    type Err = ModelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ModelIdError::Empty);
        }

        // Only the first colon separates the provider; tags like `:latest` belong to the name.
        if let Some((prefix, name)) = s.split_once(':') {
            if !prefix.contains('/') {
                if name.is_empty() {
                    return Err(ModelIdError::Empty);
                }
                return Ok(Self {
                    provider: prefix.parse()?,
                    name: name.to_string(),
                });
            }
        }

        let provider = if s.starts_with("models/") {
            Provider::Google
        } else {
            Provider::OpenAi
        };
        Ok(Self {
            provider,
            name: s.to_string(),
        })
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider.prefix(), self.name)
    }
}
