//! Completion response shapes and their normalization into a `{role, content}` record.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::path::Path;

static CONTENT_PATH: LazyLock<Path> =
    LazyLock::new(|| Path::parse("choices[0].message.content").expect("content path"));
static ROLE_PATH: LazyLock<Path> =
    LazyLock::new(|| Path::parse("choices[0].message.role").expect("role path"));

const DEFAULT_ROLE: &str = "assistant";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("unsupported completion response: {0}")]
    UnsupportedShape(String),
    #[error("completion response has no choices")]
    NoChoices,
}

/// Canonical response record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: AssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// The response shapes we know how to read.
#[derive(Clone, Debug, PartialEq)]
pub enum CompletionResponse {
    /// Strictly typed chat completion, read by field access.
    Typed(ChatCompletion),
    /// Anything else carrying `choices`, read through path lookups.
    Dynamic(Value),
}

impl CompletionResponse {
    pub fn from_value(value: Value) -> Result<Self, NormalizeError> {
        let Some(map) = value.as_object() else {
            return Err(NormalizeError::UnsupportedShape(format!(
                "expected an object, got {}",
                kind(&value)
            )));
        };
        if !map.contains_key("choices") {
            return Err(NormalizeError::UnsupportedShape(
                "object has no `choices` field".to_string(),
            ));
        }

        match ChatCompletion::deserialize(&value) {
            Ok(completion) => Ok(Self::Typed(completion)),
            Err(err) => {
                log::debug!("response is not a typed chat completion ({err}); reading it dynamically");
                Ok(Self::Dynamic(value))
            }
        }
    }

    pub fn is_typed(&self) -> bool {
        matches!(self, Self::Typed(_))
    }
}

pub fn normalize(response: &CompletionResponse) -> Result<ResponseRecord, NormalizeError> {
    match response {
        // Field access keeps `""`; the dynamic branch goes through the resolver, which treats it as missing.
        CompletionResponse::Typed(completion) => {
            let choice = completion.choices.first().ok_or(NormalizeError::NoChoices)?;
            Ok(ResponseRecord {
                role: choice.message.role.clone(),
                content: choice.message.content.clone(),
            })
        }
        CompletionResponse::Dynamic(value) => {
            let has_choices = value
                .get("choices")
                .and_then(Value::as_array)
                .is_some_and(|choices| !choices.is_empty());
            if !has_choices {
                return Err(NormalizeError::NoChoices);
            }
            Ok(ResponseRecord {
                role: ROLE_PATH
                    .lookup_str(value)
                    .unwrap_or(DEFAULT_ROLE)
                    .to_string(),
                content: CONTENT_PATH.lookup_str(value).map(str::to_string),
            })
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(role: &str, content: &str) -> ResponseRecord {
        ResponseRecord {
            role: role.into(),
            content: Some(content.into()),
        }
    }

    #[test]
    fn test_dynamic_shape_uses_paths() {
        // A non-numeric `index` keeps this out of the typed shape.
        let value = json!({
            "choices": [{"message": {"role": "assistant", "content": "hi"}, "index": "zero"}]
        });
        let response = CompletionResponse::from_value(value).unwrap();
        assert!(!response.is_typed());
        assert_eq!(normalize(&response).unwrap(), record("assistant", "hi"));
    }

    #[test]
    fn test_typed_shape_uses_fields() {
        let value = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hi"},
                "finish_reason": "stop"
            }]
        });
        let response = CompletionResponse::from_value(value).unwrap();
        assert!(response.is_typed());
        assert_eq!(normalize(&response).unwrap(), record("assistant", "hi"));
    }

    #[test]
    fn test_both_shapes_agree() {
        let typed = CompletionResponse::Typed(ChatCompletion {
            id: None,
            model: None,
            choices: vec![Choice {
                index: 0,
                message: AssistantMessage {
                    role: "assistant".into(),
                    content: Some("hi".into()),
                },
                finish_reason: None,
            }],
        });
        let dynamic = CompletionResponse::Dynamic(
            json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]}),
        );
        assert_eq!(normalize(&typed).unwrap(), normalize(&dynamic).unwrap());
    }

    #[test]
    fn test_normalize_is_repeatable() {
        let response = CompletionResponse::Dynamic(
            json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]}),
        );
        assert_eq!(normalize(&response), normalize(&response));
    }

    #[test]
    fn test_dynamic_empty_content_is_missing() {
        let response = CompletionResponse::Dynamic(
            json!({"choices": [{"message": {"content": ""}}]}),
        );
        let normalized = normalize(&response).unwrap();
        assert_eq!(normalized.role, "assistant");
        assert_eq!(normalized.content, None);
    }

    #[test]
    fn test_empty_content_differs_by_shape() {
        let body = json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": ""}}]});
        let typed = CompletionResponse::from_value(body.clone()).unwrap();
        assert!(typed.is_typed());
        assert_eq!(normalize(&typed).unwrap(), record("assistant", ""));

        let dynamic = CompletionResponse::Dynamic(body);
        assert_eq!(normalize(&dynamic).unwrap().content, None);
    }

    #[test]
    fn test_typed_null_content() {
        let value = json!({"choices": [{"message": {"role": "assistant", "content": null}}]});
        let response = CompletionResponse::from_value(value).unwrap();
        assert!(response.is_typed());
        assert_eq!(normalize(&response).unwrap().content, None);
    }

    #[test]
    fn test_unsupported_shapes() {
        for value in [json!("text"), json!([1, 2]), json!({"candidates": []})] {
            assert!(matches!(
                CompletionResponse::from_value(value),
                Err(NormalizeError::UnsupportedShape(_))
            ));
        }
    }

    #[test]
    fn test_no_choices() {
        let typed = CompletionResponse::from_value(json!({"choices": []})).unwrap();
        assert_eq!(normalize(&typed), Err(NormalizeError::NoChoices));

        let dynamic = CompletionResponse::Dynamic(json!({"choices": "none"}));
        assert_eq!(normalize(&dynamic), Err(NormalizeError::NoChoices));
    }
}
