//! Dotted/indexed path expressions over dynamic JSON values.
//!
//! ```text
//! path    := segment ("." segment)*
//! segment := name ("[" digits "]")?
//! ```
//!
//! Lookups never fail on missing data: an absent key, an out-of-range index
//! or a falsy value anywhere along the way resolves to "missing".

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^.\[\]]+)(?:\[(\d+)\])?$").expect("segment pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path expression")]
    Empty,
    #[error("malformed segment `{segment}` in path `{path}`")]
    Segment { path: String, segment: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub key: String,
    pub index: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    steps: Vec<Step>,
}

impl Path {
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let malformed = |segment: &str| PathError::Segment {
            path: path.to_string(),
            segment: segment.to_string(),
        };

        let mut steps = Vec::new();
        for segment in path.split('.') {
            let caps = SEGMENT.captures(segment).ok_or_else(|| malformed(segment))?;
            let index = match caps.get(2) {
                Some(digits) => Some(
                    digits
                        .as_str()
                        .parse::<usize>()
                        .map_err(|_| malformed(segment))?,
                ),
                None => None,
            };
            steps.push(Step {
                key: caps[1].to_string(),
                index,
            });
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Walk `root` step by step. Returns `None` when any step is absent or falsy.
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = present(root)?;
        for step in &self.steps {
            // Arrays and scalars have no named fields.
            let next = match current {
                Value::Object(map) => map.get(&step.key)?,
                _ => return None,
            };
            current = present(next)?;

            if let Some(index) = step.index {
                if let Value::Array(items) = current {
                    current = present(items.get(index)?)?;
                }
            }
        }
        Some(current)
    }

    pub fn lookup_or<'a>(&self, root: &'a Value, default: &'a Value) -> &'a Value {
        self.lookup(root).unwrap_or(default)
    }

    pub fn lookup_str<'a>(&self, root: &'a Value) -> Option<&'a str> {
        self.lookup(root).and_then(Value::as_str)
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&step.key)?;
            if let Some(index) = step.index {
                write!(f, "[{index}]")?;
            }
        }
        Ok(())
    }
}

/// Parse `path` and look it up in `root`.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Result<Option<&'a Value>, PathError> {
    Ok(Path::parse(path)?.lookup(root))
}

pub fn resolve_or<'a>(
    root: &'a Value,
    path: &str,
    default: &'a Value,
) -> Result<&'a Value, PathError> {
    Ok(Path::parse(path)?.lookup_or(root, default))
}

/// Falsy values count as missing.
fn present(value: &Value) -> Option<&Value> {
    let truthy = match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    };
    truthy.then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_mapping_matches_native_lookup() {
        let root = json!({"a": {"b": {"c": "deep"}}, "time": 1, "id": "1"});
        assert_eq!(resolve(&root, "a.b.c").unwrap(), Some(&root["a"]["b"]["c"]));
        assert_eq!(resolve(&root, "time").unwrap(), Some(&json!(1)));
        assert_eq!(resolve(&root, "id").unwrap(), Some(&json!("1")));
    }

    #[test]
    fn test_missing_or_falsy_returns_default() {
        let fallback = json!("X");
        let cases = [
            json!({}),
            json!({"a": {}}),
            json!({"a": {"b": {}}}),
            json!({"a": {"b": {"c": ""}}}),
            json!({"a": {"b": {"c": 0}}}),
            json!({"a": {"b": {"c": []}}}),
            json!({"a": {"b": {"c": false}}}),
            json!({"a": {"b": {"c": null}}}),
            json!({"a": 0}),
            json!({"a": ""}),
        ];
        for root in &cases {
            assert_eq!(
                resolve_or(root, "a.b.c", &fallback).unwrap(),
                &fallback,
                "root: {root}"
            );
        }
    }

    #[test]
    fn test_indexed_segment() {
        let root = json!({"list": [{"v": 1}, {"v": 2}]});
        assert_eq!(resolve(&root, "list[1].v").unwrap(), Some(&json!(2)));
        assert_eq!(resolve(&root, "list[0].v").unwrap(), Some(&json!(1)));
    }

    #[test]
    fn test_index_out_of_range_returns_default() {
        let root = json!({"list": [{"v": 1}]});
        let fallback = json!(-1);
        assert_eq!(resolve_or(&root, "list[5].v", &fallback).unwrap(), &fallback);
    }

    #[test]
    fn test_index_on_non_list_is_ignored() {
        let root = json!({"message": {"text": "Boo!"}});
        assert_eq!(
            resolve(&root, "message[3].text").unwrap(),
            Some(&json!("Boo!"))
        );
    }

    #[test]
    fn test_named_step_into_scalar_or_array_is_missing() {
        let root = json!({"a": "text", "list": [1, 2]});
        assert_eq!(resolve(&root, "a.len").unwrap(), None);
        assert_eq!(resolve(&root, "list.first").unwrap(), None);
    }

    #[test]
    fn test_falsy_root_is_missing() {
        assert_eq!(resolve(&json!(null), "a").unwrap(), None);
        assert_eq!(resolve(&json!({}), "a").unwrap(), None);
    }

    #[test]
    fn test_malformed_paths_are_rejected() {
        assert_eq!(Path::parse(""), Err(PathError::Empty));
        for bad in ["a..b", ".a", "a.", "[0]", "a[x]", "a[1]b", "a[99999999999999999999999]"] {
            assert!(
                matches!(Path::parse(bad), Err(PathError::Segment { .. })),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        let text = "choices[0].message.content";
        let path: Path = text.parse().unwrap();
        assert_eq!(path.to_string(), text);
        assert_eq!(
            path.steps()[0],
            Step {
                key: "choices".into(),
                index: Some(0)
            }
        );
    }

    #[test]
    fn test_lookup_str_only_yields_strings() {
        let root = json!({"message": {"role": "assistant", "tokens": 12}});
        let role = Path::parse("message.role").unwrap();
        let tokens = Path::parse("message.tokens").unwrap();
        assert_eq!(role.lookup_str(&root), Some("assistant"));
        assert_eq!(tokens.lookup_str(&root), None);
    }

    #[test]
    fn test_repeated_lookup_is_stable() {
        let root = json!({"choices": [{"message": {"content": "hi"}}]});
        let path = Path::parse("choices[0].message.content").unwrap();
        assert_eq!(path.lookup(&root), path.lookup(&root));
    }
}
