use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::llm::Adapter;

pub const DEFAULT_FONT_SIZE: u32 = 12;
pub const FONT_SIZES: [u32; 6] = [10, 12, 14, 16, 18, 20];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserModel {
    pub display_name: String,
    pub full_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: String,
    /// Model given to newly opened tabs.
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_active_tabs")]
    pub active_tabs: Vec<String>,
    #[serde(default = "default_user_models", deserialize_with = "user_models_or_default")]
    pub user_models: Vec<UserModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<Adapter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Keys we don't know about survive a load/save cycle.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: String::new(),
            font_size: DEFAULT_FONT_SIZE,
            active_tabs: default_active_tabs(),
            user_models: default_user_models(),
            base_url: None,
            adapter: None,
            language: None,
            extra: Map::new(),
        }
    }
}

fn default_font_size() -> u32 {
    DEFAULT_FONT_SIZE
}

fn default_active_tabs() -> Vec<String> {
    vec!["Tab 1".to_string()]
}

fn default_user_models() -> Vec<UserModel> {
    vec![
        UserModel {
            display_name: "Gemini 1.0 Pro".to_string(),
            full_name: "models/gemini-1.0-pro".to_string(),
        },
        UserModel {
            display_name: "Gemini 1.5 Pro".to_string(),
            full_name: "models/gemini-1.5-pro-latest".to_string(),
        },
    ]
}

/// Anything other than a non-empty list of model objects falls back to the defaults.
fn user_models_or_default<'de, D>(deserializer: D) -> Result<Vec<UserModel>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let usable = value
        .as_array()
        .and_then(|items| items.first())
        .is_some_and(Value::is_object);
    if !usable {
        return Ok(default_user_models());
    }
    Ok(serde_json::from_value(value).unwrap_or_else(|err| {
        log::warn!("ignoring malformed user_models: {err}");
        default_user_models()
    }))
}

impl Config {
    /// `$MYCHATUI_CONFIG`, else `<config dir>/mychatui/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = env::var("MYCHATUI_CONFIG") {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        let config_dir = dirs::config_dir().context("could not determine the config directory")?;
        Ok(config_dir.join("mychatui").join("config.json"))
    }

    /// Missing files yield the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        log::info!("saved config to {}", path.display());
        Ok(())
    }

    pub fn display_name_for(&self, full_name: &str) -> Option<&str> {
        self.user_models
            .iter()
            .find(|m| m.full_name == full_name)
            .map(|m| m.display_name.as_str())
    }

    pub fn full_name_for(&self, display_name: &str) -> Option<&str> {
        self.user_models
            .iter()
            .find(|m| m.display_name == display_name)
            .map(|m| m.full_name.as_str())
    }

    /// Accepts a display name, a known full name, or a raw model id.
    pub fn resolve_model<'a>(&'a self, name: &'a str) -> &'a str {
        self.full_name_for(name).unwrap_or(name)
    }

    pub fn default_model(&self) -> Option<String> {
        let model = self.model.trim();
        (!model.is_empty()).then(|| model.to_string())
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "api_key" => self.api_key = value.to_string(),
            "model" => self.model = self.resolve_model(value).to_string(),
            "font_size" => {
                let size: u32 = value
                    .parse()
                    .with_context(|| format!("font_size must be a number, got `{value}`"))?;
                if !FONT_SIZES.contains(&size) {
                    bail!("font_size must be one of {FONT_SIZES:?}");
                }
                self.font_size = size;
            }
            "base_url" => self.base_url = (!value.is_empty()).then(|| value.to_string()),
            "adapter" => {
                self.adapter = Some(value.parse().map_err(anyhow::Error::msg)?);
            }
            "language" => self.language = (!value.is_empty()).then(|| value.to_string()),
            other => bail!(
                "unknown preference `{other}` (api_key, model, font_size, base_url, adapter, language)"
            ),
        }
        Ok(())
    }
}

/// Pretty-print `value` with 4-space indents into a temp file beside `path`, then move it in place.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');

    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new_in(".")?,
    };
    temp_file.write_all(&buf)?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}
