use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::write_json;
use crate::llm::Role;
use crate::render;

pub const USER_PREFIX: &str = "🧑 You: ";
pub const ASSISTANT_PREFIX: &str = "🤖 AI: ";
pub const UNEXPECTED_RESPONSE: &str = "Unexpected Response";

/// One transcript entry. `content` is HTML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
}

impl ChatEntry {
    pub fn user(message: &str) -> Self {
        Self {
            role: Role::User,
            content: format!("<p>{USER_PREFIX}{}</p>", render::escape_text(message)),
        }
    }

    pub fn assistant_html(html: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: format!("{ASSISTANT_PREFIX}{html}"),
        }
    }

    pub fn error(error: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: format!("<p>Error: {}</p>", render::escape_text(error)),
        }
    }

    /// Content as plain text without the `You:`/`AI:` display prefix.
    pub fn plain_text(&self) -> String {
        let (prefix, html) = match self.role {
            Role::User => (
                USER_PREFIX,
                self.content
                    .strip_prefix("<p>")
                    .and_then(|rest| rest.strip_prefix(USER_PREFIX))
                    .map(|rest| format!("<p>{rest}")),
            ),
            Role::Assistant => (
                ASSISTANT_PREFIX,
                self.content.strip_prefix(ASSISTANT_PREFIX).map(str::to_string),
            ),
            Role::System => ("", None),
        };
        let text = render::html_to_plain(html.as_deref().unwrap_or(&self.content));
        let text = text.trim();
        // Entries written by other clients may wrap the prefix differently.
        text.strip_prefix(prefix.trim_end())
            .unwrap_or(text)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TabError {
    #[error("a tab named `{0}` already exists")]
    Exists(String),
    #[error("no tab is open")]
    NoTab,
}

/// On-disk layout of a saved tab.
#[derive(Debug, Serialize, Deserialize)]
pub struct TabFile {
    #[serde(default = "default_tab_name")]
    pub tab_name: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub chat_history: Vec<ChatEntry>,
}

fn default_tab_name() -> String {
    "New Tab".to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TabId(u64);

/// Outcome of stepping through previously sent messages.
#[derive(Debug, PartialEq, Eq)]
pub enum HistoryNav {
    /// Nothing has been sent in this tab yet.
    Unavailable,
    /// `clamped` is set when the oldest message was already showing.
    Recall { text: String, clamped: bool },
    /// Stepped past the newest message; the input should be emptied.
    End,
}

#[derive(Debug)]
pub struct Tab {
    id: TabId,
    pub name: String,
    pub model: Option<String>,
    pub chat_history: Vec<ChatEntry>,
    history_index: Option<usize>,
    pending: usize,
}

impl Tab {
    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn push_user(&mut self, message: &str) {
        self.chat_history.push(ChatEntry::user(message));
        self.history_index = None;
        self.pending += 1;
    }

    /// Record the reply to an earlier `push_user`.
    pub fn push_reply(&mut self, entry: ChatEntry) {
        self.chat_history.push(entry);
        self.pending = self.pending.saturating_sub(1);
    }

    pub fn clear_history(&mut self) {
        self.chat_history.clear();
        self.history_index = None;
    }

    fn user_messages(&self) -> Vec<String> {
        self.chat_history
            .iter()
            .filter(|entry| entry.role == Role::User)
            .map(ChatEntry::plain_text)
            .collect()
    }

    /// `direction` is -1 for older, +1 for newer.
    pub fn navigate_history(&mut self, direction: isize) -> HistoryNav {
        let messages = self.user_messages();
        if messages.is_empty() {
            return HistoryNav::Unavailable;
        }

        let len = messages.len() as isize;
        let index = self.history_index.map_or(len, |i| i as isize) + direction;

        if index >= len {
            self.history_index = Some(messages.len());
            return HistoryNav::End;
        }
        let clamped = index < 0;
        let index = index.max(0) as usize;
        self.history_index = Some(index);
        HistoryNav::Recall {
            text: messages[index].clone(),
            clamped,
        }
    }

    fn to_file(&self) -> TabFile {
        TabFile {
            tab_name: self.name.clone(),
            model_name: self.model.clone(),
            chat_history: self.chat_history.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct TabSet {
    tabs: Vec<Tab>,
    current: usize,
    tab_count: usize,
    next_id: u64,
}

impl TabSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tab> {
        self.tabs.iter_mut()
    }

    pub fn names(&self) -> Vec<String> {
        self.tabs.iter().map(|t| t.name.clone()).collect()
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.tabs.is_empty()).then_some(self.current)
    }

    pub fn current(&self) -> Option<&Tab> {
        self.tabs.get(self.current)
    }

    pub fn current_mut(&mut self) -> Option<&mut Tab> {
        self.tabs.get_mut(self.current)
    }

    pub fn get_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id == id)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.tabs.iter().position(|t| t.name == name)
    }

    /// Adds and selects a tab. Unnamed tabs are numbered from a running counter.
    pub fn add(&mut self, name: Option<String>, model: Option<String>) -> Result<TabId, TabError> {
        self.tab_count += 1;
        let name = name.unwrap_or_else(|| format!("Tab {}", self.tab_count));
        if self.position(&name).is_some() {
            return Err(TabError::Exists(name));
        }

        let id = TabId(self.next_id);
        self.next_id += 1;
        self.tabs.push(Tab {
            id,
            name,
            model,
            chat_history: Vec::new(),
            history_index: None,
            pending: 0,
        });
        self.current = self.tabs.len() - 1;
        Ok(id)
    }

    /// Empty names are ignored. Returns whether the tab was renamed.
    pub fn rename_current(&mut self, new_name: &str) -> Result<bool, TabError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Ok(false);
        }
        if let Some(existing) = self.position(new_name) {
            if existing == self.current {
                return Ok(false);
            }
            return Err(TabError::Exists(new_name.to_string()));
        }
        let tab = self.current_mut().ok_or(TabError::NoTab)?;
        tab.name = new_name.to_string();
        Ok(true)
    }

    pub fn close_current(&mut self) -> Option<Tab> {
        if self.tabs.is_empty() {
            return None;
        }
        let closed = self.tabs.remove(self.current);
        if self.current >= self.tabs.len() {
            self.current = self.tabs.len().saturating_sub(1);
        }
        Some(closed)
    }

    pub fn clear_current_history(&mut self) -> Result<(), TabError> {
        self.current_mut().ok_or(TabError::NoTab)?.clear_history();
        Ok(())
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index < self.tabs.len() {
            self.current = index;
            true
        } else {
            false
        }
    }

    pub fn select_name(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => self.select(index),
            None => false,
        }
    }

    pub fn select_next(&mut self) {
        if !self.tabs.is_empty() {
            self.current = (self.current + 1) % self.tabs.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.tabs.is_empty() {
            self.current = (self.current + self.tabs.len() - 1) % self.tabs.len();
        }
    }

    /// Writes the current tab to `<dir>/<name>.json`.
    pub fn save_current(&self, dir: &Path) -> Result<PathBuf> {
        let tab = self.current().ok_or(TabError::NoTab)?;
        let path = dir.join(format!("{}.json", file_stem(&tab.name)));
        write_json(&path, &tab.to_file())
            .with_context(|| format!("Failed to save tab to {}", path.display()))?;
        log::info!("saved tab `{}` to {}", tab.name, path.display());
        Ok(path)
    }

    /// Loads a saved tab, replacing an open tab of the same name.
    pub fn open(&mut self, path: &Path) -> Result<TabId> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read tab file: {}", path.display()))?;
        let file: TabFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse tab file: {}", path.display()))?;

        if !self.select_name(&file.tab_name) {
            self.add(Some(file.tab_name.clone()), None)?;
        }
        let tab = self.current_mut().ok_or(TabError::NoTab)?;
        tab.model = file.model_name;
        tab.chat_history = file.chat_history;
        tab.history_index = None;
        log::info!(
            "opened tab `{}` with {} entries",
            tab.name,
            tab.chat_history.len()
        );
        Ok(tab.id)
    }
}

fn file_stem(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn tab_with_messages(messages: &[&str]) -> TabSet {
        let mut tabs = TabSet::new();
        tabs.add(None, None).unwrap();
        let tab = tabs.current_mut().unwrap();
        for message in messages {
            tab.push_user(message);
            tab.push_reply(ChatEntry::assistant_html("<p>ok</p>\n"));
        }
        tabs
    }

    #[test]
    fn test_add_numbers_and_selects_tabs() {
        let mut tabs = TabSet::new();
        tabs.add(None, Some("default_model".into())).unwrap();
        tabs.add(Some("Test Tab".into()), None).unwrap();
        tabs.add(None, None).unwrap();
        assert_eq!(tabs.names(), vec!["Tab 1", "Test Tab", "Tab 3"]);
        assert_eq!(tabs.current().unwrap().name, "Tab 3");
        tabs.select(0);
        assert_eq!(tabs.current().unwrap().model.as_deref(), Some("default_model"));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut tabs = TabSet::new();
        tabs.add(Some("Tab 1".into()), None).unwrap();
        assert_eq!(
            tabs.add(Some("Tab 1".into()), None),
            Err(TabError::Exists("Tab 1".into()))
        );
        tabs.add(Some("Notes".into()), None).unwrap();
        assert_eq!(
            tabs.rename_current("Tab 1"),
            Err(TabError::Exists("Tab 1".into()))
        );
        assert_eq!(tabs.rename_current("  "), Ok(false));
        assert_eq!(tabs.rename_current("Ideas"), Ok(true));
        assert_eq!(tabs.names(), vec!["Tab 1", "Ideas"]);
    }

    #[test]
    fn test_close_selects_neighbour() {
        let mut tabs = TabSet::new();
        for name in ["a", "b", "c"] {
            tabs.add(Some(name.into()), None).unwrap();
        }
        tabs.select(2);
        assert_eq!(tabs.close_current().unwrap().name, "c");
        assert_eq!(tabs.current().unwrap().name, "b");
        tabs.select(0);
        tabs.close_current();
        assert_eq!(tabs.current().unwrap().name, "b");
        tabs.close_current();
        assert!(tabs.current().is_none());
        assert!(tabs.close_current().is_none());
    }

    #[test]
    fn test_next_prev_wrap() {
        let mut tabs = TabSet::new();
        for name in ["a", "b"] {
            tabs.add(Some(name.into()), None).unwrap();
        }
        tabs.select_next();
        assert_eq!(tabs.current_index(), Some(0));
        tabs.select_prev();
        assert_eq!(tabs.current_index(), Some(1));
    }

    #[test]
    fn test_history_navigation() {
        let mut tabs = tab_with_messages(&["first", "second"]);
        let tab = tabs.current_mut().unwrap();

        let recall = |text: &str, clamped| HistoryNav::Recall {
            text: text.into(),
            clamped,
        };
        assert_eq!(tab.navigate_history(-1), recall("second", false));
        assert_eq!(tab.navigate_history(-1), recall("first", false));
        assert_eq!(tab.navigate_history(-1), recall("first", true));
        assert_eq!(tab.navigate_history(1), recall("second", false));
        assert_eq!(tab.navigate_history(1), HistoryNav::End);
        assert_eq!(tab.navigate_history(1), HistoryNav::End);
        assert_eq!(tab.navigate_history(-1), recall("second", false));
    }

    #[test]
    fn test_recall_keeps_literal_markup() {
        let mut tabs = tab_with_messages(&["wrap it in <div> tags", "<b>bold</b> & co"]);
        let tab = tabs.current_mut().unwrap();
        assert_eq!(
            tab.chat_history[0].content,
            "<p>🧑 You: wrap it in &lt;div&gt; tags</p>"
        );
        assert!(matches!(
            tab.navigate_history(-1),
            HistoryNav::Recall { ref text, .. } if text == "<b>bold</b> & co"
        ));
        assert!(matches!(
            tab.navigate_history(-1),
            HistoryNav::Recall { ref text, .. } if text == "wrap it in <div> tags"
        ));
    }

    #[test]
    fn test_plain_text_drops_display_prefixes() {
        let reply = ChatEntry::assistant_html(&render::markdown_to_html("Hello **there**"));
        assert_eq!(reply.plain_text(), "Hello **there**");
        assert_eq!(ChatEntry::user("hi there").plain_text(), "hi there");
        assert_eq!(ChatEntry::error("timed out").plain_text(), "Error: timed out");

        // Saved by an older build, with the prefix outside the paragraph.
        let legacy = ChatEntry {
            role: Role::Assistant,
            content: "<p>🤖 AI: Sure.</p>".into(),
        };
        assert_eq!(legacy.plain_text(), "Sure.");
    }

    #[test]
    fn test_history_navigation_without_messages() {
        let mut tabs = tab_with_messages(&[]);
        assert_eq!(
            tabs.current_mut().unwrap().navigate_history(-1),
            HistoryNav::Unavailable
        );
    }

    #[test]
    fn test_sending_resets_history_cursor() {
        let mut tabs = tab_with_messages(&["first"]);
        let tab = tabs.current_mut().unwrap();
        tab.navigate_history(-1);
        tab.push_user("again");
        assert_eq!(tab.pending(), 1);
        assert!(matches!(
            tab.navigate_history(-1),
            HistoryNav::Recall { ref text, .. } if text == "again"
        ));
    }

    #[test]
    fn test_save_and_open_round_trip() {
        let dir = tempdir().unwrap();
        let mut tabs = tab_with_messages(&["hello"]);
        tabs.rename_current("Test Tab").unwrap();
        tabs.current_mut().unwrap().model = Some("test_model".into());
        let path = tabs.save_current(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("Test Tab.json"));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["tab_name"], json!("Test Tab"));
        assert_eq!(written["model_name"], json!("test_model"));
        assert_eq!(
            written["chat_history"][0],
            json!({"role": "user", "content": "<p>🧑 You: hello</p>"})
        );

        let mut fresh = TabSet::new();
        fresh.add(None, None).unwrap();
        fresh.open(&path).unwrap();
        assert_eq!(fresh.names(), vec!["Tab 1", "Test Tab"]);
        let tab = fresh.current().unwrap();
        assert_eq!(tab.model.as_deref(), Some("test_model"));
        assert_eq!(tab.chat_history.len(), 2);
    }

    #[test]
    fn test_open_replaces_existing_tab() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("saved.json");
        fs::write(
            &path,
            json!({
                "tab_name": "Tab 1",
                "model_name": "ollama:gemma3:latest",
                "chat_history": [{"role": "user", "content": "<p>🧑 You: hi</p>"}]
            })
            .to_string(),
        )
        .unwrap();

        let mut tabs = tab_with_messages(&["one", "two"]);
        tabs.add(Some("Other".into()), None).unwrap();
        tabs.open(&path).unwrap();
        assert_eq!(tabs.len(), 2);
        let tab = tabs.current().unwrap();
        assert_eq!(tab.name, "Tab 1");
        assert_eq!(tab.chat_history.len(), 1);
    }

    #[test]
    fn test_open_defaults_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bare.json");
        fs::write(&path, "{}").unwrap();
        let mut tabs = TabSet::new();
        tabs.open(&path).unwrap();
        assert_eq!(tabs.current().unwrap().name, "New Tab");
        assert!(tabs.current().unwrap().chat_history.is_empty());
    }

    #[test]
    fn test_tab_name_cannot_escape_directory() {
        let dir = tempdir().unwrap();
        let mut tabs = TabSet::new();
        tabs.add(Some("../evil".into()), None).unwrap();
        let path = tabs.save_current(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(".._evil.json"));
    }
}
