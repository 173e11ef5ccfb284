use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::commands::{COMMANDS, Command, Input, parse_input};
use crate::config::Config;
use crate::i18n::{Language, MessageKey, t};
use crate::llm::{Adapter, LLMClient, ModelId, ResponseRecord};
use crate::render;
use crate::tabs::{ChatEntry, HistoryNav, Tab, TabId, TabSet, UNEXPECTED_RESPONSE};

/// Builds the completion client; called again when connection preferences change.
pub type ClientFactory = Box<dyn Fn(&Config) -> Result<Arc<dyn LLMClient>>>;

/// Result of one background completion, posted back to the UI thread.
#[derive(Debug)]
pub struct WorkerEvent {
    pub tab: TabId,
    pub outcome: Result<ResponseRecord, String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Repaint the whole screen.
    Redraw,
    Quit,
}

pub struct ChatApp {
    config: Config,
    config_path: PathBuf,
    tabs: TabSet,
    adapter: Adapter,
    lang: Language,
    client: Arc<dyn LLMClient>,
    client_factory: ClientFactory,
    tx: Sender<WorkerEvent>,
    rx: Receiver<WorkerEvent>,
    notice: Vec<String>,
}

impl ChatApp {
    pub fn new(config: Config, config_path: PathBuf, client_factory: ClientFactory) -> Result<Self> {
        let client = client_factory(&config)?;
        let adapter = config.adapter.unwrap_or_default();
        let lang = Language::detect(config.language.as_deref());

        let mut tabs = TabSet::new();
        for name in &config.active_tabs {
            if let Err(err) = tabs.add(Some(name.clone()), config.default_model()) {
                log::warn!("skipping tab from config: {err}");
            }
        }
        if tabs.is_empty() {
            tabs.add(None, config.default_model())?;
        }
        log::info!("opened {} tabs, adapter {adapter}", tabs.len());

        let (tx, rx) = mpsc::channel();
        Ok(Self {
            config,
            config_path,
            tabs,
            adapter,
            lang,
            client,
            client_factory,
            tx,
            rx,
            notice: Vec::new(),
        })
    }

    pub fn set_adapter(&mut self, adapter: Adapter) {
        self.adapter = adapter;
    }

    /// Point every open tab at `model` without touching the saved default.
    pub fn set_startup_model(&mut self, model: &str) {
        let model = self.config.resolve_model(model).to_string();
        for tab in self.tabs.iter_mut() {
            tab.model = Some(model.clone());
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tabs(&self) -> &TabSet {
        &self.tabs
    }

    pub fn lang(&self) -> Language {
        self.lang
    }

    pub fn notice(&self) -> &[String] {
        &self.notice
    }

    pub fn pending(&self) -> usize {
        self.tabs.iter().map(Tab::pending).sum()
    }

    /// Display name of the current tab's model, falling back to the raw id.
    pub fn current_model_label(&self) -> &str {
        match self.tabs.current().and_then(|tab| tab.model.as_deref()) {
            Some(model) if !model.is_empty() => self.config.display_name_for(model).unwrap_or(model),
            _ => t(&self.lang, MessageKey::NoModelLabel),
        }
    }

    fn say(&mut self, line: impl Into<String>) {
        self.notice.push(line.into());
    }

    pub fn submit(&mut self, line: &str) -> Flow {
        self.notice.clear();
        match parse_input(line) {
            Input::Empty => Flow::Continue,
            Input::Message(text) => {
                self.send_message(&text);
                Flow::Continue
            }
            Input::Usage(usage) => {
                self.say(format!("usage: {usage}"));
                Flow::Continue
            }
            Input::Command(command) => match self.run_command(command) {
                Ok(flow) => flow,
                Err(err) => {
                    log::error!("command failed: {err:#}");
                    self.say(format!("Error: {err:#}"));
                    Flow::Continue
                }
            },
        }
    }

    pub fn navigate_history(&mut self, direction: isize) -> HistoryNav {
        match self.tabs.current_mut() {
            Some(tab) => tab.navigate_history(direction),
            None => HistoryNav::Unavailable,
        }
    }

    /// Append the message and hand the exchange to a worker thread.
    pub fn send_message(&mut self, text: &str) {
        let Some(tab) = self.tabs.current_mut() else {
            let msg = t(&self.lang, MessageKey::NoTab);
            self.say(msg);
            return;
        };
        let Some(model) = tab.model.clone().filter(|m| !m.trim().is_empty()) else {
            let msg = t(&self.lang, MessageKey::NoModel);
            self.say(msg);
            return;
        };
        let model: ModelId = match model.parse() {
            Ok(model) => model,
            Err(err) => {
                self.say(format!("Error: {err}"));
                return;
            }
        };

        tab.push_user(text);
        let tab_id = tab.id();
        let history = tab.chat_history.clone();
        let adapter = self.adapter;
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();

        log::info!("sending message to {model}");
        let spawned = thread::Builder::new()
            .name("completion".to_string())
            .spawn(move || {
                let outcome = adapter
                    .completion(client.as_ref(), &model, &history)
                    .map_err(|err| {
                        log::error!("completion with {model} failed: {err:#}");
                        format!("{err:#}")
                    });
                // The receiver only goes away when the app is shutting down.
                let _ = tx.send(WorkerEvent { tab: tab_id, outcome });
            });

        if let Err(err) = spawned {
            log::error!("failed to spawn completion thread: {err}");
            if let Some(tab) = self.tabs.get_mut(tab_id) {
                tab.push_reply(ChatEntry::error(&err.to_string()));
            }
        }
    }

    pub fn apply(&mut self, event: WorkerEvent) {
        let Some(tab) = self.tabs.get_mut(event.tab) else {
            log::warn!("dropping reply for closed tab {:?}", event.tab);
            let msg = t(&self.lang, MessageKey::ClosedTabReply);
            self.say(msg);
            return;
        };
        let entry = match event.outcome {
            Ok(record) => match record.content {
                Some(content) => ChatEntry::assistant_html(&render::markdown_to_html(&content)),
                None => ChatEntry::assistant_html(UNEXPECTED_RESPONSE),
            },
            Err(err) => ChatEntry::error(&err),
        };
        tab.push_reply(entry);
    }

    /// Apply every finished completion. Returns whether anything changed.
    pub fn drain_events(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
            changed = true;
        }
        changed
    }

    /// Block until one completion finishes or `timeout` passes.
    pub fn wait_event(&mut self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => {
                self.apply(event);
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    fn config_dir(&self) -> PathBuf {
        self.config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// `~` expands to the home directory; bare relative names are looked up beside the config.
    fn resolve_user_path(&self, path: &Path) -> PathBuf {
        if let Ok(rest) = path.strip_prefix("~") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        if path.is_relative() && !path.exists() {
            let beside_config = self.config_dir().join(path);
            if beside_config.exists() || beside_config.with_extension("json").exists() {
                return if beside_config.exists() {
                    beside_config
                } else {
                    beside_config.with_extension("json")
                };
            }
        }
        path.to_path_buf()
    }

    fn run_command(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::NewTab(name) => {
                self.tabs.add(name, self.config.default_model())?;
            }
            Command::Rename(name) => {
                self.tabs.rename_current(&name)?;
            }
            Command::Close => {
                if let Some(tab) = self.tabs.close_current() {
                    let msg = format!("{}{}", t(&self.lang, MessageKey::TabClosed), tab.name);
                    self.say(msg);
                }
            }
            Command::Save => {
                let path = self.tabs.save_current(&self.config_dir())?;
                let msg = format!("{}{}", t(&self.lang, MessageKey::TabSaved), path.display());
                self.say(msg);
            }
            Command::Open(path) => {
                let path = self.resolve_user_path(&path);
                self.tabs.open(&path)?;
                let name = self.tabs.current().map(|tab| tab.name.clone()).unwrap_or_default();
                let msg = format!("{}{name}", t(&self.lang, MessageKey::TabOpened));
                self.say(msg);
            }
            Command::Clear => {
                self.tabs.clear_current_history()?;
                let msg = t(&self.lang, MessageKey::HistoryCleared);
                self.say(msg);
            }
            Command::Refresh => return Ok(Flow::Redraw),
            Command::Next => self.tabs.select_next(),
            Command::Prev => self.tabs.select_prev(),
            Command::Select(target) => {
                let found = match target.parse::<usize>() {
                    Ok(number) => number >= 1 && self.tabs.select(number - 1),
                    Err(_) => self.tabs.select_name(&target),
                };
                if !found {
                    self.say(format!("Error: no tab `{target}`"));
                }
            }
            Command::Models => self.list_models(),
            Command::UseModel(name) => {
                let model = self.config.resolve_model(&name).to_string();
                model
                    .parse::<ModelId>()
                    .with_context(|| format!("invalid model `{model}`"))?;
                let tab = self.tabs.current_mut().ok_or(crate::tabs::TabError::NoTab)?;
                tab.model = Some(model);
            }
            Command::Prefs => self.show_preferences(),
            Command::Set { key, value } => self.set_preference(&key, &value)?,
            Command::Export(path) => {
                let path = self.resolve_user_path(&path);
                let tab = self.tabs.current().ok_or(crate::tabs::TabError::NoTab)?;
                let html = render::transcript_html(&tab.chat_history, true);
                fs::write(&path, html)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                let msg = format!("{}{}", t(&self.lang, MessageKey::Exported), path.display());
                self.say(msg);
            }
            Command::Help => {
                for entry in COMMANDS {
                    self.say(format!("  {:<20} {}", entry.usage, entry.description));
                }
            }
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn list_models(&mut self) {
        let current = self.tabs.current().and_then(|tab| tab.model.clone());
        let mut lines = vec![t(&self.lang, MessageKey::ModelsHeader).to_string()];
        for model in &self.config.user_models {
            let marker = if current.as_deref() == Some(model.full_name.as_str()) {
                '*'
            } else {
                ' '
            };
            lines.push(format!("  {marker} {} ({})", model.display_name, model.full_name));
        }
        self.notice.extend(lines);
    }

    fn show_preferences(&mut self) {
        let config = &self.config;
        let api_key = if config.api_key.is_empty() {
            "(not set)".to_string()
        } else {
            "********".to_string()
        };
        let lines = vec![
            format!("  api_key    {api_key}"),
            format!("  model      {}", config.model),
            format!("  font_size  {}", config.font_size),
            format!("  base_url   {}", config.base_url.as_deref().unwrap_or("")),
            format!("  adapter    {}", self.adapter),
            format!("  language   {}", config.language.as_deref().unwrap_or("")),
            format!("  file       {}", self.config_path.display()),
        ];
        self.notice.extend(lines);
    }

    fn set_preference(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.config.clone();
        updated.set(key, value)?;
        if matches!(key, "api_key" | "base_url") {
            self.client = (self.client_factory)(&updated)?;
        }
        self.config = updated;
        if key == "adapter" {
            self.adapter = self.config.adapter.unwrap_or_default();
        }
        if key == "language" {
            self.lang = Language::detect(self.config.language.as_deref());
        }
        self.save_config()?;
        let msg = t(&self.lang, MessageKey::PreferencesSaved);
        self.say(msg);
        Ok(())
    }

    fn save_config(&mut self) -> Result<()> {
        self.config.active_tabs = self.tabs.names();
        self.config.save(&self.config_path)
    }

    pub fn shutdown(&mut self) -> Result<()> {
        if self.pending() > 0 {
            log::warn!("exiting with {} replies outstanding", self.pending());
        }
        self.save_config()
    }
}
