mod app;
mod chat;
mod commands;
mod config;
mod i18n;
mod llm;
mod logging;
mod path;
mod render;
mod tabs;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::app::{ChatApp, ClientFactory};
use crate::config::Config;
use crate::llm::openai::OpenAIClient;
use crate::llm::{Adapter, LLMClient};
use crate::tabs::ChatEntry;

const ONE_SHOT_TIMEOUT: Duration = Duration::from_secs(600);
const ONE_SHOT_WIDTH: usize = 100;

#[derive(Parser)]
#[command(name = "mychatui", version)]
#[command(about = "A tabbed terminal chat client for OpenAI-compatible LLM backends")]
#[command(long_about = "A tabbed terminal chat client for OpenAI-compatible LLM backends.\n\n\
Models are written as provider:name, e.g. openai:gpt-4o-mini, ollama:qwen2.5:latest or \
google:models/gemini-1.5-flash.\n\n\
Environment Variables:\n\
  MYCHATUI_CONFIG   Config file path\n\
  OPENAI_API_KEY    OpenAI key (used when the config has no api_key)\n\
  OPENAI_API_URL    Custom OpenAI-compatible base URL\n\
  OLLAMA_API_URL    Custom Ollama base URL\n\
  GEMINI_API_KEY    Google key\n\
  RUST_LOG          Log filter (default mychatui=debug)")]
struct Args {
    /// Config file [default: $MYCHATUI_CONFIG or ~/.config/mychatui/config.json]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model for the tabs opened at startup
    #[arg(short, long)]
    model: Option<String>,

    /// Response adapter: anyllm or aisuite
    #[arg(long)]
    adapter: Option<Adapter>,

    /// Debug log file [default: ~/mychatui_debug.log]
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Send one message, print the reply and exit
    #[arg(short, long)]
    prompt: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_file = args.log_file.clone().unwrap_or_else(logging::default_log_path);
    logging::init(&log_file)?;

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => Config::default_path()?,
    };
    logging::log_environment(&config_path);

    let result = run(args, config_path);
    match &result {
        Ok(()) => log::info!("exited normally"),
        Err(err) => {
            log::error!("fatal: {err:#}");
            eprintln!(
                "A critical error occurred. Check the log file at: {}",
                log_file.display()
            );
        }
    }
    result
}

fn run(args: Args, config_path: PathBuf) -> Result<()> {
    let config = Config::load(&config_path)?;
    let factory: ClientFactory = Box::new(|config: &Config| {
        Ok(Arc::new(OpenAIClient::from_config(config)?) as Arc<dyn LLMClient>)
    });

    let mut app = ChatApp::new(config, config_path, factory)?;
    if let Some(adapter) = args.adapter {
        app.set_adapter(adapter);
    }
    if let Some(model) = &args.model {
        app.set_startup_model(model);
    }

    match args.prompt {
        Some(prompt) => one_shot(&mut app, &prompt),
        None => {
            chat::run(&mut app)?;
            app.shutdown()
        }
    }
}

fn one_shot(app: &mut ChatApp, prompt: &str) -> Result<()> {
    app.send_message(prompt);
    if let Some(notice) = app.notice().first() {
        bail!("{notice}");
    }
    if !app.wait_event(ONE_SHOT_TIMEOUT) {
        bail!("no reply within {} seconds", ONE_SHOT_TIMEOUT.as_secs());
    }

    let entry: &ChatEntry = app
        .tabs()
        .current()
        .and_then(|tab| tab.chat_history.last())
        .context("reply was not recorded")?;
    let text = render::html_to_text(&entry.content, ONE_SHOT_WIDTH);
    if entry.content.starts_with("<p>Error: ") {
        bail!("{}", text.trim());
    }
    println!("{}", text.trim_end());
    Ok(())
}
