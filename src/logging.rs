use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use env_logger::{Env, Target};

const LOG_FILE_NAME: &str = "mychatui_debug.log";

pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(env::temp_dir)
        .join(LOG_FILE_NAME)
}

/// Send `log` records to `path`. The terminal belongs to the chat view, so nothing goes to stderr.
pub fn init(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or("mychatui=debug"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init()
        .context("failed to install logger")?;
    Ok(())
}

pub fn log_environment(config_path: &Path) {
    log::info!("{}", "=".repeat(50));
    log::info!("starting mychatui {}", env!("CARGO_PKG_VERSION"));
    if let Ok(exe) = env::current_exe() {
        log::info!("executable: {}", exe.display());
    }
    if let Ok(cwd) = env::current_dir() {
        log::info!("working directory: {}", cwd.display());
    }
    log::info!("config: {}", config_path.display());
    for var in ["TERM", "LANG", "PATH"] {
        log::info!(
            "  {var}: {}",
            env::var(var).unwrap_or_else(|_| "Not set".to_string())
        );
    }
    log::info!("{}", "=".repeat(50));
}
