use std::io::{self, Write};
use std::time::Duration;

use anyhow::Result;
use crossterm::cursor::MoveTo;
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};

use crate::app::{ChatApp, Flow};
use crate::i18n::{MessageKey, t};
use crate::render;
use crate::tabs::HistoryNav;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raw mode, alternate screen and bracketed paste for as long as it lives.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, DisableBracketedPaste, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Get terminal size, default 80x24
fn terminal_size() -> (usize, usize) {
    terminal::size()
        .map(|(w, h)| (w as usize, h as usize))
        .unwrap_or((80, 24))
}

fn bell() {
    print!("\x07");
    io::stdout().flush().ok();
}

pub fn run(app: &mut ChatApp) -> Result<()> {
    let _guard = TerminalGuard::enter()?;
    let mut input = String::new();
    let mut dirty = true;

    loop {
        if app.drain_events() {
            dirty = true;
        }
        if dirty {
            draw(app, &input)?;
            dirty = false;
        }
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) => {
                if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    continue;
                }
                match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                    KeyCode::Enter => {
                        let line = std::mem::take(&mut input);
                        match app.submit(&line) {
                            Flow::Quit => break,
                            Flow::Redraw => execute!(io::stdout(), Clear(ClearType::Purge))?,
                            Flow::Continue => {}
                        }
                    }
                    KeyCode::Up => recall(app, &mut input, -1),
                    KeyCode::Down => recall(app, &mut input, 1),
                    KeyCode::Backspace => {
                        input.pop();
                    }
                    KeyCode::Char(c) => input.push(c),
                    _ => {}
                }
                dirty = true;
            }
            Event::Paste(pasted) => {
                input.push_str(&pasted.replace(['\r', '\n'], " "));
                dirty = true;
            }
            Event::Resize(..) => dirty = true,
            _ => {}
        }
    }
    Ok(())
}

fn recall(app: &mut ChatApp, input: &mut String, direction: isize) {
    match app.navigate_history(direction) {
        HistoryNav::Recall { text, clamped } => {
            *input = text;
            if clamped {
                bell();
            }
        }
        HistoryNav::End => {
            input.clear();
            bell();
        }
        HistoryNav::Unavailable => bell(),
    }
}

fn transcript_lines(app: &ChatApp, width: usize) -> Vec<String> {
    let lang = app.lang();
    let Some(tab) = app.tabs().current() else {
        return vec![t(&lang, MessageKey::NoTab).to_string()];
    };
    if tab.chat_history.is_empty() {
        return vec![t(&lang, MessageKey::WelcomeMessage).to_string()];
    }

    let mut lines = Vec::new();
    for entry in &tab.chat_history {
        let text = render::html_to_text(&entry.content, width);
        lines.extend(text.trim_end().lines().map(str::to_string));
        lines.push(String::new());
    }
    lines
}

fn draw(app: &ChatApp, input: &str) -> Result<()> {
    let (width, height) = terminal_size();
    let lang = app.lang();
    let mut out = io::stdout().lock();
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;

    // Tab bar, current tab in reverse video.
    let current = app.tabs().current_index();
    for (index, tab) in app.tabs().iter().enumerate() {
        if Some(index) == current {
            queue!(
                out,
                SetAttribute(Attribute::Reverse),
                Print(format!(" {} ", tab.name)),
                SetAttribute(Attribute::Reset)
            )?;
        } else {
            queue!(out, Print(format!(" {} ", tab.name)))?;
        }
    }
    queue!(out, Print(format!(" | {}", app.current_model_label())))?;
    if app.pending() > 0 {
        queue!(
            out,
            Print(format!(" | {} ({})", t(&lang, MessageKey::Waiting), app.pending()))
        )?;
    }
    queue!(out, Print("\r\n"), Print("-".repeat(width)), Print("\r\n"))?;

    let notice = app.notice();
    let reserved = 2 + notice.len() + 1;
    let available = height.saturating_sub(reserved);
    let lines = transcript_lines(app, width);
    let start = lines.len().saturating_sub(available);
    for line in &lines[start..] {
        queue!(out, Print(line), Print("\r\n"))?;
    }

    for line in notice {
        queue!(
            out,
            SetAttribute(Attribute::Dim),
            Print(line),
            SetAttribute(Attribute::Reset),
            Print("\r\n")
        )?;
    }

    let row = height.saturating_sub(1) as u16;
    queue!(
        out,
        MoveTo(0, row),
        Print(t(&lang, MessageKey::PromptUser)),
        Print(input)
    )?;
    out.flush()?;
    Ok(())
}
