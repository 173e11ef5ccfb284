use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    NewTab(Option<String>),
    Rename(String),
    Close,
    Save,
    Open(PathBuf),
    Clear,
    Refresh,
    Next,
    Prev,
    Select(String),
    Models,
    UseModel(String),
    Prefs,
    Set { key: String, value: String },
    Export(PathBuf),
    Help,
    Quit,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Empty,
    Message(String),
    Command(Command),
    /// A known command with missing arguments; carries the usage line.
    Usage(&'static str),
}

pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub description: &'static str,
}

pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "new", usage: "/new [name]", description: "open a new tab" },
    CommandSpec { name: "rename", usage: "/rename <name>", description: "rename the current tab" },
    CommandSpec { name: "close", usage: "/close", description: "close the current tab" },
    CommandSpec { name: "save", usage: "/save", description: "save the current tab next to the config" },
    CommandSpec { name: "open", usage: "/open <path>", description: "open a saved tab" },
    CommandSpec { name: "clear", usage: "/clear", description: "clear the current tab's history" },
    CommandSpec { name: "refresh", usage: "/refresh", description: "redraw the current tab" },
    CommandSpec { name: "next", usage: "/next", description: "switch to the next tab" },
    CommandSpec { name: "prev", usage: "/prev", description: "switch to the previous tab" },
    CommandSpec { name: "tab", usage: "/tab <number|name>", description: "switch to a tab" },
    CommandSpec { name: "models", usage: "/models", description: "list configured models" },
    CommandSpec { name: "model", usage: "/model <name>", description: "set the current tab's model" },
    CommandSpec { name: "prefs", usage: "/prefs", description: "show preferences" },
    CommandSpec { name: "set", usage: "/set <key> <value>", description: "change a preference and save it" },
    CommandSpec { name: "export", usage: "/export <path>", description: "write the transcript as HTML" },
    CommandSpec { name: "help", usage: "/help", description: "list commands" },
    CommandSpec { name: "quit", usage: "/quit", description: "save and exit" },
];

fn usage(name: &str) -> &'static str {
    COMMANDS
        .iter()
        .find(|c| c.name == name)
        .map_or("", |c| c.usage)
}

/// Lines not starting with a known `/command` are sent as messages.
pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Input::Message(trimmed.to_string());
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();
    let required = |build: fn(String) -> Command| {
        if args.is_empty() {
            Input::Usage(usage(name))
        } else {
            Input::Command(build(args.to_string()))
        }
    };

    match name {
        "new" => Input::Command(Command::NewTab((!args.is_empty()).then(|| args.to_string()))),
        "rename" => required(Command::Rename),
        "close" => Input::Command(Command::Close),
        "save" => Input::Command(Command::Save),
        "open" => required(|a| Command::Open(PathBuf::from(a))),
        "clear" => Input::Command(Command::Clear),
        "refresh" => Input::Command(Command::Refresh),
        "next" => Input::Command(Command::Next),
        "prev" => Input::Command(Command::Prev),
        "tab" => required(Command::Select),
        "models" => Input::Command(Command::Models),
        "model" => required(Command::UseModel),
        "prefs" => Input::Command(Command::Prefs),
        "set" => match args.split_once(char::is_whitespace) {
            Some((key, value)) => Input::Command(Command::Set {
                key: key.to_string(),
                value: value.trim().to_string(),
            }),
            // `/set base_url` clears an optional preference.
            None if !args.is_empty() => Input::Command(Command::Set {
                key: args.to_string(),
                value: String::new(),
            }),
            None => Input::Usage(usage("set")),
        },
        "export" => required(|a| Command::Export(PathBuf::from(a))),
        "help" => Input::Command(Command::Help),
        "quit" | "exit" => Input::Command(Command::Quit),
        _ => Input::Message(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_message() {
        assert_eq!(
            parse_input("  Why is the sky blue  "),
            Input::Message("Why is the sky blue".into())
        );
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn test_unknown_command_is_sent_as_message() {
        assert_eq!(
            parse_input("/shrug about it"),
            Input::Message("/shrug about it".into())
        );
    }

    #[test]
    fn test_commands_with_arguments() {
        assert_eq!(
            parse_input("/new Research notes"),
            Input::Command(Command::NewTab(Some("Research notes".into())))
        );
        assert_eq!(parse_input("/new"), Input::Command(Command::NewTab(None)));
        assert_eq!(
            parse_input("/open ~/chats/Tab 1.json"),
            Input::Command(Command::Open(PathBuf::from("~/chats/Tab 1.json")))
        );
        assert_eq!(
            parse_input("/model Gemini 1.5 Pro"),
            Input::Command(Command::UseModel("Gemini 1.5 Pro".into()))
        );
        assert_eq!(
            parse_input("/set font_size 14"),
            Input::Command(Command::Set {
                key: "font_size".into(),
                value: "14".into()
            })
        );
        assert_eq!(
            parse_input("/set base_url"),
            Input::Command(Command::Set {
                key: "base_url".into(),
                value: String::new()
            })
        );
    }

    #[test]
    fn test_missing_arguments_report_usage() {
        assert_eq!(parse_input("/rename"), Input::Usage("/rename <name>"));
        assert_eq!(parse_input("/open  "), Input::Usage("/open <path>"));
        assert_eq!(parse_input("/set"), Input::Usage("/set <key> <value>"));
    }

    #[test]
    fn test_every_command_has_a_usage_line() {
        for entry in COMMANDS {
            assert!(entry.usage.starts_with(&format!("/{}", entry.name)));
        }
    }
}
