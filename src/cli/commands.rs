// Slash command handling for the interactive session

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    Pause,
    Resume,
    Toggle,
    Status,
    /// Optional output path; defaults to a timestamped file
    Export(Option<PathBuf>),
    /// Replace the gateway key after a rejection
    Key(String),
    /// Anything that is not a command joins the discussion
    Say(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let (head, rest) = match input.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (input, ""),
        };
        let command = match head {
            "/help" | "/?" => Command::Help,
            "/quit" | "/exit" => Command::Quit,
            "/pause" => Command::Pause,
            "/resume" => Command::Resume,
            "/toggle" => Command::Toggle,
            "/status" => Command::Status,
            "/export" => Command::Export(if rest.is_empty() {
                None
            } else {
                Some(PathBuf::from(rest))
            }),
            "/key" if !rest.is_empty() => Command::Key(rest.to_string()),
            _ => Command::Say(input.to_string()),
        };
        Some(command)
    }
}

pub fn format_help() -> String {
    r#"Available commands:
  /pause          - Stop after the current turn
  /resume         - Start a fresh cycle with the full transcript
  /toggle         - Pause if running, resume if paused
  /export [path]  - Write the transcript as markdown
  /status         - Show state, roster and message count
  /key <key>      - Use (and remember) a new OpenRouter key
  /help           - Show this help message
  /quit           - Save and exit

Anything else you type joins the discussion."#
        .to_string()
}
