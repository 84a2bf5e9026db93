// Interactive discussion session
//
// Reads lines from stdin and renders controller events to stdout. The
// controller owns the authoritative transcript; this side keeps a mirror
// built from MessageAppended events for /status and /export.

use anyhow::Result;
use crossterm::style::{Color, Stylize};
use std::collections::HashMap;
use std::io::{self, IsTerminal};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::commands::{format_help, Command};
use crate::config::{PersonaCatalogue, Roster};
use crate::credentials::{Credential, KeyFile};
use crate::discussion::{
    write_markdown, DiscussionEvent, DiscussionHandle, DiscussionState, Message, Role, Transcript,
};

const USER_COLOR: Color = Color::Rgb {
    r: 0x4c,
    g: 0xaf,
    b: 0x50,
};
const FALLBACK_COLOR: Color = Color::Rgb {
    r: 0x88,
    g: 0x88,
    b: 0x88,
};

/// `#rrggbb` to a terminal colour
pub fn parse_color(hex: &str) -> Option<Color> {
    let hex = hex.trim().strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

fn speaker_color(message: &Message, catalogue: &PersonaCatalogue) -> Color {
    match message.role {
        Role::User => USER_COLOR,
        Role::System => Color::Red,
        Role::Assistant => message
            .persona_id
            .as_deref()
            .and_then(|id| catalogue.get(id))
            .and_then(|p| parse_color(&p.color))
            .unwrap_or(FALLBACK_COLOR),
    }
}

fn print_message(message: &Message, color: Color) {
    println!();
    println!("{}", message.speaker_name.as_str().with(color).bold());
    println!("{}", message.content);
}

/// Print a whole transcript, e.g. for `banter show`
pub fn print_transcript(transcript: &Transcript, catalogue: &PersonaCatalogue) {
    for message in transcript.messages() {
        print_message(message, speaker_color(message, catalogue));
    }
}

pub struct DiscussionSession {
    handle: DiscussionHandle,
    events: mpsc::UnboundedReceiver<DiscussionEvent>,
    catalogue: PersonaCatalogue,
    roster: Roster,
    topic: String,
    user_name: String,
    transcript: Transcript,
    key_file: Option<KeyFile>,

    /// Last failure per persona, cleared when that persona answers again
    failures: HashMap<String, String>,
    conversation_id: Option<String>,
    is_interactive: bool,
}

impl DiscussionSession {
    pub fn new(
        handle: DiscussionHandle,
        events: mpsc::UnboundedReceiver<DiscussionEvent>,
        catalogue: PersonaCatalogue,
        roster: Roster,
        topic: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            handle,
            events,
            catalogue,
            roster,
            topic: topic.into(),
            user_name: user_name.into(),
            transcript: Transcript::new(),
            key_file: None,
            failures: HashMap::new(),
            conversation_id: None,
            is_interactive: io::stdout().is_terminal(),
        }
    }

    /// Start from an existing transcript (resumed conversations)
    pub fn with_history(mut self, transcript: Transcript, conversation_id: Option<String>) -> Self {
        self.transcript = transcript;
        self.conversation_id = conversation_id;
        self
    }

    /// Where `/key` persists a new key
    pub fn with_key_file(mut self, key_file: KeyFile) -> Self {
        self.key_file = Some(key_file);
        self
    }

    /// Run until /quit, Ctrl-C, or stdin closing once the rotation has stopped.
    /// Returns the id of the last successful save, if any.
    pub async fn run(mut self) -> Result<Option<String>> {
        self.print_banner();
        print_transcript(&self.transcript, &self.catalogue);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                line = lines.next_line(), if stdin_open => match line? {
                    Some(line) => {
                        if !self.handle_line(&line) {
                            break;
                        }
                    }
                    None => {
                        stdin_open = false;
                        if self.handle.state() != DiscussionState::Running {
                            break;
                        }
                    }
                },
                event = self.events.recv() => match event {
                    Some(event) => {
                        let stopped = matches!(
                            event,
                            DiscussionEvent::StateChanged(DiscussionState::Paused | DiscussionState::Idle)
                        );
                        self.render(event);
                        if stopped && !stdin_open {
                            break;
                        }
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            }
        }

        Ok(self.conversation_id)
    }

    fn print_banner(&self) {
        if !self.is_interactive {
            return;
        }
        let names: Vec<_> = self.roster.iter().map(|p| p.display_name.as_str()).collect();
        println!("{}", format!("Topic: {}", self.topic).bold());
        println!("Participants: {}", names.join(", "));
        println!("{}", "Type to join in, /help for commands.".dark_grey());
    }

    /// Returns false when the session should end
    fn handle_line(&mut self, line: &str) -> bool {
        let Some(command) = Command::parse(line) else {
            return true;
        };

        match command {
            Command::Quit => return false,
            Command::Help => println!("{}", format_help()),
            Command::Pause => {
                self.handle.pause();
            }
            Command::Resume => {
                self.handle.resume();
            }
            Command::Toggle => {
                self.handle.toggle_pause();
            }
            Command::Status => self.print_status(),
            Command::Export(path) => {
                match write_markdown(&self.topic, &self.transcript, &self.user_name, path.as_deref()) {
                    Ok(path) => println!("Transcript written to {}", path.display()),
                    Err(e) => eprintln!("{}", format!("Export failed: {:#}", e).red()),
                }
            }
            Command::Key(raw) => self.replace_key(&raw),
            Command::Say(text) => {
                self.handle.interject(text);
            }
        }
        true
    }

    fn replace_key(&mut self, raw: &str) {
        let credential = Credential::new(raw);
        if let Err(e) = credential.validate() {
            eprintln!("{}", e.to_string().red());
            return;
        }
        if let Some(key_file) = &self.key_file {
            if let Err(e) = key_file.store(&credential) {
                tracing::warn!("Could not persist API key: {}", e);
            }
        }
        self.handle.set_credential(credential);
        println!("Key updated. /resume to continue.");
    }

    fn render(&mut self, event: DiscussionEvent) {
        match event {
            DiscussionEvent::MessageAppended(message) => {
                if let Some(id) = &message.persona_id {
                    self.failures.remove(id);
                }
                print_message(&message, speaker_color(&message, &self.catalogue));
                self.transcript.push(message);
            }
            DiscussionEvent::StateChanged(state) => {
                if self.is_interactive {
                    println!("{}", format!("[{}]", state).dark_grey());
                }
            }
            DiscussionEvent::TurnFailed {
                persona_id,
                persona,
                detail,
            } => {
                self.failures.insert(persona_id, detail.clone());
                eprintln!("{}", format!("Error with {}: {}", persona, detail).yellow());
            }
            DiscussionEvent::CredentialRejected(reason) => {
                eprintln!("{}", format!("Discussion halted: {}", reason).red().bold());
                eprintln!("Supply a key with /key <sk-or-...>, then /resume.");
            }
            DiscussionEvent::CycleCompleted(n) => {
                tracing::debug!("Cycle {} complete", n);
            }
            DiscussionEvent::Saved { id } => {
                self.conversation_id = Some(id);
            }
        }
    }

    fn print_status(&self) {
        let names: Vec<_> = self.roster.iter().map(|p| p.display_name.as_str()).collect();
        println!("State:        {}", self.handle.state());
        println!("Topic:        {}", self.topic);
        println!("Participants: {}", names.join(", "));
        println!("Messages:     {}", self.transcript.len());
        println!(
            "Saved as:     {}",
            self.conversation_id.as_deref().unwrap_or("(not yet saved)")
        );
        for (id, detail) in &self.failures {
            println!("Failing:      {} ({})", id, detail);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(
            parse_color("#8B5CF6"),
            Some(Color::Rgb {
                r: 0x8b,
                g: 0x5c,
                b: 0xf6
            })
        );
        assert_eq!(parse_color("8B5CF6"), None);
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("#zzzzzz"), None);
    }

    #[test]
    fn test_assistant_colour_comes_from_catalogue() {
        let catalogue = PersonaCatalogue::builtin().unwrap();
        let claude = catalogue.get("claude").unwrap().clone();
        let message = Message::assistant(&claude, "hi");
        assert_eq!(
            Some(speaker_color(&message, &catalogue)),
            parse_color(&claude.color)
        );
        assert_eq!(
            speaker_color(&Message::user("You", "hi"), &catalogue),
            USER_COLOR
        );
    }

    #[test]
    fn test_failures_are_tracked_by_persona_id() {
        use crate::config::{GatewayConfig, Persona};
        use crate::discussion::{ControllerOptions, DiscussionController};
        use crate::providers::OpenRouterGenerator;
        use std::sync::Arc;

        let (_controller, handle, events) = DiscussionController::new(
            Arc::new(OpenRouterGenerator::new(&GatewayConfig::default())),
            Credential::new("sk-or-test"),
            ControllerOptions::default(),
            None,
        );
        let first = Persona::new("claude", "Claude", "careful", "anthropic/claude-3.5-sonnet");
        let second = Persona::new("claude-fast", "Claude", "brisk", "anthropic/claude-3-haiku");
        let roster = Roster::new(vec![first.clone(), second]).unwrap();
        let mut session = DiscussionSession::new(
            handle,
            events,
            PersonaCatalogue::builtin().unwrap(),
            roster,
            "tides",
            "You",
        );

        session.render(DiscussionEvent::TurnFailed {
            persona_id: "claude-fast".to_string(),
            persona: "Claude".to_string(),
            detail: "OpenRouter API error: 502 down".to_string(),
        });
        session.render(DiscussionEvent::MessageAppended(Message::assistant(&first, "hi")));

        assert_eq!(session.failures.len(), 1);
        assert_eq!(
            session.failures.get("claude-fast").map(String::as_str),
            Some("OpenRouter API error: 502 down")
        );
    }
}
