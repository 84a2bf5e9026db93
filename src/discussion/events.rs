// Controller commands, events and state

use std::fmt;

use crate::config::Roster;
use crate::credentials::Credential;

use super::session::Session;
use super::transcript::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscussionState {
    /// No active topic
    #[default]
    Idle,
    /// Turns are being taken
    Running,
    /// Topic loaded, rotation suspended
    Paused,
}

impl fmt::Display for DiscussionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiscussionState::Idle => "idle",
            DiscussionState::Running => "running",
            DiscussionState::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// Sent to the controller through a `DiscussionHandle`
#[derive(Debug)]
pub enum ControlCommand {
    Start { topic: String, roster: Roster },
    Restore(Box<Session>),
    Pause,
    Resume,
    TogglePause,
    Interject(String),
    SetCredential(Credential),
    Reset,
    Shutdown,
}

/// Emitted by the controller for whoever renders the discussion
#[derive(Debug, Clone, PartialEq)]
pub enum DiscussionEvent {
    StateChanged(DiscussionState),
    MessageAppended(Message),
    /// Non-blocking: the failure is also in the transcript
    TurnFailed {
        persona_id: String,
        persona: String,
        detail: String,
    },
    /// Blocking: no further turns until a valid credential arrives
    CredentialRejected(String),
    CycleCompleted(u32),
    Saved { id: String },
}
