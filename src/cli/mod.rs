// CLI module
// Interactive discussion session and its slash commands

pub mod commands;
mod session;

pub use commands::Command;
pub use session::{parse_color, print_transcript, DiscussionSession};
