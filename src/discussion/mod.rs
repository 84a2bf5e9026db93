// Discussion module
// Transcript, session state and the turn cycle controller

mod autosave;
mod controller;
mod events;
pub mod export;
mod session;
mod transcript;

pub use autosave::Autosaver;
pub use controller::{ControllerOptions, DiscussionController, DiscussionHandle};
pub use events::{ControlCommand, DiscussionEvent, DiscussionState};
pub use export::{to_markdown, write_markdown};
pub use session::Session;
pub use transcript::{Message, Role, Transcript};
