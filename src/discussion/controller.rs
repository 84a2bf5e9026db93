// Turn cycle controller
//
// One task owns the session and its transcript. Commands arrive over an
// mpsc channel and are also serviced while a generator call or a delay is
// pending, so pauses and interjections take effect at the next turn
// boundary. An in-flight generator call is never aborted by a pause.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::autosave::Autosaver;
use super::events::{ControlCommand, DiscussionEvent, DiscussionState};
use super::session::Session;
use super::transcript::Message;
use crate::config::{Config, Persona, Roster, TimingConfig};
use crate::credentials::Credential;
use crate::providers::ResponseGenerator;
use crate::storage::ConversationStore;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub timing: TimingConfig,

    /// Speaker label for seed and interjection messages
    pub user_name: String,

    /// Pause after this many cycles of uninterrupted running
    pub max_cycles: Option<u32>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            user_name: "You".to_string(),
            max_cycles: None,
        }
    }
}

impl ControllerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timing: config.timing.clone(),
            user_name: config.user_name.clone(),
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u32>) -> Self {
        self.max_cycles = max_cycles.filter(|n| *n > 0);
        self
    }
}

/// Cloneable front end for a running `DiscussionController`.
///
/// Every method returns false once the controller has exited.
#[derive(Clone)]
pub struct DiscussionHandle {
    commands: mpsc::UnboundedSender<ControlCommand>,
    state: watch::Receiver<DiscussionState>,
}

impl DiscussionHandle {
    fn send(&self, command: ControlCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn start(&self, topic: impl Into<String>, roster: Roster) -> bool {
        self.send(ControlCommand::Start {
            topic: topic.into(),
            roster,
        })
    }

    pub fn restore(&self, session: Session) -> bool {
        self.send(ControlCommand::Restore(Box::new(session)))
    }

    pub fn pause(&self) -> bool {
        self.send(ControlCommand::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(ControlCommand::Resume)
    }

    pub fn toggle_pause(&self) -> bool {
        self.send(ControlCommand::TogglePause)
    }

    pub fn interject(&self, text: impl Into<String>) -> bool {
        self.send(ControlCommand::Interject(text.into()))
    }

    pub fn set_credential(&self, credential: Credential) -> bool {
        self.send(ControlCommand::SetCredential(credential))
    }

    pub fn reset(&self) -> bool {
        self.send(ControlCommand::Reset)
    }

    pub fn shutdown(&self) -> bool {
        self.send(ControlCommand::Shutdown)
    }

    /// Last published state
    pub fn state(&self) -> DiscussionState {
        *self.state.borrow()
    }
}

pub struct DiscussionController {
    generator: Arc<dyn ResponseGenerator>,
    credential: Credential,
    options: ControllerOptions,
    store: Option<Arc<dyn ConversationStore>>,

    commands: mpsc::UnboundedReceiver<ControlCommand>,
    events: mpsc::UnboundedSender<DiscussionEvent>,
    state_tx: watch::Sender<DiscussionState>,

    session: Option<Session>,
    autosaver: Option<Autosaver>,
    state: DiscussionState,

    /// Scheduled return to Running after an interjection
    resume_at: Option<Instant>,

    /// Index of the next persona in the current cycle
    cursor: usize,
    cycles_completed: u32,
    cycles_this_run: u32,

    /// Bumped whenever the session is replaced or torn down; results of calls
    /// started under an older epoch are dropped
    epoch: u64,

    /// Cancelled on pause; replaced on every entry to Running
    run_token: CancellationToken,
    exiting: bool,
}

impl DiscussionController {
    pub fn new(
        generator: Arc<dyn ResponseGenerator>,
        credential: Credential,
        options: ControllerOptions,
        store: Option<Arc<dyn ConversationStore>>,
    ) -> (
        Self,
        DiscussionHandle,
        mpsc::UnboundedReceiver<DiscussionEvent>,
    ) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(DiscussionState::Idle);

        let controller = Self {
            generator,
            credential,
            options,
            store,
            commands: command_rx,
            events: event_tx,
            state_tx,
            session: None,
            autosaver: None,
            state: DiscussionState::Idle,
            resume_at: None,
            cursor: 0,
            cycles_completed: 0,
            cycles_this_run: 0,
            epoch: 0,
            run_token: CancellationToken::new(),
            exiting: false,
        };
        let handle = DiscussionHandle {
            commands: command_tx,
            state: state_rx,
        };
        (controller, handle, event_rx)
    }

    /// Drive the discussion until `Shutdown` or until every handle is
    /// dropped. Returns the final session, already flushed to the store.
    pub async fn run(mut self) -> Option<Session> {
        debug!("Discussion controller started ({})", self.generator.name());

        while !self.exiting {
            if self.state == DiscussionState::Running {
                self.advance().await;
                continue;
            }

            let resume_at = self.resume_at;
            tokio::select! {
                _ = wait_until(resume_at) => {
                    self.resume_at = None;
                    self.enter_running();
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => self.exiting = true,
                },
            }
        }

        let session = self.close_session().await;
        debug!("Discussion controller stopped");
        session
    }

    async fn handle(&mut self, command: ControlCommand) {
        debug!("Control command: {:?}", command);
        match command {
            ControlCommand::Start { topic, roster } => self.start_topic(topic, roster).await,
            ControlCommand::Restore(session) => self.restore(*session).await,
            ControlCommand::Pause => self.pause(),
            ControlCommand::Resume => self.resume(),
            ControlCommand::TogglePause => match self.state {
                DiscussionState::Running => self.pause(),
                DiscussionState::Paused => self.resume(),
                DiscussionState::Idle => {}
            },
            ControlCommand::Interject(text) => self.interject(&text),
            ControlCommand::SetCredential(credential) => {
                info!("Credential updated");
                self.credential = credential;
            }
            ControlCommand::Reset => {
                self.close_session().await;
            }
            ControlCommand::Shutdown => self.exiting = true,
        }
    }

    /// One step of the rotation: either a single turn or the end of a cycle
    async fn advance(&mut self) {
        let Some(session) = self.session.as_ref() else {
            self.set_state(DiscussionState::Idle);
            return;
        };

        let Some(persona) = session.roster.get(self.cursor).cloned() else {
            self.cursor = 0;
            self.cycles_completed += 1;
            self.cycles_this_run += 1;
            self.emit(DiscussionEvent::CycleCompleted(self.cycles_completed));

            if let Some(max) = self.options.max_cycles {
                if self.cycles_this_run >= max {
                    info!("Pausing after {} cycles", self.cycles_this_run);
                    self.pause();
                    return;
                }
            }
            self.pause_point(self.options.timing.inter_cycle()).await;
            return;
        };

        let token = self.run_token.clone();
        self.take_turn(persona).await;

        // Paused, reset or restarted during the call: the cursor now
        // belongs to whatever run comes next
        if token.is_cancelled() {
            return;
        }
        self.cursor += 1;
        self.pause_point(self.options.timing.inter_turn()).await;
    }

    async fn take_turn(&mut self, persona: Persona) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let epoch = self.epoch;
        let history = session.transcript.messages().to_vec();
        let generator = Arc::clone(&self.generator);
        let credential = self.credential.clone();
        let speaker = persona.clone();

        debug!(
            "Turn for {} with {} messages of history",
            persona.display_name,
            history.len()
        );
        let call = async move { generator.generate(&speaker, &history, &credential).await };
        tokio::pin!(call);

        let result = loop {
            tokio::select! {
                result = &mut call => break Some(result),
                command = self.commands.recv(), if !self.exiting => match command {
                    Some(command) => self.handle(command).await,
                    None => self.exiting = true,
                },
            }
            if self.exiting {
                break None;
            }
        };

        let Some(result) = result else {
            debug!("Dropping turn for {}: shutting down", persona.display_name);
            return;
        };
        if epoch != self.epoch {
            debug!("Discarding stale reply from {}", persona.display_name);
            return;
        }

        match result {
            Ok(content) => self.append(Message::assistant(&persona, content)),
            Err(e) if e.is_credential_error() => {
                warn!("Credential rejected during {}'s turn: {}", persona.display_name, e);
                self.emit(DiscussionEvent::CredentialRejected(e.to_string()));
                self.pause();
            }
            Err(e) => {
                let detail = e.to_string();
                warn!("Error generating response for {}: {}", persona.id, detail);
                self.append(Message::turn_failure(&persona, &detail));
                self.emit(DiscussionEvent::TurnFailed {
                    persona_id: persona.id.clone(),
                    persona: persona.display_name.clone(),
                    detail,
                });
            }
        }
    }

    /// Wait out a fixed delay while servicing commands. Returns early if the
    /// run is cancelled.
    async fn pause_point(&mut self, delay: Duration) {
        let token = self.run_token.clone();
        let deadline = Instant::now() + delay;

        while !token.is_cancelled() && !self.exiting {
            tokio::select! {
                _ = sleep_until(deadline) => return,
                _ = token.cancelled() => return,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => self.exiting = true,
                },
            }
        }
    }

    async fn start_topic(&mut self, topic: String, roster: Roster) {
        let topic = topic.trim().to_string();
        if topic.is_empty() {
            warn!("Ignoring start request with an empty topic");
            return;
        }
        self.close_session().await;

        info!("Starting discussion on {:?} with {:?}", topic, roster.ids());
        let session = Session::new(topic, roster, &self.options.user_name);
        let seed = session.transcript.last().cloned();
        self.install(session);
        if let Some(seed) = seed {
            self.emit(DiscussionEvent::MessageAppended(seed));
        }
        self.enter_running();
    }

    async fn restore(&mut self, session: Session) {
        self.close_session().await;
        info!(
            "Restored discussion on {:?} ({} messages)",
            session.topic,
            session.transcript.len()
        );
        self.install(session);
        self.set_state(DiscussionState::Paused);
    }

    fn install(&mut self, session: Session) {
        self.autosaver = self.store.as_ref().map(|store| {
            Autosaver::spawn(
                Arc::clone(store),
                session.conversation_id.clone(),
                self.events.clone(),
            )
        });
        self.session = Some(session);
        self.cursor = 0;
        self.cycles_completed = 0;
    }

    /// Enter Running from Idle or Paused. No-op when already running.
    fn enter_running(&mut self) {
        self.resume_at = None;
        if self.state == DiscussionState::Running {
            debug!("Already running");
            return;
        }
        if self.session.is_none() {
            debug!("No active topic to run");
            return;
        }
        if let Err(e) = self.credential.validate() {
            warn!("Cannot run discussion: {}", e);
            self.emit(DiscussionEvent::CredentialRejected(e.to_string()));
            self.set_state(DiscussionState::Paused);
            return;
        }

        self.cursor = 0;
        self.cycles_this_run = 0;
        self.run_token = CancellationToken::new();
        self.set_state(DiscussionState::Running);
    }

    fn resume(&mut self) {
        self.enter_running();
    }

    fn pause(&mut self) {
        self.run_token.cancel();
        self.resume_at = None;
        if self.session.is_some() {
            self.set_state(DiscussionState::Paused);
        }
    }

    /// Pause, append the user's message and schedule a fresh cycle.
    ///
    /// A reply already in flight is still appended once it arrives, so it
    /// lands after the interjection, and the same persona may speak again
    /// when the new cycle starts from the first persona.
    fn interject(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if self.session.is_none() {
            warn!("No active topic; message ignored");
            return;
        }

        self.pause();
        self.append(Message::user(self.options.user_name.clone(), text));
        self.resume_at = Some(Instant::now() + self.options.timing.interjection_resume());
    }

    fn append(&mut self, message: Message) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.transcript.push(message.clone());
        if session.transcript.has_discussion() {
            if let Some(saver) = &self.autosaver {
                saver.submit(session.draft());
            }
        }
        self.emit(DiscussionEvent::MessageAppended(message));
    }

    /// Stop the rotation, flush pending saves and drop to Idle
    async fn close_session(&mut self) -> Option<Session> {
        self.run_token.cancel();
        self.resume_at = None;
        self.epoch += 1;
        self.cursor = 0;

        let mut session = self.session.take();
        if let Some(saver) = self.autosaver.take() {
            if let Some(session) = session.as_ref().filter(|s| s.transcript.has_discussion()) {
                saver.submit(session.draft());
            }
            let id = saver.finish().await;
            if let (Some(session), Some(id)) = (session.as_mut(), id) {
                session.conversation_id = Some(id);
            }
        }

        self.set_state(DiscussionState::Idle);
        session
    }

    fn set_state(&mut self, state: DiscussionState) {
        if self.state == state {
            return;
        }
        debug!("Discussion state {} -> {}", self.state, state);
        self.state = state;
        self.state_tx.send_replace(state);
        self.emit(DiscussionEvent::StateChanged(state));
    }

    fn emit(&self, event: DiscussionEvent) {
        // Nobody listening is fine; the transcript is still kept
        let _ = self.events.send(event);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::GenerationError;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl ResponseGenerator for Echo {
        async fn generate(
            &self,
            persona: &Persona,
            history: &[Message],
            _credential: &Credential,
        ) -> Result<String, GenerationError> {
            Ok(format!("{} saw {}", persona.id, history.len()))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn roster() -> Roster {
        Roster::new(vec![
            Persona::new("a", "A", "x", "m/a"),
            Persona::new("b", "B", "y", "m/b"),
        ])
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_grows_within_a_cycle() {
        let options = ControllerOptions::default().with_max_cycles(Some(1));
        let (controller, handle, mut events) =
            DiscussionController::new(Arc::new(Echo), Credential::new("sk-or-test"), options, None);
        let task = tokio::spawn(controller.run());

        handle.start("tides", roster());
        while let Some(event) = events.recv().await {
            if event == DiscussionEvent::CycleCompleted(1) {
                break;
            }
        }
        handle.shutdown();

        let session = task.await.unwrap().unwrap();
        let contents: Vec<_> = session
            .transcript
            .messages()
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(
            contents,
            vec!["The topic for discussion is: \"tides\"", "a saw 1", "b saw 2"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_without_topic_stays_idle() {
        let (controller, handle, _events) = DiscussionController::new(
            Arc::new(Echo),
            Credential::new("sk-or-test"),
            ControllerOptions::default(),
            None,
        );
        let task = tokio::spawn(controller.run());

        handle.toggle_pause();
        handle.interject("hello?");
        handle.shutdown();

        assert!(task.await.unwrap().is_none());
        assert_eq!(handle.state(), DiscussionState::Idle);
    }
}
