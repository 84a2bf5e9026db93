// Banter - a roster of AI personas discussing a topic, with the user able to join in
// Main entry point

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

use banter::cli::{parse_color, print_transcript, DiscussionSession};
use banter::config::{load_config, Config, PersonaCatalogue};
use banter::credentials::{Credential, CredentialResolver, KeyFile, KeyIssuer};
use banter::discussion::{
    write_markdown, ControllerOptions, DiscussionController, DiscussionHandle, Session, Transcript,
};
use banter::providers::OpenRouterGenerator;
use banter::storage::{ConversationStore, FallbackStore, LocalStore, RemoteStore};

#[derive(Parser)]
#[command(
    name = "banter",
    version,
    about = "Watch a roster of AI personas talk a topic through, and join in"
)]
struct Cli {
    /// Config file (default: ~/.banter/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a discussion and join the session
    Run {
        /// What the personas should discuss
        #[arg(short, long)]
        topic: String,

        /// Comma-separated persona ids, in speaking order (2 to 7)
        #[arg(short, long, value_delimiter = ',')]
        roster: Vec<String>,

        /// Pause after this many full cycles
        #[arg(long)]
        cycles: Option<u32>,

        /// OpenRouter key (overrides OPENROUTER_API_KEY and the saved key)
        #[arg(long)]
        key: Option<String>,
    },
    /// Continue a saved conversation
    Resume {
        id: String,

        #[arg(long)]
        cycles: Option<u32>,

        #[arg(long)]
        key: Option<String>,
    },
    /// List saved conversations, newest first
    List,
    /// Print a saved conversation
    Show { id: String },
    /// Delete a saved conversation
    Delete { id: String },
    /// Write a saved conversation as markdown
    Export {
        id: String,

        /// Output file (default: ai-discussion-<millis>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the available personas
    Personas,
    /// Manage the locally saved OpenRouter key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Save a key for later runs
    Set { key: String },
    /// Remove the saved key
    Clear,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    banter::logging::init(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            topic,
            roster,
            cycles,
            key,
        } => cmd_run(config, topic, roster, cycles, key).await,
        Command::Resume { id, cycles, key } => cmd_resume(config, &id, cycles, key).await,
        Command::List => cmd_list(&config).await,
        Command::Show { id } => cmd_show(&config, &id).await,
        Command::Delete { id } => cmd_delete(&config, &id).await,
        Command::Export { id, output } => cmd_export(&config, &id, output).await,
        Command::Personas => cmd_personas(&config),
        Command::Key { action } => cmd_key(&config, action),
    }
}

fn build_catalogue(config: &Config) -> Result<PersonaCatalogue> {
    let mut catalogue = PersonaCatalogue::builtin()?;
    catalogue.merge(config.personas.clone());
    Ok(catalogue)
}

/// Remote store first when configured, local file last
fn build_store(config: &Config) -> Arc<dyn ConversationStore> {
    let mut backends: Vec<Arc<dyn ConversationStore>> = Vec::new();
    if let (Some(url), Some(key)) = (&config.storage.remote_url, &config.storage.remote_api_key) {
        backends.push(Arc::new(RemoteStore::new(
            url,
            key.clone(),
            config.storage.remote_table.as_deref(),
        )));
    }
    backends.push(Arc::new(LocalStore::in_dir(&config.storage_dir())));
    Arc::new(FallbackStore::new(backends))
}

/// Resolve the gateway key. Failure is not fatal: the controller halts on
/// the empty credential and the user can supply one with /key.
async fn resolve_credential(config: &Config, explicit: Option<String>) -> Credential {
    let mut resolver = CredentialResolver::new()
        .with_explicit(explicit.or_else(|| config.api_key.clone()))
        .with_key_file(KeyFile::new(config.key_file()));
    if let Some(url) = &config.credentials.issuer_url {
        resolver = resolver.with_issuer(KeyIssuer::new(
            url.clone(),
            config.credentials.issuer_token.clone(),
        ));
    }

    match resolver.resolve().await {
        Ok((credential, source)) => {
            tracing::debug!("Using OpenRouter key from {:?}", source);
            credential
        }
        Err(e) => {
            eprintln!("{}", format!("Warning: {}", e).yellow());
            Credential::default()
        }
    }
}

fn spawn_controller(
    config: &Config,
    credential: Credential,
    cycles: Option<u32>,
) -> (
    DiscussionHandle,
    tokio::sync::mpsc::UnboundedReceiver<banter::discussion::DiscussionEvent>,
    JoinHandle<Option<Session>>,
) {
    let generator = Arc::new(OpenRouterGenerator::new(&config.gateway));
    let options = ControllerOptions::from_config(config).with_max_cycles(cycles);
    let (controller, handle, events) =
        DiscussionController::new(generator, credential, options, Some(build_store(config)));
    let task = tokio::spawn(controller.run());
    (handle, events, task)
}

async fn shut_down(handle: DiscussionHandle, task: JoinHandle<Option<Session>>) -> Result<()> {
    handle.shutdown();
    let session = task.await.context("Discussion task failed")?;
    if let Some(id) = session.and_then(|s| s.conversation_id) {
        println!("Saved as {}", id);
    }
    Ok(())
}

async fn cmd_run(
    config: Config,
    topic: String,
    roster_ids: Vec<String>,
    cycles: Option<u32>,
    key: Option<String>,
) -> Result<()> {
    let catalogue = build_catalogue(&config)?;
    let ids = if !roster_ids.is_empty() {
        roster_ids
    } else if !config.default_roster.is_empty() {
        config.default_roster.clone()
    } else {
        catalogue.default_roster_ids()
    };
    let roster = catalogue.roster(&ids)?;

    let topic = topic.trim().to_string();
    if topic.is_empty() {
        bail!("Topic must not be empty");
    }

    let credential = resolve_credential(&config, key).await;
    let (handle, events, task) = spawn_controller(&config, credential, cycles);
    handle.start(topic.clone(), roster.clone());

    DiscussionSession::new(
        handle.clone(),
        events,
        catalogue,
        roster,
        topic,
        config.user_name.clone(),
    )
    .with_key_file(KeyFile::new(config.key_file()))
    .run()
    .await?;

    shut_down(handle, task).await
}

async fn cmd_resume(
    config: Config,
    id: &str,
    cycles: Option<u32>,
    key: Option<String>,
) -> Result<()> {
    let catalogue = build_catalogue(&config)?;
    let saved = build_store(&config)
        .load(id)
        .await?
        .with_context(|| format!("No saved conversation with id {}", id))?;
    let session = Session::from_saved(saved, &catalogue)
        .with_context(|| format!("Cannot resume {}", id))?;

    let credential = resolve_credential(&config, key).await;
    let (handle, events, task) = spawn_controller(&config, credential, cycles);
    let history = session.transcript.clone();
    let roster = session.roster.clone();
    let topic = session.topic.clone();
    handle.restore(session);
    handle.resume();

    DiscussionSession::new(
        handle.clone(),
        events,
        catalogue,
        roster,
        topic,
        config.user_name.clone(),
    )
    .with_history(history, Some(id.to_string()))
    .with_key_file(KeyFile::new(config.key_file()))
    .run()
    .await?;

    shut_down(handle, task).await
}

async fn cmd_list(config: &Config) -> Result<()> {
    let conversations = build_store(config).list().await?;
    if conversations.is_empty() {
        println!("No saved conversations.");
        return Ok(());
    }
    for conversation in conversations {
        println!(
            "{}  {}  {:>3} msgs  {}",
            conversation.id,
            conversation
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M"),
            conversation.messages.len(),
            conversation.topic
        );
    }
    Ok(())
}

async fn cmd_show(config: &Config, id: &str) -> Result<()> {
    let catalogue = build_catalogue(config)?;
    let saved = build_store(config)
        .load(id)
        .await?
        .with_context(|| format!("No saved conversation with id {}", id))?;

    println!("{}", format!("Topic: {}", saved.topic).bold());
    println!("Participants: {}", saved.roster_ids.join(", "));
    print_transcript(&Transcript::from_messages(saved.messages), &catalogue);
    Ok(())
}

async fn cmd_delete(config: &Config, id: &str) -> Result<()> {
    if build_store(config).delete(id).await? {
        println!("Deleted {}", id);
    } else {
        println!("No saved conversation with id {}", id);
    }
    Ok(())
}

async fn cmd_export(config: &Config, id: &str, output: Option<PathBuf>) -> Result<()> {
    let saved = build_store(config)
        .load(id)
        .await?
        .with_context(|| format!("No saved conversation with id {}", id))?;
    let transcript = Transcript::from_messages(saved.messages);
    let path = write_markdown(&saved.topic, &transcript, &config.user_name, output.as_deref())?;
    println!("Transcript written to {}", path.display());
    Ok(())
}

fn cmd_personas(config: &Config) -> Result<()> {
    let catalogue = build_catalogue(config)?;
    for persona in catalogue.iter() {
        let name = match parse_color(&persona.color) {
            Some(color) => persona.display_name.as_str().with(color).bold(),
            None => persona.display_name.as_str().bold(),
        };
        println!("{:<10} {}  ({})", persona.id, name, persona.model_id);
        println!("           {}", persona.personality);
    }
    Ok(())
}

fn cmd_key(config: &Config, action: KeyAction) -> Result<()> {
    let key_file = KeyFile::new(config.key_file());
    match action {
        KeyAction::Set { key } => {
            let credential = Credential::new(key);
            credential.validate()?;
            key_file.store(&credential)?;
            println!("Key saved to {}", key_file.path().display());
        }
        KeyAction::Clear => {
            if key_file.clear()? {
                println!("Removed {}", key_file.path().display());
            } else {
                println!("No saved key");
            }
        }
    }
    Ok(())
}
