// Markdown export of a transcript

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use super::transcript::{Role, Transcript};

/// Render the transcript as a markdown document, oldest message first
pub fn to_markdown(
    topic: &str,
    transcript: &Transcript,
    user_name: &str,
    generated_at: DateTime<Local>,
) -> String {
    let mut doc = String::from("# AI Models Discussion\n\n");
    doc.push_str(&format!("Topic: {}\n\n", topic));
    doc.push_str(&format!(
        "Date: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));

    for message in transcript.messages() {
        let speaker = match message.role {
            Role::User => user_name,
            Role::System => "System",
            Role::Assistant => message.speaker_name.as_str(),
        };
        doc.push_str(&format!("## {}\n\n{}\n\n", speaker, message.content));
    }
    doc
}

/// `ai-discussion-<unix millis>.md`
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("ai-discussion-{}.md", now.timestamp_millis())
}

/// Write the export to `target`, or to a timestamped file in the current
/// directory. Returns the path written.
pub fn write_markdown(
    topic: &str,
    transcript: &Transcript,
    user_name: &str,
    target: Option<&Path>,
) -> Result<PathBuf> {
    let path = match target {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(export_filename(Utc::now())),
    };
    let doc = to_markdown(topic, transcript, user_name, Local::now());
    fs::write(&path, doc)
        .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Persona;
    use crate::discussion::Message;
    use chrono::TimeZone;

    #[test]
    fn test_markdown_layout() {
        let claude = Persona::new("claude", "Claude", "analytical", "anthropic/claude-3-opus");
        let grok = Persona::new("grok", "Grok", "witty", "x-ai/grok-2-1212");
        let mut transcript = Transcript::new();
        transcript.push(Message::topic_seed("Ada", "tides"));
        transcript.push(Message::assistant(&claude, "Gravity, mostly."));
        transcript.push(Message::turn_failure(&grok, "timeout"));

        let at = Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let doc = to_markdown("tides", &transcript, "Ada", at);

        assert_eq!(
            doc,
            "# AI Models Discussion\n\n\
             Topic: tides\n\n\
             Date: 2024-05-01 09:30:00\n\n\
             ## Ada\n\nThe topic for discussion is: \"tides\"\n\n\
             ## Claude\n\nGravity, mostly.\n\n\
             ## System\n\nError with Grok's response: timeout\n\n"
        );
    }

    #[test]
    fn test_filename_uses_millis() {
        let at = Utc.timestamp_millis_opt(1_714_555_800_123).unwrap();
        assert_eq!(export_filename(at), "ai-discussion-1714555800123.md");
    }

    #[test]
    fn test_write_does_not_touch_transcript() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut transcript = Transcript::new();
        transcript.push(Message::topic_seed("You", "tides"));
        let before = transcript.clone();

        let target = dir.path().join("out.md");
        let written = write_markdown("tides", &transcript, "You", Some(&target)).unwrap();
        assert_eq!(written, target);
        assert!(fs::read_to_string(&target).unwrap().starts_with("# AI Models Discussion"));
        assert_eq!(transcript, before);
    }
}
