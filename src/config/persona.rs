// Persona catalogue and roster selection
//
// Personas ship as a built-in TOML catalogue; config can override entries by id
// or append new ones. A roster is the ordered subset taking part in a discussion.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Smallest roster that makes a discussion.
pub const MIN_ROSTER: usize = 2;

/// Largest roster a discussion accepts.
pub const MAX_ROSTER: usize = 7;

const BUILTIN_PERSONAS: &str = include_str!("../../data/personas.toml");

/// A configured model identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Stable key (e.g., "claude", "grok")
    pub id: String,

    /// Display label used in the transcript
    #[serde(rename = "name")]
    pub display_name: String,

    /// Free-text style directive injected into the instruction message
    pub personality: String,

    /// Gateway model identifier (e.g., "openai/gpt-4o-mini")
    #[serde(rename = "model")]
    pub model_id: String,

    /// Hex colour for presentation only
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "#888888".to_string()
}

impl Persona {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        personality: impl Into<String>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            personality: personality.into(),
            model_id: model_id.into(),
            color: default_color(),
        }
    }
}

#[derive(Deserialize)]
struct CatalogueFile {
    #[serde(default)]
    persona: Vec<Persona>,
}

/// All personas a roster can be drawn from, in catalogue order
#[derive(Debug, Clone)]
pub struct PersonaCatalogue {
    personas: Vec<Persona>,
}

impl PersonaCatalogue {
    /// Load the catalogue compiled into the binary
    pub fn builtin() -> Result<Self> {
        let file: CatalogueFile =
            toml::from_str(BUILTIN_PERSONAS).context("Failed to parse builtin personas")?;
        Ok(Self {
            personas: file.persona,
        })
    }

    /// Apply config entries: same id replaces, new id appends
    pub fn merge(&mut self, overrides: Vec<Persona>) {
        for persona in overrides {
            match self.personas.iter_mut().find(|p| p.id == persona.id) {
                Some(existing) => *existing = persona,
                None => self.personas.push(persona),
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Ids of the first three personas
    pub fn default_roster_ids(&self) -> Vec<String> {
        self.personas.iter().take(3).map(|p| p.id.clone()).collect()
    }

    /// Build a roster in the order the ids are given
    pub fn roster<S: AsRef<str>>(&self, ids: &[S]) -> Result<Roster, RosterError> {
        let mut seen = HashSet::new();
        let mut personas = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            if !seen.insert(id) {
                return Err(RosterError::Duplicate(id.to_string()));
            }
            let persona = self
                .get(id)
                .ok_or_else(|| RosterError::Unknown(id.to_string()))?;
            personas.push(persona.clone());
        }
        Roster::new(personas)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("a discussion needs at least 2 personas, got {0}")]
    TooFew(usize),

    #[error("a discussion takes at most 7 personas, got {0}")]
    TooMany(usize),

    #[error("unknown persona '{0}'")]
    Unknown(String),

    #[error("persona '{0}' listed more than once")]
    Duplicate(String),
}

/// The ordered personas taking turns in one discussion. Fixed for the
/// lifetime of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    personas: Vec<Persona>,
}

impl Roster {
    pub fn new(personas: Vec<Persona>) -> Result<Self, RosterError> {
        if personas.len() < MIN_ROSTER {
            return Err(RosterError::TooFew(personas.len()));
        }
        if personas.len() > MAX_ROSTER {
            return Err(RosterError::TooMany(personas.len()));
        }
        let mut seen = HashSet::new();
        for persona in &personas {
            if !seen.insert(persona.id.as_str()) {
                return Err(RosterError::Duplicate(persona.id.clone()));
            }
        }
        Ok(Self { personas })
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Persona> {
        self.personas.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Persona> {
        self.personas.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.personas.iter().map(|p| p.id.clone()).collect()
    }
}
