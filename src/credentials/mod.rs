// Gateway credential handling
//
// A credential is resolved once, before a discussion starts, from an ordered
// list of sources: explicit value, local key file, remote key issuer.

use std::fmt;
use thiserror::Error;

pub mod issuer;
pub mod key_file;

pub use issuer::KeyIssuer;
pub use key_file::KeyFile;

/// Every OpenRouter key starts with this literal.
pub const CREDENTIAL_PREFIX: &str = "sk-or-";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("OpenRouter API key is missing")]
    Missing,

    #[error("invalid OpenRouter API key format, should start with 'sk-or-'")]
    Malformed,

    #[error("key issuer failed: {0}")]
    Issuer(String),

    #[error("key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Access token for the completions gateway.
///
/// Construction does not validate; `validate` is called by whoever is about
/// to use it, so a bad key is rejected before any request goes out.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.0.is_empty() {
            Err(CredentialError::Missing)
        } else if !self.0.starts_with(CREDENTIAL_PREFIX) {
            Err(CredentialError::Malformed)
        } else {
            Ok(())
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

/// Where a resolved credential came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Explicit,
    KeyFile,
    Issuer,
}

/// Resolves the credential in priority order: explicit value, local key
/// file, remote issuer. Malformed candidates are skipped.
pub struct CredentialResolver {
    explicit: Option<String>,
    key_file: Option<KeyFile>,
    issuer: Option<KeyIssuer>,
}

impl CredentialResolver {
    pub fn new() -> Self {
        Self {
            explicit: None,
            key_file: None,
            issuer: None,
        }
    }

    pub fn with_explicit(mut self, key: Option<String>) -> Self {
        self.explicit = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_key_file(mut self, key_file: KeyFile) -> Self {
        self.key_file = Some(key_file);
        self
    }

    pub fn with_issuer(mut self, issuer: KeyIssuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub async fn resolve(&self) -> Result<(Credential, CredentialSource), CredentialError> {
        let mut rejected = false;

        if let Some(raw) = &self.explicit {
            let credential = Credential::new(raw.as_str());
            match credential.validate() {
                Ok(()) => {
                    self.remember(&credential);
                    return Ok((credential, CredentialSource::Explicit));
                }
                Err(e) => {
                    tracing::warn!("Ignoring explicit API key: {}", e);
                    rejected = true;
                }
            }
        }

        if let Some(key_file) = &self.key_file {
            match key_file.load() {
                Ok(Some(credential)) if credential.is_valid() => {
                    return Ok((credential, CredentialSource::KeyFile));
                }
                Ok(Some(_)) => {
                    tracing::warn!("Ignoring malformed key in {}", key_file.path().display());
                    rejected = true;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("{}", e),
            }
        }

        if let Some(issuer) = &self.issuer {
            match issuer.fetch().await {
                Ok(credential) if credential.is_valid() => {
                    self.remember(&credential);
                    return Ok((credential, CredentialSource::Issuer));
                }
                Ok(_) => {
                    tracing::warn!("Key issuer returned a malformed key");
                    rejected = true;
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }

        if rejected {
            Err(CredentialError::Malformed)
        } else {
            Err(CredentialError::Missing)
        }
    }

    fn remember(&self, credential: &Credential) {
        let Some(key_file) = &self.key_file else {
            return;
        };
        if let Err(e) = key_file.store(credential) {
            tracing::warn!("Could not persist API key: {}", e);
        }
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new()
    }
}
