// Locally persisted API key (plain text, owner-only on unix)

use std::fs;
use std::path::{Path, PathBuf};

use super::{Credential, CredentialError};

#[derive(Debug, Clone)]
pub struct KeyFile {
    path: PathBuf,
}

impl KeyFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist or is blank
    pub fn load(&self) -> Result<Option<Credential>, CredentialError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.error(e))?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credential::new(trimmed)))
    }

    pub fn store(&self, credential: &Credential) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.error(e))?;
        }
        fs::write(&self.path, format!("{}\n", credential.expose())).map_err(|e| self.error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|e| self.error(e))?;
        }

        tracing::debug!("Stored API key at {}", self.path.display());
        Ok(())
    }

    /// Returns whether a file was removed
    pub fn clear(&self) -> Result<bool, CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.error(e)),
        }
    }

    fn error(&self, source: std::io::Error) -> CredentialError {
        CredentialError::KeyFile {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_load_clear() {
        let dir = TempDir::new().unwrap();
        let key_file = KeyFile::new(dir.path().join("nested").join("key"));

        assert!(key_file.load().unwrap().is_none());
        key_file.store(&Credential::new("sk-or-abc")).unwrap();
        assert_eq!(key_file.load().unwrap().unwrap().expose(), "sk-or-abc");

        assert!(key_file.clear().unwrap());
        assert!(!key_file.clear().unwrap());
        assert!(key_file.load().unwrap().is_none());
    }
}
