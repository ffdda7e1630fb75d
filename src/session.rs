use std::{fmt, path::PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info};

use crate::config::Config;

/// Bearer credential for one signed-in user.
///
/// Acquired at login and handed explicitly to every API call; there is no
/// ambient token lookup.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// `FARM_API_TOKEN` wins; otherwise the session file, if any.
    pub async fn resolve(config: &Config, store: &SessionStore) -> Result<Option<Session>> {
        if let Some(token) = &config.api_token {
            debug!("Using token from FARM_API_TOKEN");
            return Ok(Some(Session::new(token.clone())));
        }
        store.load().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

/// Local credential store: a single token in a plain file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Returns `None` when the file is missing or blank.
    pub async fn load(&self) -> Result<Option<Session>> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| Session::new(token)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| {
                format!("failed to read session file {}", self.path.display())
            }),
        }
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&self.path, session.token())
            .await
            .with_context(|| format!("failed to write session file {}", self.path.display()))?;
        info!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    /// Removing a session that does not exist is not an error.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to remove session file {}", self.path.display())
            }),
        }
    }
}
