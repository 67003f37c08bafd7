//! Session credential sources.
//!
//! The realtime client never authenticates on its own; it reads the session
//! token and user id that the host application's auth flow left behind.
//!
//! [`FileSessionStore`] keeps them as JSON in the platform config directory:
//! - Linux: `~/.config/chatlink/session.json`
//! - macOS: `~/Library/Application Support/chatlink/session.json`
//! - Windows: `%APPDATA%\chatlink\session.json`

use std::path::{Path, PathBuf};

use chatlink_shared::SessionCredentials;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR: &str = "chatlink";
const SESSION_FILE: &str = "session.json";

/// Read-only view of the current auth session.
pub trait SessionStore: Send + Sync {
    fn session_token(&self) -> Option<String>;
    fn user_id(&self) -> Option<i64>;

    /// Both fields, if the auth flow has completed.
    fn credentials(&self) -> Option<SessionCredentials> {
        Some(SessionCredentials::new(self.session_token()?, self.user_id()?))
    }
}

/// In-memory session, typically filled straight from a login response.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    pub session_token: Option<String>,
    pub user_id: Option<i64>,
}

impl StaticSession {
    pub fn new(session_token: impl Into<String>, user_id: i64) -> Self {
        Self {
            session_token: Some(session_token.into()),
            user_id: Some(user_id),
        }
    }
}

impl SessionStore for StaticSession {
    fn session_token(&self) -> Option<String> {
        self.session_token.clone()
    }

    fn user_id(&self) -> Option<i64> {
        self.user_id
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no config directory available on this platform")]
    NoConfigDir,
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stored session data
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    session_token: Option<String>,
    user_id: Option<i64>,
}

/// Session persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store in the platform config directory, creating it if needed.
    pub fn open_default() -> Result<Self, SessionError> {
        let config_dir = dirs::config_dir().ok_or(SessionError::NoConfigDir)?;
        Self::in_dir(config_dir.join(APP_DIR))
    }

    /// Store in an explicit directory, creating it if needed.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self, SessionError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self {
            path: dir.join(SESSION_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist credentials for later runs.
    pub fn save(&self, credentials: &SessionCredentials) -> Result<(), SessionError> {
        let stored = StoredSession {
            session_token: Some(credentials.session_token.clone()),
            user_id: Some(credentials.user_id),
        };
        std::fs::write(&self.path, serde_json::to_string(&stored)?)?;
        Ok(())
    }

    /// Forget the stored session (logout).
    pub fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> Option<StoredSession> {
        let json = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&json) {
            Ok(stored) => Some(stored),
            Err(e) => {
                crate::log_warn!("Ignoring unreadable session file {:?}: {}", self.path, e);
                None
            }
        }
    }
}

impl SessionStore for FileSessionStore {
    fn session_token(&self) -> Option<String> {
        self.load()?.session_token
    }

    fn user_id(&self) -> Option<i64> {
        self.load()?.user_id
    }
}
