//! Session storage port and implementations.
//!
//! The persisted record is a single JSON file per profile with a fixed
//! name. The manager is the only writer; reads happen once, at
//! hydration. The trait exists so the backing medium can be swapped
//! (file, memory, platform keystore) without touching manager logic.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::error::{Result, SessionError};
use crate::session::Session;

/// Durable home of the current session record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the persisted session, `None` when no record exists.
    async fn load(&self) -> Result<Option<Session>>;

    /// Writes the session record, replacing any previous one.
    async fn save(&self, session: &Session) -> Result<()>;

    /// Deletes the record. Clearing an empty store is not an error.
    async fn clear(&self) -> Result<()>;
}

/// File-backed store: one JSON record at a fixed path.
#[derive(Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: gate_core::paths::session_file_path(data_dir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).await?;
        let session: Session = serde_json::from_str(&contents)?;
        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, contents).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }
}

/// In-memory store for tests and ephemeral profiles.
#[derive(Default)]
pub struct MemorySessionStore {
    record: tokio::sync::Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeds the store, standing in for a record written by an
    /// earlier process run.
    pub fn seeded(session: Session) -> Self {
        Self {
            record: tokio::sync::Mutex::new(Some(session)),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, session: &Session) -> Result<()> {
        *self.record.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.record.lock().await = None;
        Ok(())
    }
}
