//! TOML-based SessionRepository implementation.
//!
//! Stores each session as an individual TOML file under a sessions
//! directory:
//!
//! ```text
//! base_dir/
//! └── sessions/
//!     ├── <session-id-1>.toml
//!     └── <session-id-2>.toml
//! ```
//!
//! Writes go through a temporary file followed by an atomic rename, so a
//! crash mid-write never leaves a truncated session on disk.

use async_trait::async_trait;
use opro_core::error::{OproError, Result};
use opro_core::session::{Session, SessionRepository};
use std::fs;
use std::path::{Path, PathBuf};

pub struct TomlSessionRepository {
    base_dir: PathBuf,
}

impl TomlSessionRepository {
    /// Creates a repository rooted at `base_dir`, creating the sessions
    /// directory if needed.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(base_dir.join("sessions"))?;
        Ok(Self { base_dir })
    }

    /// Creates a repository at the default location (`~/.opro`).
    pub fn default_location() -> Result<Self> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| OproError::data_access("failed to determine home directory"))?;
        Self::new(home_dir.join(".opro"))
    }

    fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.base_dir
            .join("sessions")
            .join(format!("{}.toml", session_id))
    }

    /// Serializes and writes atomically: tmp file then rename.
    fn write_session(&self, session: &Session) -> Result<()> {
        let path = self.session_file_path(&session.id);
        let content = toml::to_string_pretty(session)?;
        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn read_session(path: &Path) -> Result<Session> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

#[async_trait]
impl SessionRepository for TomlSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let path = self.session_file_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_session(&path)?))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.write_session(session)
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.session_file_path(session_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let sessions_dir = self.base_dir.join("sessions");
        let mut sessions = Vec::new();

        for entry in fs::read_dir(&sessions_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            match Self::read_session(&path) {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    // skip unreadable files rather than failing the listing
                    tracing::warn!(path = %path.display(), "skipping unreadable session file: {err}");
                }
            }
        }

        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opro_core::session::OproConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let repo = TomlSessionRepository::new(dir.path()).unwrap();

        let mut session = Session::new("s", OproConfig::default());
        session
            .add_candidates(vec!["think step by step".to_string()])
            .unwrap();
        let id = session.current_step().prompts[0].id.clone();
        let p = session.find_prompt_mut(&id).unwrap();
        p.begin_scoring().unwrap();
        p.complete_scoring(62.5).unwrap();

        repo.save(&session).await.unwrap();
        let found = repo.find_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found, session);
        assert_eq!(found.find_prompt(&id).unwrap().score, Some(62.5));
    }

    #[tokio::test]
    async fn test_missing_session_is_none() {
        let dir = TempDir::new().unwrap();
        let repo = TomlSessionRepository::new(dir.path()).unwrap();
        assert!(repo.find_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_skips_unreadable_files() {
        let dir = TempDir::new().unwrap();
        let repo = TomlSessionRepository::new(dir.path()).unwrap();

        let session = Session::new("s", OproConfig::default());
        repo.save(&session).await.unwrap();
        fs::write(dir.path().join("sessions").join("junk.toml"), "not toml [").unwrap();

        let all = repo.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, session.id);
    }

    #[tokio::test]
    async fn test_delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let repo = TomlSessionRepository::new(dir.path()).unwrap();
        let session = Session::new("s", OproConfig::default());
        repo.save(&session).await.unwrap();

        repo.delete(&session.id).await.unwrap();
        assert!(repo.find_by_id(&session.id).await.unwrap().is_none());
        // deleting again is fine
        repo.delete(&session.id).await.unwrap();
    }
}
