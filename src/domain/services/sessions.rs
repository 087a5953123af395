#[cfg(test)]
#[path = "sessions_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use chrono::DateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::domain::models::Session;

pub struct Sessions {
    pub cache_dir: path::PathBuf,
}

impl Default for Sessions {
    fn default() -> Sessions {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("recast/sessions");

        return Sessions::new(cache_dir);
    }
}

impl Sessions {
    pub fn new(cache_dir: path::PathBuf) -> Sessions {
        return Sessions { cache_dir };
    }

    pub fn create_id() -> String {
        return Uuid::new_v4()
            .to_string()
            .split('-')
            .enumerate()
            .filter_map(|(idx, str)| {
                if idx > 1 {
                    return None;
                }
                return Some(str);
            })
            .collect::<Vec<&str>>()
            .join("-");
    }

    fn get_file_path(&self, id: &str) -> path::PathBuf {
        return self.cache_dir.join(format!("{id}.yaml"));
    }

    /// Returns all saved sessions, oldest first.
    pub async fn list(&self) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = vec![];
        if !self.cache_dir.exists() {
            return Ok(sessions);
        }

        let mut dir = fs::read_dir(&self.cache_dir).await?;
        while let Some(file) = dir.next_entry().await? {
            let payload = fs::read_to_string(file.path()).await?;
            match serde_yaml::from_str::<Session>(&payload) {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    tracing::warn!(path = ?file.path(), error = %err, "Skipping unreadable session file");
                }
            }
        }

        sessions.sort_by_cached_key(|session| {
            return DateTime::parse_from_rfc3339(&session.timestamp)
                .map(|timestamp| return timestamp.timestamp())
                .unwrap_or_default();
        });

        return Ok(sessions);
    }

    pub async fn load(&self, id: &str) -> Result<Session> {
        let file_path = self.get_file_path(id);
        if !file_path.exists() {
            bail!(format!("No session found for id {id}"));
        }

        let payload = fs::read_to_string(file_path).await?;
        let session: Session = serde_yaml::from_str(&payload)?;

        return Ok(session);
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        let payload = serde_yaml::to_string(session)?;

        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir).await?;
        }

        let mut file = fs::File::create(self.get_file_path(&session.id)).await?;
        file.write_all(payload.as_bytes()).await?;

        tracing::debug!(session_id = %session.id, "Session saved");
        return Ok(());
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let file_path = self.get_file_path(id);
        if !file_path.exists() {
            return Ok(());
        }

        fs::remove_file(file_path).await?;
        return Ok(());
    }

    pub async fn delete_all(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            return Ok(());
        }

        fs::remove_dir_all(&self.cache_dir).await?;
        return Ok(());
    }
}
