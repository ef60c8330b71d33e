//! Persisted skill and repository selection.
//!
//! Earlier screens store what the user picked in a small JSON file; a
//! session reads it once at startup.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::assess::model::{RepoIdentity, SessionInputs};
use crate::error::SessionError;

/// JSON file holding `{"selectedSkills": [...], "currentRepo": {...}}`.
pub struct SelectionStore {
    path: PathBuf,
}

impl SelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the selection. A missing file yields empty inputs, which fail
    /// validation when a session starts.
    pub async fn load(&self) -> Result<SessionInputs, SessionError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionInputs::default());
            }
            Err(e) => return Err(self.unreadable(e)),
        };
        serde_json::from_str(&raw).map_err(|e| self.unreadable(e))
    }

    /// Store the chosen skills.
    pub async fn save_skills(&self, skills: Vec<String>) -> Result<(), SessionError> {
        let mut inputs = self.load().await?;
        inputs.skills = Some(skills);
        self.save(&inputs).await
    }

    /// Store the chosen repository.
    pub async fn save_repo(&self, repo: RepoIdentity) -> Result<(), SessionError> {
        let mut inputs = self.load().await?;
        inputs.repo = Some(repo);
        self.save(&inputs).await
    }

    async fn save(&self, inputs: &SessionInputs) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.unwritable(e))?;
        }
        let json = serde_json::to_string_pretty(inputs).map_err(|e| self.unwritable(e))?;
        fs::write(&self.path, json)
            .await
            .map_err(|e| self.unwritable(e))?;
        tracing::debug!(path = %self.path.display(), "Selection saved");
        Ok(())
    }

    fn unreadable(&self, e: impl std::fmt::Display) -> SessionError {
        SessionError::SelectionUnreadable {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }

    fn unwritable(&self, e: impl std::fmt::Display) -> SessionError {
        SessionError::SelectionUnwritable {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_is_empty_selection() {
        let dir = TempDir::new().unwrap();
        let store = SelectionStore::new(dir.path().join("selection.json"));
        let inputs = store.load().await.unwrap();
        assert_eq!(inputs, SessionInputs::default());
        assert!(matches!(
            inputs.validate(),
            Err(SessionError::NoRepositorySelected)
        ));
    }

    #[tokio::test]
    async fn saves_skills_then_repo() {
        let dir = TempDir::new().unwrap();
        let store = SelectionStore::new(dir.path().join("nested/selection.json"));

        store.save_skills(vec!["rust".into(), "wasm".into()]).await.unwrap();
        store
            .save_repo(RepoIdentity::new("wasmtime", "bytecodealliance"))
            .await
            .unwrap();

        let (repo, skills) = store.load().await.unwrap().validate().unwrap();
        assert_eq!(repo.full_name(), "bytecodealliance/wasmtime");
        assert_eq!(skills.as_slice(), ["rust", "wasm"]);
    }

    #[tokio::test]
    async fn writes_camel_case_storage_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("selection.json");
        let store = SelectionStore::new(&path);
        store.save_repo(RepoIdentity::new("flask", "pallets")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["currentRepo"]["repo"], "flask");
        assert!(json["selectedSkills"].is_null());
    }

    #[tokio::test]
    async fn corrupt_file_is_unreadable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("selection.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = SelectionStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, SessionError::SelectionUnreadable { .. }));
    }
}
