//! File token storage.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{OAuth2Error, StorageError};
use crate::storage::{decode_record, encode_record, TokenStorage};
use crate::token::Token;

/// Stores the token as a JSON record in a single file.
///
/// Writes replace the whole file; there is no atomic rename.
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn get(&self) -> Result<Option<Token>, OAuth2Error> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Token file unreadable");
                return Ok(None);
            }
        };
        decode_record(&raw, "file")
    }

    async fn save(&self, token: &Token) -> Result<(), OAuth2Error> {
        let raw = encode_record(token)?;
        tokio::fs::write(&self.path, raw).await.map_err(|e| {
            StorageError::WriteFailed {
                message: format!("{}: {}", self.path.display(), e),
            }
        })?;
        debug!(path = %self.path.display(), "Token written");
        Ok(())
    }

    async fn delete(&self) -> Result<(), OAuth2Error> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Token file removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed {
                message: format!("{}: {}", self.path.display(), e),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::jwt::tests::compact;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    fn token() -> Token {
        Token::new(
            compact(json!({"exp": 1_900_000_000, "sub": "u1", "scope": "read"})),
            Some("r1".to_string()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("oauth_token.json"));

        storage.save(&token()).await.unwrap();
        let loaded = storage.get().await.unwrap().unwrap();

        assert_eq!(loaded.compact(), token().compact());
        assert_eq!(loaded.refresh_credential(), Some("r1"));
    }

    #[tokio::test]
    async fn test_written_record_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth_token.json");
        FileTokenStorage::new(&path).save(&token()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["access_token"], json!(token().compact()));
        assert_eq!(raw["refresh_token"], json!("r1"));
        assert_eq!(raw["expires"], json!(1_900_000_000));
        assert_eq!(raw["resource_owner_id"], json!("u1"));
    }

    #[tokio::test]
    async fn test_reads_record_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        let record = json!({"access_token": token().compact(), "scope": "read", "expires": 1});
        std::fs::write(&path, record.to_string()).unwrap();

        let loaded = FileTokenStorage::new(&path).get().await.unwrap().unwrap();
        assert_eq!(loaded.refresh_credential(), None);
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_files_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("absent.json"));
        assert!(storage.get().await.unwrap().is_none());

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        assert!(FileTokenStorage::new(&corrupt).get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_undecodable_token_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"access_token":"trololo","refresh_token":"trololo"}"#).unwrap();

        assert_err!(FileTokenStorage::new(&path).get().await);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("oauth_token.json"));

        assert_ok!(storage.delete().await);
        storage.save(&token()).await.unwrap();
        assert_ok!(storage.delete().await);
        assert!(!storage.path().exists());
        assert!(storage.get().await.unwrap().is_none());
        assert_ok!(storage.delete().await);
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileTokenStorage::new(dir.path().join("missing-dir").join("token.json"));

        let result = storage.save(&token()).await;
        assert!(matches!(
            result,
            Err(OAuth2Error::Storage(StorageError::WriteFailed { .. }))
        ));
    }
}
