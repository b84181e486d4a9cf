// # File Token Store
//
// File-based implementation of TokenStore.
//
// ## Purpose
//
// Persists the push recipient token across daemon restarts so a phone only
// has to register once.
//
// ## Atomicity
//
// - Single writer: updates are serialized through a mutex
// - Atomic replace: the record is written to a temporary file, synced, then
//   renamed over the real path, so a concurrent `get` sees either the old
//   token or the new one, never a torn write
// - Missing file: reported as "no token", not as an error
// - Corrupt file: reported as a store error, never as "no token"
//
// ## File Format
//
// ```json
// {
//   "payload": "fcm-registration-token",
//   "created_at": "2025-01-09T12:00:00Z"
// }
// ```

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::Error;
use crate::traits::token_store::{Token, TokenStore};

/// File-based token store with atomic overwrite
///
/// # Example
///
/// ```rust,no_run
/// use firealert_core::state::FileTokenStore;
/// use firealert_core::traits::{Token, TokenStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileTokenStore::new("/var/lib/firealert/user-token.json");
///
///     store.update(Token::issued_now("device-token")?).await?;
///
///     let token = store.get().await?;
///     assert_eq!(token.map(|t| t.payload().to_string()), Some("device-token".into()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    /// Create a store backed by `path`
    ///
    /// Nothing touches the filesystem until the first `update`; the parent
    /// directory is created lazily then.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the token record
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn ensure_parent_dir(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::token_store(format!(
                    "Failed to create token directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Write the record atomically (caller holds the write lock)
    async fn write_record(&self, json: &[u8]) -> Result<(), Error> {
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::token_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json).await.map_err(|e| {
                Error::token_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::token_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::token_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn update(&self, token: Token) -> Result<(), Error> {
        if token.payload().trim().is_empty() {
            return Err(Error::invalid_argument("Token payload cannot be empty"));
        }

        let json = serde_json::to_vec(&token)
            .map_err(|e| Error::token_store(format!("Failed to serialize token: {}", e)))?;

        let _guard = self.write_lock.lock().await;
        self.ensure_parent_dir().await?;
        self.write_record(&json).await?;

        tracing::debug!("Recipient token written to {}", self.path.display());
        Ok(())
    }

    async fn get(&self) -> Result<Option<Token>, Error> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::trace!("Token file does not exist: {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::token_store(format!(
                    "Failed to read token file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let token = serde_json::from_slice(&content).map_err(|e| {
            Error::token_store(format!(
                "Failed to parse token file {}: {}. \
                 File may be corrupted; register the device again.",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(token))
    }
}
