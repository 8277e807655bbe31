//! Persistent key/value store and the token accessor
//!
//! `FileStore` manages a JSON file mapping namespace → key → value. All
//! writes use atomic temp-file + rename to prevent corruption on crash. A
//! tokio Mutex serializes concurrent access from the request handlers and
//! the background exchange.
//!
//! `TokenStore` is the narrow accessor the rest of the crate goes through:
//! it pins the store to the `oauth` namespace and `token` key, so the
//! single persisted value can only be read, replaced, or cleared — never
//! enumerated or partially updated.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::constants::{OAUTH_NAMESPACE, TOKEN_KEY};
use crate::error::{Error, Result};

type Namespaces = HashMap<String, HashMap<String, String>>;

/// Thread-safe namespaced key/value file store.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<Namespaces>,
}

impl FileStore {
    /// Load the store from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` so future loads skip
    /// the cold-start path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading store file: {e}")))?;
            let namespaces: Namespaces = serde_json::from_str(&contents)
                .map_err(|e| Error::StoreParse(format!("parsing store file: {e}")))?;
            info!(path = %path.display(), namespaces = namespaces.len(), "loaded store");
            namespaces
        } else {
            info!(path = %path.display(), "store file not found, starting empty");
            let namespaces = Namespaces::new();
            write_atomic(&path, &namespaces).await?;
            namespaces
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Get a clone of the value stored under (namespace, key).
    pub async fn get(&self, namespace: &str, key: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.get(namespace).and_then(|ns| ns.get(key)).cloned()
    }

    /// Set the value under (namespace, key) and persist to disk.
    pub async fn set(&self, namespace: &str, key: &str, value: String) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        debug!(namespace, key, "stored value");
        write_atomic(&self.path, &state).await
    }

    /// Remove the value under (namespace, key) and persist to disk.
    ///
    /// Returns the removed value if it existed.
    pub async fn remove(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        let removed = state.get_mut(namespace).and_then(|ns| ns.remove(key));
        if removed.is_some() {
            debug!(namespace, key, "removed value");
            write_atomic(&self.path, &state).await?;
        }
        Ok(removed)
    }
}

/// Write the store to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file holds the bot access token.
async fn write_atomic(path: &Path, data: &Namespaces) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::StoreParse(format!("serializing store: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("store path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".store.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp store file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting store file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp store file: {e}")))?;

    debug!(path = %path.display(), "persisted store");
    Ok(())
}

/// Accessor for the single persisted token.
///
/// Every operation is atomic under the store's lock, so the authenticate
/// path's read and the exchanger's write cannot interleave mid-operation.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<FileStore>,
}

impl TokenStore {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    /// The persisted token, if any. Absence means "not authenticated".
    pub async fn token(&self) -> Option<String> {
        self.store.get(OAUTH_NAMESPACE, TOKEN_KEY).await
    }

    /// Persist a token, replacing any previous value.
    pub async fn put(&self, token: &str) -> Result<()> {
        self.store
            .set(OAUTH_NAMESPACE, TOKEN_KEY, token.to_owned())
            .await
    }

    /// Delete the persisted token. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(OAUTH_NAMESPACE, TOKEN_KEY).await.map(|_| ())
    }
}
