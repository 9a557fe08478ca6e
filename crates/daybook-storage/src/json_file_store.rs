use std::{
    fmt::Write as _,
    fs::{self, File},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use daybook_core::storage::{DocumentStore, StoreError};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

/// Directory of `<key>.json` files implementing the shared `DocumentStore` contract.
///
/// Writes go to a temp file in the same directory and are renamed into place,
/// so a reader never sees a half-written document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    #[instrument(skip_all, fields(key))]
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key);
        write_atomic(&path, value)?;
        debug!(bytes = value.len(), path = %path.display(), "document written");
        Ok(())
    }

    #[instrument(skip_all, fields(key))]
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key);
        let mut file = File::open(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound {
                    key: key.to_string(),
                }
            } else {
                storage_err(err)
            }
        })?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(storage_err)?;
        Ok(buf)
    }

    #[instrument(skip_all, fields(key))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| StoreError::Storage {
        reason: "invalid storage path".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(storage_err)?;
    tmp.write_all(bytes).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

/// Keys become file stems; anything outside `[A-Za-z0-9_-]` is hex-escaped
/// so distinct keys never share a file.
fn sanitize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

fn storage_err<E: ToString>(err: E) -> StoreError {
    StoreError::Storage {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_plain_json_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("data"));

        store.put("tasks", br#"[{"name":"x"}]"#).await.expect("put");
        assert_eq!(
            store.get("tasks").await.expect("get"),
            br#"[{"name":"x"}]"#.to_vec()
        );

        let on_disk = fs::read_to_string(dir.path().join("data").join("tasks.json"))
            .expect("read file");
        assert_eq!(on_disk, r#"[{"name":"x"}]"#);

        store.put("tasks", b"[]").await.expect("overwrite");
        assert_eq!(store.get("tasks").await.expect("get"), b"[]".to_vec());
    }

    #[tokio::test]
    async fn missing_key_and_idempotent_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path());

        let err = store.get("session").await.expect_err("missing");
        assert_eq!(
            err,
            StoreError::NotFound {
                key: "session".into()
            }
        );

        store.put("session", b"{}").await.expect("put");
        store.delete("session").await.expect("delete");
        store.delete("session").await.expect("delete again");
        assert!(store.get("session").await.is_err());
    }

    #[test]
    fn keys_cannot_escape_the_root() {
        assert_eq!(sanitize_key("history"), "history");
        assert_eq!(sanitize_key("../etc/passwd"), "%2E%2E%2Fetc%2Fpasswd");
        assert_ne!(sanitize_key("a/b"), sanitize_key("a_b"));
    }
}
