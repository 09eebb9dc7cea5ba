//! Single-blob revisioned store backing the self-host server's `/v1/store`
//! (spec.md 4.9): an in-process reader/writer lock guards the map; PUT is a
//! read-modify-write under the write lock; persistence is atomic temp+rename
//! at mode 0600.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use crate::core::model::RemoteStore;
use crate::error::{Error, Result, TransportError};

pub struct Store {
    path: PathBuf,
    inner: RwLock<RemoteStore>,
}

impl Store {
    pub fn open(path: PathBuf) -> Self {
        let loaded = read_store(&path).unwrap_or_default();
        Store {
            path,
            inner: RwLock::new(loaded),
        }
    }

    pub async fn load(&self) -> RemoteStore {
        self.inner.read().await.clone()
    }

    /// Read-modify-write under the write lock: rejects if `expected_revision`
    /// doesn't match the current revision, else persists `next` with
    /// `revision = expected_revision + 1` and returns the saved store.
    pub async fn save(&self, mut next: RemoteStore, expected_revision: u64) -> Result<RemoteStore> {
        let mut guard = self.inner.write().await;
        if guard.revision != expected_revision {
            return Err(TransportError::RevisionConflict {
                expected: expected_revision,
                got: guard.revision,
            }
            .into());
        }
        next.revision = expected_revision + 1;
        write_store_atomic(&self.path, &next)?;
        *guard = next.clone();
        Ok(next)
    }
}

fn read_store(path: &Path) -> Result<RemoteStore> {
    match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(Error::Json),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RemoteStore::default()),
        Err(e) => Err(Error::Io(e)),
    }
}

fn write_store_atomic(path: &Path, store: &RemoteStore) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(Error::Io)?;
        set_dir_mode(parent);
    }
    let json = serde_json::to_string_pretty(store).map_err(Error::Json)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(Error::Io)?;
    set_file_mode(&tmp_path);
    fs::rename(&tmp_path, path).map_err(Error::Io)?;
    Ok(())
}

#[cfg(unix)]
fn set_file_mode(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
}
#[cfg(not(unix))]
fn set_file_mode(_path: &Path) {}

#[cfg(unix)]
fn set_dir_mode(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o700));
}
#[cfg(not(unix))]
fn set_dir_mode(_path: &Path) {}
