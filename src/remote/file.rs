//! File remote backend (C4.1): a flat `remote_store.json` guarded by an
//! exclusive advisory lock on a sibling `.lock` file for the whole
//! read-modify-write (spec.md 4.4.1).

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fd_lock::RwLock as FileLock;

use crate::core::model::RemoteStore;
use crate::core::state;
use crate::error::{Error, Result, TransportError};

use super::Remote;

pub struct FileRemote {
    path: PathBuf,
}

impl FileRemote {
    pub fn new(path: PathBuf) -> Self {
        FileRemote { path }
    }

    /// `~/.config/envsync/remote_store.json`, unless `ENVSYNC_REMOTE_FILE`
    /// overrides it.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(p) = std::env::var("ENVSYNC_REMOTE_FILE") {
            return Ok(PathBuf::from(p));
        }
        Ok(state::config_dir()?.join("remote_store.json"))
    }

    fn lock_path(&self) -> PathBuf {
        let mut s = self.path.as_os_str().to_owned();
        s.push(".lock");
        PathBuf::from(s)
    }

    fn open_lock_file(&self) -> Result<File> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(Error::Io)
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

impl Remote for FileRemote {
    fn load(&self) -> Result<RemoteStore> {
        let lock_file = self.open_lock_file()?;
        let mut lock = FileLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| TransportError::Lock(e.to_string()))?;
        read_store(&self.path)
    }

    fn save(&self, store: &RemoteStore, expected_revision: u64) -> Result<()> {
        let lock_file = self.open_lock_file()?;
        let mut lock = FileLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| TransportError::Lock(e.to_string()))?;

        let current = read_store(&self.path)?;
        if current.revision != expected_revision {
            return Err(TransportError::RevisionConflict {
                expected: expected_revision,
                got: current.revision,
            }
            .into());
        }

        let mut next = store.clone();
        next.revision = expected_revision + 1;
        write_store_atomic(&self.path, &next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Project;

    #[test]
    fn empty_remote_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FileRemote::new(dir.path().join("remote_store.json"));
        let store = remote.load().unwrap();
        assert_eq!(store.revision, 0);
        assert!(store.projects.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FileRemote::new(dir.path().join("remote_store.json"));
        let mut store = RemoteStore::default();
        store.projects.insert("api".into(), Project::new("api"));
        remote.save(&store, 0).unwrap();

        let loaded = remote.load().unwrap();
        assert_eq!(loaded.revision, 1);
        assert!(loaded.projects.contains_key("api"));
    }

    #[test]
    fn stale_expected_revision_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FileRemote::new(dir.path().join("remote_store.json"));
        let store = RemoteStore::default();
        remote.save(&store, 0).unwrap();

        let err = remote.save(&store, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::RevisionConflict {
                expected: 0,
                got: 1
            })
        ));
    }
}
