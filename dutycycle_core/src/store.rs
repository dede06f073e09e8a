//! [`VariableStore`] backends: a file-backed flat TOML table of
//! `"id" = value`, rewritten atomically on every save, and an in-memory map
//! for peers that do not need to survive a restart.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::{fs, io::Write};

use dutycycle_traits::VariableStore;
use eyre::WrapErr;

use crate::util::lock;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Replace `path` with `bytes` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, i64>,
    /// `values` holds changes the file does not have yet.
    dirty: bool,
}

impl FileStore {
    /// Open `path`, reading existing values. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)
                .wrap_err_with(|| format!("parsing state file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).wrap_err_with(|| format!("reading state file {}", path.display()));
            }
        };
        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), BoxError> {
        let text = toml::to_string(&self.values)?;
        write_atomic(&self.path, text.as_bytes())?;
        Ok(())
    }
}

impl VariableStore for FileStore {
    fn load(&self, id: u32) -> Result<Option<i64>, BoxError> {
        Ok(self.values.get(&id.to_string()).copied())
    }

    fn save(&mut self, id: u32, value: i64) -> Result<(), BoxError> {
        let key = id.to_string();
        if !self.dirty && self.values.get(&key) == Some(&value) {
            return Ok(());
        }
        self.values.insert(key, value);
        let flushed = self.flush();
        self.dirty = flushed.is_err();
        flushed
    }
}

/// In-memory variable store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<u32, i64>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn get(&self, id: u32) -> Option<i64> {
        lock(&self.values).get(&id).copied()
    }

    pub fn set(&self, id: u32, value: i64) {
        lock(&self.values).insert(id, value);
    }

    /// Make every subsequent `save` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }
}

impl VariableStore for MemoryStore {
    fn load(&self, id: u32) -> Result<Option<i64>, BoxError> {
        Ok(self.get(id))
    }

    fn save(&mut self, id: u32, value: i64) -> Result<(), BoxError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("memory store is read-only")));
        }
        self.set(id, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("state.toml")).unwrap();
        assert_eq!(store.load(1006).unwrap(), None);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.save(1006, 1_700_000_000_000_000).unwrap();
            store.save(1007, 42).unwrap();
            store.save(1000, -1).unwrap();
        }
        assert!(!path.with_extension("new").exists());
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.load(1006).unwrap(), Some(1_700_000_000_000_000));
        assert_eq!(store.load(1007).unwrap(), Some(42));
        assert_eq!(store.load(1000).unwrap(), Some(-1));
    }

    #[test]
    fn corrupt_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "not = [valid").unwrap();
        let err = FileStore::open(&path).unwrap_err();
        assert!(err.to_string().contains("state.toml"));
    }

    #[test]
    fn failed_flush_is_retried_on_next_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        let mut store = FileStore::open(&path).unwrap();

        // A directory where the temp file goes makes the write fail.
        let blocker = path.with_extension("new");
        fs::create_dir(&blocker).unwrap();
        assert!(store.save(1006, 42).is_err());
        assert_eq!(FileStore::open(&path).unwrap().load(1006).unwrap(), None);

        fs::remove_dir(&blocker).unwrap();
        store.save(1006, 42).unwrap();
        assert_eq!(FileStore::open(&path).unwrap().load(1006).unwrap(), Some(42));
    }

    #[test]
    fn memory_store_clones_share_values() {
        let store = MemoryStore::default();
        let mut writer = store.clone();
        writer.save(1007, 9).unwrap();
        assert_eq!(store.load(1007).unwrap(), Some(9));

        store.fail_writes(true);
        assert!(writer.save(1007, 10).is_err());
        assert_eq!(store.get(1007), Some(9));
    }
}
