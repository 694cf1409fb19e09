use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use passvault_core::{normalize_id, Error, Result, Storage};
use tracing::{instrument, warn};

use crate::{dump, file_store::FileStorage};

/// Ephemeral store keeping every entry in one map behind one lock.
///
/// Unlike [`FileStorage`], `dump_json` and `load_json` run under that lock and are
/// therefore atomic. The disk transfers (`write_to_disk`, `read_from_disk`) are not.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.inner.lock().map_err(|err| Error::Io {
            reason: format!("lock poisoned: {err}"),
        })
    }

    fn snapshot(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .entries()?
            .iter()
            .map(|(id, data)| (id.clone(), data.clone()))
            .collect())
    }
}

impl Storage for MemoryStorage {
    fn store(&self, id: &str, data: &str) -> Result<()> {
        self.entries()?.insert(normalize_id(id), data.to_string());
        Ok(())
    }

    fn retrieve(&self, id: &str) -> Result<String> {
        let id = normalize_id(id);
        self.entries()?
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound { id })
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.entries()?.contains_key(&normalize_id(id)))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.keys().cloned().collect())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let id = normalize_id(id);
        match self.entries()?.remove(&id) {
            Some(_) => Ok(()),
            None => Err(Error::NotFound { id }),
        }
    }

    fn clean(&self) -> Result<()> {
        self.entries()?.clear();
        Ok(())
    }

    fn dump_json(&self) -> Result<String> {
        let entries = self.entries()?;
        dump::render(&entries)
    }

    fn load_json(&self, input: &str) -> Result<()> {
        let loaded = dump::parse(input)?;
        let mut entries = self.entries()?;
        for (id, data) in loaded {
            entries.insert(normalize_id(&id), data);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn write_to_disk(&self, path: &Path) -> Result<()> {
        let disk = FileStorage::new(path);

        let mut last_err = None;
        for (id, data) in self.snapshot()? {
            if let Err(err) = disk.store(&id, &data) {
                warn!(%id, error = %err, "failed to write entry to disk");
                last_err = Some(err);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    #[instrument(skip(self))]
    fn read_from_disk(&self, path: &Path) -> Result<()> {
        let disk = FileStorage::new(path);

        let mut last_err = None;
        for id in disk.list()? {
            let copied = disk.retrieve(&id).and_then(|data| self.store(&id, &data));
            if let Err(err) = copied {
                warn!(%id, error = %err, "failed to read entry from disk");
                last_err = Some(err);
            }
        }
        last_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn round_trip_with_normalized_ids() {
        let store = MemoryStorage::new();
        store.store("Agent\\Session", "payload").expect("store");

        assert_eq!(store.retrieve("agent/session").expect("retrieve"), "payload");
        assert!(store.exists("AGENT/SESSION").expect("exists"));
        assert_eq!(store.list().expect("list"), vec!["agent/session"]);
    }

    #[test]
    fn delete_and_retrieve_missing_fail() {
        let store = MemoryStorage::new();
        store.store("k", "v").expect("store");
        store.delete("k").expect("delete");

        assert_eq!(store.delete("k"), Err(Error::NotFound { id: "k".into() }));
        assert_eq!(store.retrieve("k"), Err(Error::NotFound { id: "k".into() }));
        assert!(!store.exists("k").expect("exists"));
    }

    #[test]
    fn list_is_sorted_and_clean_empties() {
        let store = MemoryStorage::new();
        for id in ["c", "a", "b/a"] {
            store.store(id, id).expect("store");
        }
        assert_eq!(store.list().expect("list"), vec!["a", "b/a", "c"]);

        store.clean().expect("clean");
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn dump_and_load() {
        let store = MemoryStorage::new();
        store.store("x", "<1>").expect("store");
        store.store("y", "2").expect("store");
        let dump = store.dump_json().expect("dump");
        assert_eq!(dump, r#"{"x":"<1>","y":"2"}"#);

        let other = MemoryStorage::new();
        other.load_json(&dump).expect("load");
        assert_eq!(other.retrieve("x").expect("retrieve"), "<1>");

        let err = other.load_json(r#"{"z":"3","w":[1]}"#).expect_err("array value");
        assert!(matches!(err, Error::Encoding { .. }));
        assert!(!other.exists("z").expect("exists"));
    }

    #[test]
    fn disk_transfer_preserves_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = MemoryStorage::new();
        store.store("group/one", "1").expect("store");
        store.store("two", "2").expect("store");

        store.write_to_disk(dir.path()).expect("write to disk");
        let disk = FileStorage::new(dir.path());
        assert_eq!(disk.list().expect("list"), vec!["group/one", "two"]);

        let restored = MemoryStorage::new();
        restored.read_from_disk(dir.path()).expect("read from disk");
        assert_eq!(restored.retrieve("group/one").expect("retrieve"), "1");
        assert_eq!(restored.retrieve("two").expect("retrieve"), "2");
    }

    #[test]
    fn write_to_disk_continues_past_failed_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("blocker"), "x").expect("write blocker");
        let store = MemoryStorage::new();
        for id in ["a", "blocker/x", "z"] {
            store.store(id, id).expect("store");
        }

        let err = store.write_to_disk(dir.path()).expect_err("blocked entry");
        assert!(matches!(err, Error::Io { .. }));
        let disk = FileStorage::new(dir.path());
        assert_eq!(disk.list().expect("list"), vec!["a", "z"]);
    }

    #[test]
    fn read_from_disk_continues_past_failed_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.pwd"), "1").expect("write");
        fs::write(dir.path().join("bad.pwd"), [0xff, 0xfe]).expect("write invalid utf8");
        fs::write(dir.path().join("z.pwd"), "2").expect("write");

        let store = MemoryStorage::new();
        let err = store.read_from_disk(dir.path()).expect_err("invalid entry");
        assert!(matches!(err, Error::Encoding { .. }));
        assert_eq!(store.list().expect("list"), vec!["a", "z"]);
    }

    #[test]
    fn path_operations_are_unsupported() {
        let store = MemoryStorage::new();
        assert!(matches!(
            store.store_path(),
            Err(Error::UnsupportedBackend { .. })
        ));
        assert!(matches!(
            store.set_file_ending("x"),
            Err(Error::UnsupportedBackend { .. })
        ));
    }
}
