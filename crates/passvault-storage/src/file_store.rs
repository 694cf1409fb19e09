use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Component, Path, PathBuf},
};

use parking_lot::RwLock;
use passvault_core::{
    id::{normalize_id, normalize_separator},
    Error, Result, Storage,
};
use tempfile::NamedTempFile;
use tracing::{instrument, warn};
use walkdir::WalkDir;

use crate::{dump, lock_table::LockTable};

/// Default relative root of a file store.
pub const DEFAULT_STORE_PATH: &str = "./password";
/// Default extension of stored entries.
pub const DEFAULT_FILE_ENDING: &str = "pwd";

const TEMP_SUFFIX: &str = ".partial";
const FALLBACK_TEMP_SUFFIX: &str = ".tmp";

#[cfg(unix)]
const STORAGE_FILE_MODE: u32 = 0o600;
#[cfg(unix)]
const STORAGE_DIR_MODE: u32 = 0o700;

/// Disk-backed store: one owner-only file per id at `root/<normalized id>.<ending>`.
///
/// Reads, writes and deletes of the same id are serialized through a [`LockTable`]. The
/// bulk operations (`list`, `clean`, `dump_json`, `load_json`) take no global lock and can
/// observe a snapshot that is stale relative to concurrent writers.
#[derive(Debug)]
pub struct FileStorage {
    settings: RwLock<Settings>,
    locks: LockTable,
}

#[derive(Debug, Clone)]
struct Settings {
    root: PathBuf,
    ending: String,
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new(DEFAULT_STORE_PATH)
    }
}

impl FileStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            settings: RwLock::new(Settings {
                root: resolve_store_path(root.as_ref()),
                ending: DEFAULT_FILE_ENDING.to_string(),
            }),
            locks: LockTable::new(),
        }
    }

    /// Absolute, lexically cleaned store root.
    pub fn root(&self) -> PathBuf {
        self.settings.read().root.clone()
    }

    /// Accepts mixed `/` and `\` separators; relative paths resolve against the
    /// current directory.
    pub fn set_root(&self, root: impl AsRef<Path>) {
        self.settings.write().root = resolve_store_path(root.as_ref());
    }

    pub fn ending(&self) -> String {
        self.settings.read().ending.clone()
    }

    pub fn set_ending(&self, ending: &str) {
        self.settings.write().ending = ending.to_string();
    }

    /// Location of the file backing `id`, using native separators.
    pub fn path_for(&self, id: &str) -> PathBuf {
        let settings = self.settings.read();
        let relative = format!("{}.{}", normalize_id(id), settings.ending);
        let mut path = settings.root.clone();
        for segment in relative.split('/') {
            path.push(segment);
        }
        path
    }

    /// Number of ids currently locked or awaited.
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }
}

impl Storage for FileStorage {
    #[instrument(skip(self, data))]
    fn store(&self, id: &str, data: &str) -> Result<()> {
        let path = self.path_for(id);
        let parent = path.parent().ok_or_else(|| Error::Io {
            reason: "invalid storage path".to_string(),
        })?;
        create_private_dir(parent)?;

        let suffix = temp_suffix(&self.ending());
        let _guard = self.locks.lock(id);
        write_private_file(parent, &path, data.as_bytes(), suffix)
    }

    #[instrument(skip(self))]
    fn retrieve(&self, id: &str) -> Result<String> {
        let path = self.path_for(id);

        let _guard = self.locks.lock(id);
        let bytes = fs::read(&path).map_err(|err| not_found_or_io(err, id))?;
        String::from_utf8(bytes).map_err(|_| Error::Encoding {
            reason: "invalid utf8 in storage file".to_string(),
        })
    }

    fn exists(&self, id: &str) -> Result<bool> {
        match fs::metadata(self.path_for(id)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Error::io(err)),
        }
    }

    #[instrument(skip(self))]
    fn list(&self) -> Result<Vec<String>> {
        let Settings { root, ending } = self.settings.read().clone();
        let suffix = format!(".{ending}");
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in WalkDir::new(&root) {
            let entry = entry.map_err(Error::io)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_entry = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&suffix));
            if !is_entry {
                continue;
            }

            let relative = entry.path().strip_prefix(&root).map_err(Error::io)?;
            let relative = relative.to_string_lossy().into_owned();
            let trimmed = relative.strip_suffix(&suffix).unwrap_or(relative.as_str());
            ids.push(normalize_id(trimmed));
        }

        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    #[instrument(skip(self))]
    fn delete(&self, id: &str) -> Result<()> {
        let path = self.path_for(id);

        let _guard = self.locks.lock(id);
        fs::remove_file(path).map_err(|err| not_found_or_io(err, id))
    }

    #[instrument(skip(self))]
    fn clean(&self) -> Result<()> {
        let mut last_err = None;
        for id in self.list()? {
            if let Err(err) = self.delete(&id) {
                warn!(%id, error = %err, "failed to delete entry during clean");
                last_err = Some(err);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    /// Not atomic with respect to concurrent writers.
    #[instrument(skip(self))]
    fn dump_json(&self) -> Result<String> {
        let mut entries = BTreeMap::new();
        let mut last_err = None;
        for id in self.list()? {
            match self.retrieve(&id) {
                Ok(data) => {
                    entries.insert(id, data);
                }
                Err(err) => {
                    warn!(%id, error = %err, "failed to read entry during dump");
                    last_err = Some(err);
                }
            }
        }

        match last_err {
            Some(err) => Err(err),
            None => dump::render(&entries),
        }
    }

    /// Validates the whole input before the first write; not atomic with respect to
    /// concurrent writers.
    #[instrument(skip_all)]
    fn load_json(&self, input: &str) -> Result<()> {
        let entries = dump::parse(input)?;

        let mut last_err = None;
        for (id, data) in entries {
            if let Err(err) = self.store(&id, &data) {
                warn!(%id, error = %err, "failed to write entry during load");
                last_err = Some(err);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    fn store_path(&self) -> Result<PathBuf> {
        Ok(self.root())
    }

    fn set_store_path(&self, path: &Path) -> Result<()> {
        self.set_root(path);
        Ok(())
    }

    fn file_ending(&self) -> Result<String> {
        Ok(self.ending())
    }

    fn set_file_ending(&self, ending: &str) -> Result<()> {
        self.set_ending(ending);
        Ok(())
    }

    fn file_path(&self, id: &str) -> Result<PathBuf> {
        Ok(self.path_for(id))
    }
}

fn resolve_store_path(path: &Path) -> PathBuf {
    let unified = PathBuf::from(normalize_separator(&path.to_string_lossy()));
    let absolute = match std::path::absolute(&unified) {
        Ok(absolute) => absolute,
        Err(err) => {
            warn!(path = %unified.display(), error = %err, "cannot resolve absolute storage path");
            unified
        }
    };
    clean_path(&absolute)
}

/// Lexically resolves `.` and `..` components.
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }

    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

fn create_private_dir(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(STORAGE_DIR_MODE);
    }
    builder.create(path).map_err(Error::io)
}

/// Suffix of in-flight temporary files. Never ends in `.<ending>`, so `list` cannot mistake
/// a pending or abandoned write for an entry.
fn temp_suffix(ending: &str) -> &'static str {
    if TEMP_SUFFIX.ends_with(&format!(".{ending}")) {
        FALLBACK_TEMP_SUFFIX
    } else {
        TEMP_SUFFIX
    }
}

/// Writes through a temporary sibling that is renamed into place. A failed write leaves the
/// previous content untouched and the temporary file is removed when dropped.
fn write_private_file(parent: &Path, path: &Path, data: &[u8], suffix: &str) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(suffix)
        .tempfile_in(parent)
        .map_err(Error::io)?;
    restrict_permissions(&tmp)?;
    tmp.write_all(data).map_err(Error::io)?;
    tmp.flush().map_err(Error::io)?;
    tmp.persist(path).map_err(|e| Error::io(e.error))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(file: &NamedTempFile) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.as_file()
        .set_permissions(fs::Permissions::from_mode(STORAGE_FILE_MODE))
        .map_err(Error::io)
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &NamedTempFile) -> Result<()> {
    Ok(())
}

fn not_found_or_io(err: io::Error, id: &str) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::NotFound {
            id: normalize_id(id),
        }
    } else {
        Error::io(err)
    }
}
