use std::{
    fmt,
    path::{Path, PathBuf},
};

use passvault_core::{normalize_id, Error, Result, Storage};
use passvault_crypto::{secrets_match, unpack_envelope, Crypto, Envelope, ObfuscatedSecret};
use passvault_storage::{FileStorage, MemoryStorage};
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

/// Suffix marking the recovery record that stores the storage key of `<id>`.
pub const RECOVERY_ID_SUFFIX: &str = ".recovery";

pub fn is_recovery_id(id: &str) -> bool {
    normalize_id(id).ends_with(RECOVERY_ID_SUFFIX)
}

/// Credential operations over one owned storage backend.
///
/// Every secret is packed into an [`Envelope`], encrypted under the caller's storage key and
/// stored under its normalized id. With hashing enabled the secret is replaced by a salted
/// hash first. With recovery enabled every write also stores `<id>.recovery`, holding the
/// storage key encrypted under the recovery key; recovery records are never hashed and
/// never removed together with their primary entry.
pub struct Manager {
    hash_passwords: bool,
    recovery_key: Option<ObfuscatedSecret>,
    storage: Box<dyn Storage>,
    crypto: Crypto,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("hash_passwords", &self.hash_passwords)
            .field("recovery", &self.recovery_key.is_some())
            .field("crypto", &self.crypto)
            .finish_non_exhaustive()
    }
}

impl Manager {
    /// Disk-backed manager rooted at the default store path, hashing and recovery off.
    pub fn new() -> Self {
        Self::with_storage(FileStorage::default())
    }

    pub fn with_storage(storage: impl Storage + 'static) -> Self {
        Self {
            hash_passwords: false,
            recovery_key: None,
            storage: Box::new(storage),
            crypto: Crypto::default(),
        }
    }

    /// Replaces the key derivation used for encryption and hashing.
    pub fn with_crypto(mut self, crypto: Crypto) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn set_storage(&mut self, storage: impl Storage + 'static) {
        self.storage = Box::new(storage);
    }

    /// Switches to a fresh in-memory backend.
    pub fn set_temporary_storage(&mut self) {
        self.set_storage(MemoryStorage::new());
    }

    pub fn is_hashing(&self) -> bool {
        self.hash_passwords
    }

    pub fn set_hashing(&mut self, enabled: bool) {
        self.hash_passwords = enabled;
    }

    pub fn enable_recovery(&mut self, recovery_key: &str) {
        self.recovery_key = Some(ObfuscatedSecret::new(recovery_key));
    }

    /// Drops (and wipes) the recovery key. Existing recovery records stay on storage.
    pub fn disable_recovery(&mut self) {
        self.recovery_key = None;
    }

    pub fn is_recovery_enabled(&self) -> bool {
        self.recovery_key.is_some()
    }

    fn recovery_key(&self) -> Option<Zeroizing<String>> {
        self.recovery_key.as_ref().map(ObfuscatedSecret::reveal)
    }

    fn hashes(&self, id: &str) -> bool {
        self.hash_passwords && !id.ends_with(RECOVERY_ID_SUFFIX)
    }

    /// Creates or replaces the secret stored under `id`.
    #[instrument(skip_all, fields(id = %id))]
    pub fn overwrite(&self, id: &str, password: &str, key: &str) -> Result<()> {
        let id = normalize_id(id);

        let hashed;
        let payload = if self.hashes(&id) {
            hashed = self.crypto.hash_password(password)?;
            hashed.as_str()
        } else {
            password
        };

        let packed = Zeroizing::new(Envelope::new(&id, payload)?.pack()?);
        let sealed = self.crypto.encrypt(&packed, key)?;
        self.storage.store(&id, &sealed)?;

        self.refresh_recovery(&id, key);
        Ok(())
    }

    /// Best effort: a failed recovery write is logged and never fails the primary write.
    fn refresh_recovery(&self, id: &str, key: &str) {
        if id.ends_with(RECOVERY_ID_SUFFIX) {
            return;
        }
        let Some(recovery_key) = self.recovery_key() else {
            return;
        };

        let recovery_id = format!("{id}{RECOVERY_ID_SUFFIX}");
        if let Err(err) = self.overwrite(&recovery_id, key, &recovery_key) {
            warn!(id = %recovery_id, error = %err, "cannot write recovery entry");
        }
    }

    /// Returns the stored payload: the secret itself, or its hash when it was written with
    /// hashing enabled.
    #[instrument(skip_all, fields(id = %id))]
    pub fn get(&self, id: &str, key: &str) -> Result<String> {
        let id = normalize_id(id);

        let sealed = self.storage.retrieve(&id)?;
        let packed = Zeroizing::new(self.crypto.decrypt(&sealed, key)?);
        let (stored_id, password) = unpack_envelope(&packed)?;
        if stored_id != id {
            return Err(Error::Integrity { id });
        }
        Ok(password)
    }

    /// Compares `password` against the stored secret without revealing it.
    #[instrument(skip_all, fields(id = %id))]
    pub fn check(&self, id: &str, password: &str, key: &str) -> Result<bool> {
        let id = normalize_id(id);

        let stored = Zeroizing::new(self.get(&id, key)?);
        if self.hashes(&id) {
            self.crypto.verify_hashed_password(&stored, password)
        } else {
            Ok(secrets_match(&stored, password))
        }
    }

    /// Replaces an existing secret only if `old_password` matches; creates missing ids.
    ///
    /// The check and the write are two separate storage operations, so a concurrent writer
    /// on the same id can slip in between them.
    #[instrument(skip_all, fields(id = %id))]
    pub fn set(&self, id: &str, old_password: &str, new_password: &str, key: &str) -> Result<()> {
        let id = normalize_id(id);

        if self.storage.exists(&id)? {
            self.authorize(&id, old_password, key)?;
        }
        self.overwrite(&id, new_password, key)
    }

    /// Deletes `id` if `password` matches. Same race as [`Manager::set`].
    #[instrument(skip_all, fields(id = %id))]
    pub fn unset(&self, id: &str, password: &str, key: &str) -> Result<()> {
        let id = normalize_id(id);

        self.authorize(&id, password, key)?;
        self.storage.delete(&id)
    }

    /// Collapses every way a password check can fail into [`Error::Auth`], so a missing id,
    /// a wrong storage key and a wrong password are indistinguishable.
    fn authorize(&self, id: &str, password: &str, key: &str) -> Result<()> {
        match self.check(id, password, key) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::Auth),
            Err(err @ (Error::Io { .. } | Error::UnsupportedBackend { .. })) => Err(err),
            Err(err) => {
                debug!(%id, error = %err, "password check failed");
                Err(Error::Auth)
            }
        }
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        self.storage.exists(&normalize_id(id))
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.storage.list()
    }

    /// Deletes without a password check. Recovery records are left in place.
    pub fn delete(&self, id: &str) -> Result<()> {
        self.storage.delete(&normalize_id(id))
    }

    pub fn clean(&self) -> Result<()> {
        self.storage.clean()
    }

    /// Re-encrypts `id` under `new_key`. The envelope, including its timestamp and entropy,
    /// is kept as is; the recovery record is refreshed when recovery is enabled.
    #[instrument(skip_all, fields(id = %id))]
    pub fn rewrite_key(&self, id: &str, old_key: &str, new_key: &str) -> Result<()> {
        let id = normalize_id(id);

        let sealed = self.storage.retrieve(&id)?;
        let packed = Zeroizing::new(self.crypto.decrypt(&sealed, old_key)?);
        let (stored_id, _) = unpack_envelope(&packed)?;
        if stored_id != id {
            return Err(Error::Integrity { id });
        }

        let resealed = self.crypto.encrypt(&packed, new_key)?;
        self.storage.store(&id, &resealed)?;

        self.refresh_recovery(&id, new_key);
        Ok(())
    }

    pub fn dump_json(&self) -> Result<String> {
        self.storage.dump_json()
    }

    pub fn load_json(&self, input: &str) -> Result<()> {
        self.storage.load_json(input)
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        self.storage.store_path()
    }

    pub fn set_store_path(&self, path: impl AsRef<Path>) -> Result<()> {
        self.storage.set_store_path(path.as_ref())
    }

    pub fn file_ending(&self) -> Result<String> {
        self.storage.file_ending()
    }

    pub fn set_file_ending(&self, ending: &str) -> Result<()> {
        self.storage.set_file_ending(ending)
    }

    pub fn file_path(&self, id: &str) -> Result<PathBuf> {
        self.storage.file_path(id)
    }

    pub fn write_to_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        self.storage.write_to_disk(path.as_ref())
    }

    pub fn read_from_disk(&self, path: impl AsRef<Path>) -> Result<()> {
        self.storage.read_from_disk(path.as_ref())
    }
}
