use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{
    eyre::{bail, eyre, WrapErr},
    Result,
};
use passvault_crypto::{unpack_envelope, Crypto};
use passvault_manager::RECOVERY_ID_SUFFIX;
use tracing::debug;
use zeroize::Zeroizing;

/// Encrypts the UTF-8 contents of `file`; the result can be placed in a store as an entry.
pub fn encrypt_file(file: &Path, key: &str, crypto: &Crypto) -> Result<String> {
    let contents = Zeroizing::new(read_utf8(file)?);
    Ok(crypto.encrypt(&contents, key)?)
}

/// Decrypts a stored entry and returns the packed envelope as is.
pub fn decrypt_file(file: &Path, key: &str, crypto: &Crypto) -> Result<Zeroizing<String>> {
    let sealed = read_utf8(file)?;
    Ok(Zeroizing::new(crypto.decrypt(&sealed, key)?))
}

/// Entry file and recovery file for `file`, whichever of the two it names.
///
/// `foo.pwd` pairs with `foo.recovery.pwd` and vice versa.
pub fn sibling_paths(file: &Path) -> Result<(PathBuf, PathBuf)> {
    let name = file
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| eyre!("{} is not an entry file", file.display()))?;
    let (stem, ending) = match name.rsplit_once('.') {
        Some((stem, ending)) if !stem.is_empty() && !ending.is_empty() => (stem, ending),
        _ => bail!("{} has no file ending", file.display()),
    };

    match stem.strip_suffix(RECOVERY_ID_SUFFIX) {
        Some(primary) if !primary.is_empty() => Ok((
            file.with_file_name(format!("{primary}.{ending}")),
            file.to_path_buf(),
        )),
        _ => Ok((
            file.to_path_buf(),
            file.with_file_name(format!("{stem}{RECOVERY_ID_SUFFIX}.{ending}")),
        )),
    }
}

/// Opens the recovery entry next to `file` with `recovery_key`, then uses the storage key
/// found there to open the entry itself.
///
/// Both envelopes must name the same id, so a recovery file copied next to an unrelated
/// entry is rejected.
pub fn recover(file: &Path, recovery_key: &str, crypto: &Crypto) -> Result<Zeroizing<String>> {
    let (primary, recovery) = sibling_paths(file)?;
    debug!(primary = %primary.display(), recovery = %recovery.display(), "recovering entry");

    let (recovery_id, storage_key) = open_entry(&recovery, recovery_key, crypto)
        .wrap_err_with(|| format!("cannot open recovery file {}", recovery.display()))?;
    let (id, secret) = open_entry(&primary, &storage_key, crypto)
        .wrap_err_with(|| format!("cannot open entry file {}", primary.display()))?;

    if recovery_id.strip_suffix(RECOVERY_ID_SUFFIX) != Some(id.as_str()) {
        bail!("recovery entry {recovery_id} does not belong to {id}");
    }
    Ok(secret)
}

fn open_entry(path: &Path, key: &str, crypto: &Crypto) -> Result<(String, Zeroizing<String>)> {
    let sealed = read_utf8(path)?;
    let packed = Zeroizing::new(crypto.decrypt(&sealed, key)?);
    let (id, data) = unpack_envelope(&packed)?;
    Ok((id, Zeroizing::new(data)))
}

fn read_utf8(path: &Path) -> Result<String> {
    fs::read_to_string(path).wrap_err_with(|| format!("cannot read {}", path.display()))
}
