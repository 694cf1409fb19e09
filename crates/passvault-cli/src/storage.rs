use color_eyre::Result;
use passvault_core::Storage;
use passvault_manager::Manager;
use passvault_storage::FileStorage;
use tracing::debug;

use crate::{cli::StoreArgs, config::Config};

/// Build a disk-backed manager from the config file with command-line overrides on top.
pub fn manager_from_config(config: &Config, args: &StoreArgs) -> Result<Manager> {
    let root = args.store_path.as_ref().unwrap_or(&config.store_path);
    let ending = args.file_ending.as_deref().unwrap_or(&config.file_ending);

    let storage = FileStorage::new(root);
    storage.set_file_ending(ending)?;
    debug!(root = %storage.root().display(), ending, "opening credential store");

    let mut manager = Manager::with_storage(storage);
    manager.set_hashing(args.hash_passwords || config.hash_passwords);
    if let Some(recovery_key) = &args.recovery_key {
        manager.enable_recovery(recovery_key);
    }
    Ok(manager)
}
